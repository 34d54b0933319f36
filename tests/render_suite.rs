use specterr::render::{Frame, HalfBlockRenderer, Renderer, clip_line, downsample};

/// Build a solid-color RGBA pixel buffer.
fn solid_pixels(w: usize, h: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
    [r, g, b, 255].repeat(w * h)
}

/// Top half red, bottom half blue.
fn split_pixels(w: usize, h: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        let px = if y < h / 2 { [255, 0, 0, 255] } else { [0, 0, 255, 255] };
        for _ in 0..w {
            buf.extend_from_slice(&px);
        }
    }
    buf
}

fn make_frame<'a>(cols: u16, visual_rows: u16, cw: usize, ch: usize, pixels: &'a [u8], sync: bool) -> Frame<'a> {
    Frame {
        term_cols: cols,
        visual_rows,
        hud_rows: 1,
        canvas_width: cw,
        canvas_height: ch,
        pixels_rgba: pixels,
        hud: "tron | particles 160 | export idle",
        sync_updates: sync,
    }
}

fn render(frame: &Frame<'_>) -> String {
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(frame, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn halfblock_renders_large_canvas_into_small_grid() {
    let pixels = split_pixels(1280, 720);
    let s = render(&make_frame(8, 4, 1280, 720, &pixels, true));
    assert!(s.starts_with("\x1b[?2026h"), "missing sync-begin");
    assert!(s.ends_with("\x1b[?2026l"), "missing sync-end");
    assert!(s.contains("\x1b[?7l") && s.contains("\x1b[?7h"));
    assert_eq!(s.matches('\u{2580}').count(), 8 * 4);
    assert!(s.contains("38;2;255;0;0"), "missing red foreground");
    assert!(s.contains("48;2;0;0;255"), "missing blue background");
}

#[test]
fn halfblock_name() {
    assert_eq!(HalfBlockRenderer::new().name(), "halfblock");
}

#[test]
fn halfblock_without_sync_omits_markers() {
    let pixels = solid_pixels(16, 16, 10, 20, 30);
    let s = render(&make_frame(4, 2, 16, 16, &pixels, false));
    assert!(!s.contains("2026"));
    // One colour pair for the whole frame.
    assert_eq!(s.matches("38;2;10;20;30").count(), 1);
}

#[test]
fn halfblock_skips_empty_canvas() {
    let pixels = solid_pixels(4, 4, 100, 100, 100);
    let mut out = Vec::new();
    HalfBlockRenderer::new()
        .render(&make_frame(0, 4, 4, 4, &pixels, false), &mut out)
        .unwrap();
    assert!(out.is_empty());
    HalfBlockRenderer::new()
        .render(&make_frame(4, 4, 0, 0, &[], false), &mut out)
        .unwrap();
    assert!(out.is_empty());
    HalfBlockRenderer::new()
        .render(&make_frame(4, 4, 8, 8, &pixels, false), &mut out)
        .unwrap();
    assert!(out.is_empty(), "short pixel buffer must be skipped");
}

#[test]
fn hud_is_clipped_to_width_below_visual() {
    let pixels = solid_pixels(8, 8, 0, 0, 0);
    let s = render(&make_frame(6, 3, 8, 8, &pixels, false));
    assert!(s.contains("\x1b[4;1H"), "hud row not placed after visual rows");
    assert!(s.contains("tron |"));
    assert!(!s.contains("tron | "));
}

#[test]
fn halfblock_resets_color_cache_each_frame() {
    let mut renderer = HalfBlockRenderer::new();
    let red = solid_pixels(4, 4, 255, 0, 0);
    let mut out = Vec::new();
    renderer.render(&make_frame(4, 2, 4, 4, &red, false), &mut out).unwrap();
    assert!(String::from_utf8_lossy(&out).contains("38;2;255;0;0"));

    out.clear();
    renderer.render(&make_frame(4, 2, 4, 4, &red, false), &mut out).unwrap();
    assert!(
        String::from_utf8_lossy(&out).contains("38;2;255;0;0"),
        "identical frame must repaint its colours"
    );
}

#[test]
fn downsample_picks_cell_centres() {
    let pixels = split_pixels(10, 10);
    let grid = downsample(&pixels, 10, 10, 2, 2);
    assert_eq!(grid, vec![[255, 0, 0], [255, 0, 0], [0, 0, 255], [0, 0, 255]]);

    let up = downsample(&pixels, 10, 10, 40, 40);
    assert_eq!(up.len(), 1600);
    assert_eq!(up[0], [255, 0, 0]);
    assert_eq!(up[1599], [0, 0, 255]);
}

#[test]
fn downsample_rejects_bad_input() {
    assert!(downsample(&[], 0, 0, 4, 4).is_empty());
    assert!(downsample(&[0; 16], 2, 2, 0, 4).is_empty());
    assert!(downsample(&[0; 8], 2, 2, 4, 4).is_empty());
}

#[test]
fn clip_line_respects_char_boundaries() {
    assert_eq!(clip_line("hello", 3), "hel");
    assert_eq!(clip_line("hi", 10), "hi");
    assert_eq!(clip_line("▀▀▀▀", 2), "▀▀");
    assert_eq!(clip_line("abc", 0), "");
}
