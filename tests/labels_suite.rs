use specterr::clock::{FrameClock, OfflineClock};
use specterr::color::Color;
use specterr::settings::VisualConfig;
use specterr::signal::SilentSignal;
use specterr::surface::Surface;
use specterr::visual::{Compositor, LabelFont, labels};
use std::path::Path;

/// First installed default font; tests needing glyphs return early without one.
fn system_font() -> Option<LabelFont> {
    labels::DEFAULT_FONT_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .and_then(|p| LabelFont::load(p).ok())
}

fn render_text(font: &mut LabelFont, text: &str, blur: f32) -> Surface {
    let mut surface = Surface::new(320, 96);
    surface.clear(Color::BLACK);
    font.draw_label(&mut surface, text, 160.0, 64.0, 40.0, Color::WHITE, blur);
    surface
}

fn lit(surface: &Surface) -> usize {
    surface.pixels().chunks_exact(4).filter(|px| px[0] > 0).count()
}

#[test]
fn explicit_missing_font_is_an_error() {
    let err = labels::resolve_font_path(Some(Path::new("/nonexistent/label.ttf"))).unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err}");
}

#[test]
fn explicit_font_path_wins() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let resolved = labels::resolve_font_path(Some(file.path())).unwrap();
    assert_eq!(resolved, file.path());
}

#[test]
fn garbage_bytes_are_rejected() {
    assert!(LabelFont::from_bytes(b"not a font at all".to_vec()).is_err());

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"\x00\x01\x02garbage").unwrap();
    let err = LabelFont::load(file.path()).err().expect("garbage must not parse");
    assert!(format!("{err:#}").contains("failed to parse font"), "{err:#}");
}

#[test]
fn accented_letters_render_as_themselves() {
    let Some(mut font) = system_font() else {
        return;
    };
    let accented = render_text(&mut font, "CANCIÓN", 0.0);
    let fallback = render_text(&mut font, "CANCI?N", 0.0);
    assert!(lit(&accented) > 0);
    assert_ne!(accented.pixels(), fallback.pixels());
}

#[test]
fn case_is_preserved() {
    let Some(mut font) = system_font() else {
        return;
    };
    let lower = render_text(&mut font, "night drive", 0.0);
    let upper = render_text(&mut font, "NIGHT DRIVE", 0.0);
    assert_ne!(lower.pixels(), upper.pixels());
    assert!(font.measure("night drive", 40.0) < font.measure("NIGHT DRIVE", 40.0));
}

#[test]
fn label_is_centred_on_anchor() {
    let Some(mut font) = system_font() else {
        return;
    };
    let surface = render_text(&mut font, "IIII", 0.0);
    let xs: Vec<usize> = (0..surface.height())
        .flat_map(|y| (0..surface.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| surface.pixel(x, y).is_some_and(|px| px[0] > 128))
        .map(|(x, _)| x)
        .collect();
    let (min, max) = (*xs.iter().min().unwrap(), *xs.iter().max().unwrap());
    let mid = (min + max) as f32 / 2.0;
    assert!((mid - 160.0).abs() <= 2.0, "ink centred at {mid}");
    // Nothing below the baseline for capitals.
    assert!((66..96).all(|y| (0..320).all(|x| surface.pixel(x, y).unwrap()[0] <= 128)));
}

#[test]
fn glow_spreads_beyond_the_core() {
    let Some(mut font) = system_font() else {
        return;
    };
    let sharp = render_text(&mut font, "GLOW", 0.0);
    let soft = render_text(&mut font, "GLOW", 12.0);
    assert!(lit(&soft) > lit(&sharp));
}

#[test]
fn degenerate_sizes_draw_nothing_and_huge_ones_are_bounded() {
    let Some(mut font) = system_font() else {
        return;
    };
    for size in [0.0, -4.0, f32::NAN, f32::INFINITY] {
        let surface = render_text_at(&mut font, size);
        assert_eq!(lit(&surface), 0, "size {size}");
        assert_eq!(font.measure("TITLE", size), 0.0);
    }
    render_text_at(&mut font, 1e9);
    let mut surface = Surface::new(64, 64);
    font.draw_label(&mut surface, "EDGE", -5000.0, 1e6, 48.0, Color::WHITE, f32::INFINITY);
    font.draw_label(&mut surface, "", 32.0, 32.0, 48.0, Color::WHITE, 4.0);
}

fn render_text_at(font: &mut LabelFont, size: f32) -> Surface {
    let mut surface = Surface::new(64, 64);
    surface.clear(Color::BLACK);
    font.draw_label(&mut surface, "TITLE", 32.0, 48.0, size, Color::WHITE, 6.0);
    surface
}

#[test]
fn compositor_draws_labels_only_with_a_font() {
    let Some(font) = system_font() else {
        return;
    };
    let cfg = VisualConfig {
        particles: 0.0,
        spectrum_bars: 0.0,
        glow: 0.0,
        ..VisualConfig::default()
    };
    let Some(tick) = OfflineClock::new(30).next_frame() else {
        panic!("offline clock yields a first frame");
    };
    let band = |comp: &Compositor| {
        let s = comp.surface();
        (s.height() - 150..s.height() - 60)
            .flat_map(|y| (0..s.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| s.pixel(x, y).is_some_and(|px| px[0] > 200 || px[1] > 200))
            .count()
    };

    let mut comp = Compositor::new(640, 360, &cfg, 9);
    comp.render(&mut SilentSignal::new(44_100), &cfg, &tick);
    let bare = band(&comp);

    comp.set_font(Some(font));
    comp.render(&mut SilentSignal::new(44_100), &cfg, &tick);
    assert!(band(&comp) > bare, "labels missing");
}
