mod halfblock;

pub use halfblock::HalfBlockRenderer;

use std::io::Write;

/// One presentation request: a canvas of any size shown in a terminal area.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub visual_rows: u16,
    pub hud_rows: u16,
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Nearest-neighbour resample of an RGBA canvas to `dw × dh` RGB cells.
/// Returns an empty grid when either side is empty or the buffer is short.
pub fn downsample(pixels: &[u8], sw: usize, sh: usize, dw: usize, dh: usize) -> Vec<[u8; 3]> {
    if sw == 0 || sh == 0 || dw == 0 || dh == 0 || pixels.len() < sw * sh * 4 {
        return Vec::new();
    }
    let mut grid = Vec::with_capacity(dw * dh);
    for y in 0..dh {
        let sy = ((y * 2 + 1) * sh / (dh * 2)).min(sh - 1);
        for x in 0..dw {
            let sx = ((x * 2 + 1) * sw / (dw * 2)).min(sw - 1);
            let i = (sy * sw + sx) * 4;
            grid.push([pixels[i], pixels[i + 1], pixels[i + 2]]);
        }
    }
    grid
}

/// Cuts `line` to at most `width` characters.
pub fn clip_line(line: &str, width: usize) -> &str {
    match line.char_indices().nth(width) {
        Some((i, _)) => &line[..i],
        None => line,
    }
}
