use crate::color::Color;
use crate::surface::Surface;
use anyhow::{Context, Result, anyhow, bail};
use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment override consulted when no `--font` is given.
pub const FONT_ENV: &str = "SPECTERR_FONT";

/// Searched in order when neither `--font` nor `SPECTERR_FONT` names a file.
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const MAX_SIZE: f32 = 512.0;
const MAX_BLUR: f32 = 200.0;
const CACHE_LIMIT: usize = 512;
const GLOW_ALPHA: f32 = 0.8;

/// Picks the label font: an explicit path must exist, otherwise `SPECTERR_FONT`
/// and then the first installed entry of [`DEFAULT_FONT_PATHS`].
pub fn resolve_font_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("font file '{}' does not exist", path.display());
        }
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(FONT_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        if !path.exists() {
            bail!("font file '{}' from {FONT_ENV} does not exist", path.display());
        }
        return Ok(path);
    }
    DEFAULT_FONT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("no label font installed; provide --font or set {FONT_ENV}"))
}

pub fn open_label_font(explicit: Option<&Path>) -> Result<LabelFont> {
    LabelFont::load(&resolve_font_path(explicit)?)
}

/// Parsed font plus a raster cache, used for the title and artist lines.
pub struct LabelFont {
    font: Font,
    layout: Layout,
    cache: HashMap<GlyphRasterConfig, Vec<u8>>,
}

/// Coverage of a laid-out line in surface coordinates, clipped to the surface.
struct Mask {
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    cov: Vec<f32>,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read font file {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("failed to parse font {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| anyhow!("{e}"))?;
        Ok(Self {
            font,
            layout: Layout::new(CoordinateSystem::PositiveYDown),
            cache: HashMap::new(),
        })
    }

    /// Ink width of `text` at `size` pixels.
    pub fn measure(&mut self, text: &str, size: f32) -> f32 {
        let Some(size) = usable_size(size) else {
            return 0.0;
        };
        self.lay_out(text, size);
        ink_span(&self.layout).map_or(0.0, |(l, r)| r - l)
    }

    /// Horizontally centred line of text sitting on `baseline`, with a soft halo
    /// `blur` pixels wide in the same colour.
    pub fn draw_label(
        &mut self,
        surface: &mut Surface,
        text: &str,
        center_x: f32,
        baseline: f32,
        size: f32,
        color: Color,
        blur: f32,
    ) {
        let Some(size) = usable_size(size) else {
            return;
        };
        if text.is_empty() || !center_x.is_finite() || !baseline.is_finite() {
            return;
        }
        let blur = if blur.is_finite() { blur.clamp(0.0, MAX_BLUR) } else { 0.0 };
        let Some(mask) = self.coverage(surface, text, center_x, baseline, size, blur.ceil() as usize) else {
            return;
        };

        if blur > 0.5 {
            let mut halo = mask.cov.clone();
            let radius = ((blur / 2.0) as usize).max(1);
            for _ in 0..2 {
                box_blur(&mut halo, mask.w, mask.h, radius);
            }
            paint_mask(surface, &mask, &halo, color.fade(GLOW_ALPHA));
        }
        paint_mask(surface, &mask, &mask.cov, color);
    }

    fn lay_out(&mut self, text: &str, size: f32) {
        self.layout.reset(&LayoutSettings::default());
        self.layout.append(&[&self.font], &TextStyle::new(text, size, 0));
    }

    fn coverage(
        &mut self,
        surface: &Surface,
        text: &str,
        center_x: f32,
        baseline: f32,
        size: f32,
        pad: usize,
    ) -> Option<Mask> {
        self.lay_out(text, size);
        let (left, right) = ink_span(&self.layout)?;
        let ascent = self.font.horizontal_line_metrics(size).map_or(size * 0.8, |m| m.ascent);
        let dx = (center_x - (left + right) / 2.0).round();
        let dy = (baseline - ascent).round();

        let (top, bottom) = self
            .layout
            .glyphs()
            .iter()
            .filter(|g| g.width > 0 && g.height > 0)
            .fold((f32::MAX, f32::MIN), |(t, b), g| (t.min(g.y), b.max(g.y + g.height as f32)));
        let pad = pad as f32;
        let x0 = (dx + left - pad).floor().max(0.0);
        let y0 = (dy + top - pad).floor().max(0.0);
        let x1 = (dx + right + pad).ceil().min(surface.width() as f32);
        let y1 = (dy + bottom + pad).ceil().min(surface.height() as f32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let (x0, y0) = (x0 as usize, y0 as usize);
        let (w, h) = (x1 as usize - x0, y1 as usize - y0);
        let mut cov = vec![0.0f32; w * h];

        if self.cache.len() > CACHE_LIMIT {
            self.cache.clear();
        }
        for g in self.layout.glyphs() {
            if g.width == 0 || g.height == 0 {
                continue;
            }
            let bitmap = self
                .cache
                .entry(g.key)
                .or_insert_with(|| self.font.rasterize_config(g.key).1);
            let gx = (dx + g.x).round() as i64 - x0 as i64;
            let gy = (dy + g.y).round() as i64 - y0 as i64;
            for row in 0..g.height {
                let my = gy + row as i64;
                if my < 0 || my >= h as i64 {
                    continue;
                }
                for col in 0..g.width {
                    let mx = gx + col as i64;
                    if mx < 0 || mx >= w as i64 {
                        continue;
                    }
                    let v = bitmap.get(row * g.width + col).copied().unwrap_or(0) as f32 / 255.0;
                    let slot = &mut cov[my as usize * w + mx as usize];
                    *slot = slot.max(v);
                }
            }
        }
        Some(Mask { x0, y0, w, h, cov })
    }
}

fn usable_size(size: f32) -> Option<f32> {
    (size.is_finite() && size > 0.0).then(|| size.min(MAX_SIZE))
}

/// Horizontal extent of the inked glyphs in the current layout.
fn ink_span(layout: &Layout) -> Option<(f32, f32)> {
    layout
        .glyphs()
        .iter()
        .filter(|g| g.width > 0 && g.height > 0)
        .fold(None, |acc, g| {
            let (l, r) = (g.x, g.x + g.width as f32);
            Some(match acc {
                Some((al, ar)) => (l.min(al), r.max(ar)),
                None => (l, r),
            })
        })
}

fn paint_mask(surface: &mut Surface, mask: &Mask, cov: &[f32], color: Color) {
    for y in 0..mask.h {
        for x in 0..mask.w {
            let c = cov[y * mask.w + x];
            if c > 0.0 {
                surface.blend_pixel(mask.x0 + x, mask.y0 + y, color, c);
            }
        }
    }
}

/// Separable running-sum box blur of radius `r`, edges clamped to zero.
fn box_blur(buf: &mut [f32], w: usize, h: usize, r: usize) {
    let norm = 1.0 / (2 * r + 1) as f32;
    let mut line = Vec::new();
    for y in 0..h {
        line.clear();
        line.extend_from_slice(&buf[y * w..(y + 1) * w]);
        blur_line(&line, r, norm, |x, v| buf[y * w + x] = v);
    }
    for x in 0..w {
        line.clear();
        line.extend((0..h).map(|y| buf[y * w + x]));
        blur_line(&line, r, norm, |y, v| buf[y * w + x] = v);
    }
}

fn blur_line(src: &[f32], r: usize, norm: f32, mut put: impl FnMut(usize, f32)) {
    let n = src.len();
    if n == 0 {
        return;
    }
    let at = |i: isize| if i >= 0 && (i as usize) < n { src[i as usize] } else { 0.0 };
    let mut sum: f32 = src[..=r.min(n - 1)].iter().sum();
    for i in 0..n {
        put(i, sum * norm);
        sum += at(i as isize + r as isize + 1) - at(i as isize - r as isize);
    }
}
