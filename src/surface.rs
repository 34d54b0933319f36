use crate::color::{Color, unit};
use anyhow::Context;
use std::path::Path;

/// How a primitive is coloured. Gradients are evaluated per pixel centre.
#[derive(Debug, Clone, Copy)]
pub enum Paint {
    Solid(Color),
    Linear {
        from: (f32, f32),
        to: (f32, f32),
        a: Color,
        b: Color,
    },
    Radial {
        center: (f32, f32),
        r0: f32,
        r1: f32,
        a: Color,
        b: Color,
    },
}

impl Paint {
    pub fn linear(from: (f32, f32), to: (f32, f32), a: Color, b: Color) -> Self {
        Self::Linear { from, to, a, b }
    }

    pub fn radial(center: (f32, f32), r0: f32, r1: f32, a: Color, b: Color) -> Self {
        Self::Radial { center, r0, r1, a, b }
    }

    /// Applies a global alpha to every stop.
    pub fn faded(self, factor: f32) -> Self {
        match self {
            Self::Solid(c) => Self::Solid(c.fade(factor)),
            Self::Linear { from, to, a, b } => Self::Linear {
                from,
                to,
                a: a.fade(factor),
                b: b.fade(factor),
            },
            Self::Radial { center, r0, r1, a, b } => Self::Radial {
                center,
                r0,
                r1,
                a: a.fade(factor),
                b: b.fade(factor),
            },
        }
    }

    fn at(&self, x: f32, y: f32) -> Color {
        match *self {
            Self::Solid(c) => c,
            Self::Linear { from, to, a, b } => {
                let dx = to.0 - from.0;
                let dy = to.1 - from.1;
                let len2 = dx * dx + dy * dy;
                if len2 <= f32::EPSILON {
                    return a;
                }
                let t = ((x - from.0) * dx + (y - from.1) * dy) / len2;
                a.mix(b, t)
            }
            Self::Radial { center, r0, r1, a, b } => {
                let d = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
                let span = r1 - r0;
                if span.abs() <= f32::EPSILON {
                    return if d <= r0 { a } else { b };
                }
                a.mix(b, (d - r0) / span)
            }
        }
    }
}

/// Decoded raster art (background or logo), RGBA8, straight alpha.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl RasterImage {
    pub fn from_rgba(width: usize, height: usize, rgba: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() < width.saturating_mul(height).saturating_mul(4) {
            return None;
        }
        Some(Self { width, height, rgba })
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .to_rgba8();
        let (w, h) = img.dimensions();
        Self::from_rgba(w as usize, h as usize, img.into_raw())
            .with_context(|| format!("image {} has no pixels", path.display()))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    fn texel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

/// Rectangle `(x, y, w, h)` that covers the box `(bx, by, bw, bh)` while keeping
/// the image aspect ratio; the overflow is split evenly on both sides.
pub fn cover_fit(aspect: f32, bx: f32, by: f32, bw: f32, bh: f32) -> (f32, f32, f32, f32) {
    if !aspect.is_finite() || aspect <= 0.0 || bh <= 0.0 {
        return (bx, by, bw, bh);
    }
    if aspect > bw / bh {
        let dh = bh;
        let dw = aspect * dh;
        (bx - (dw - bw) / 2.0, by, dw, dh)
    } else {
        let dw = bw;
        let dh = dw / aspect;
        (bx, by - (dh - bh) / 2.0, dw, dh)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircleClip {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
}

/// Opaque RGBA8 drawing surface. Only the compositor writes to it; capture
/// taps read `pixels()` after a frame completes.
pub struct Surface {
    w: usize,
    h: usize,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(w: usize, h: usize) -> Self {
        let mut s = Self {
            w: 0,
            h: 0,
            pixels: Vec::new(),
        };
        s.resize(w, h);
        s
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.pixels.clear();
        self.pixels.resize(w.saturating_mul(h).saturating_mul(4), 0);
        for px in self.pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn size(&self) -> (f32, f32) {
        (self.w as f32, self.h as f32)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let i = (y * self.w + x) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn clear(&mut self, c: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[0] = c.r;
            px[1] = c.g;
            px[2] = c.b;
            px[3] = 255;
        }
    }

    /// Source-over blend of one pixel; out-of-range coordinates are ignored.
    pub fn blend_pixel(&mut self, x: usize, y: usize, c: Color, coverage: f32) {
        if x < self.w && y < self.h {
            self.blend(x, y, c, coverage);
        }
    }

    #[inline]
    fn blend(&mut self, x: usize, y: usize, c: Color, coverage: f32) {
        let a = unit(c.a * coverage);
        if a <= 0.0 {
            return;
        }
        let i = (y * self.w + x) * 4;
        let px = &mut self.pixels[i..i + 4];
        px[0] = (px[0] as f32 * (1.0 - a) + c.r as f32 * a) as u8;
        px[1] = (px[1] as f32 * (1.0 - a) + c.g as f32 * a) as u8;
        px[2] = (px[2] as f32 * (1.0 - a) + c.b as f32 * a) as u8;
        px[3] = 255;
    }

    /// Fills the pixels of row `y` whose centres fall inside `[x0, x1]`, with
    /// fractional coverage on the two end pixels.
    fn fill_span(&mut self, y: usize, x0: f32, x1: f32, paint: &Paint) {
        if !(x0.is_finite() && x1.is_finite()) || x1 < x0 || self.w == 0 {
            return;
        }
        let first = (x0 - 0.5).floor().max(0.0) as usize;
        let last = ((x1 + 0.5).ceil().max(0.0) as usize).min(self.w);
        let yc = y as f32 + 0.5;
        for x in first..last {
            let xc = x as f32 + 0.5;
            let coverage = ((xc - x0).min(x1 - xc) + 0.5).clamp(0.0, 1.0);
            if coverage > 0.0 {
                let c = paint.at(xc, yc);
                self.blend(x, y, c, coverage);
            }
        }
    }

    /// Row-by-row fill of a convex region; `interval` returns the covered x-range
    /// for a row centre.
    fn fill_rows(&mut self, top: f32, bottom: f32, paint: &Paint, interval: impl Fn(f32) -> Option<(f32, f32)>) {
        if self.w == 0 || self.h == 0 || !(top.is_finite() && bottom.is_finite()) {
            return;
        }
        let y0 = top.floor().max(0.0) as usize;
        let y1 = (bottom.ceil().max(0.0) as usize).min(self.h);
        for y in y0..y1 {
            if let Some((x0, x1)) = interval(y as f32 + 0.5) {
                self.fill_span(y, x0, x1, paint);
            }
        }
    }

    pub fn fill(&mut self, paint: &Paint) {
        let (w, h) = self.size();
        self.fill_rect(0.0, 0.0, w, h, paint);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        self.fill_rows(y, y + h, paint, |_| Some((x, x + w)));
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, paint: &Paint) {
        if !(r > 0.0) {
            return;
        }
        self.fill_rows(cy - r, cy + r, paint, |yc| {
            let dy = yc - cy;
            let d2 = r * r - dy * dy;
            (d2 >= 0.0).then(|| {
                let dx = d2.sqrt();
                (cx - dx, cx + dx)
            })
        });
    }

    pub fn stroke_ring(&mut self, cx: f32, cy: f32, r: f32, width: f32, paint: &Paint) {
        let half = width.max(1.0) * 0.5;
        let outer = r + half;
        let inner = (r - half).max(0.0);
        if !(outer > 0.0) || self.w == 0 || self.h == 0 {
            return;
        }
        let y0 = (cy - outer).floor().max(0.0) as usize;
        let y1 = ((cy + outer).ceil().max(0.0) as usize).min(self.h);
        for y in y0..y1 {
            let dy = y as f32 + 0.5 - cy;
            let o2 = outer * outer - dy * dy;
            if o2 < 0.0 {
                continue;
            }
            let xo = o2.sqrt();
            let i2 = inner * inner - dy * dy;
            if i2 > 0.0 {
                let xi = i2.sqrt();
                self.fill_span(y, cx - xo, cx - xi, paint);
                self.fill_span(y, cx + xi, cx + xo, paint);
            } else {
                self.fill_span(y, cx - xo, cx + xo, paint);
            }
        }
    }

    /// Thick segment with round ends.
    pub fn stroke_line(&mut self, p0: (f32, f32), p1: (f32, f32), width: f32, paint: &Paint) {
        let hw = width.max(1.0) * 0.5;
        let dx = p1.0 - p0.0;
        let dy = p1.1 - p0.1;
        let len = (dx * dx + dy * dy).sqrt();
        if !len.is_finite() {
            return;
        }
        let quad = if len > f32::EPSILON {
            let nx = -dy / len * hw;
            let ny = dx / len * hw;
            Some([
                (p0.0 + nx, p0.1 + ny),
                (p1.0 + nx, p1.1 + ny),
                (p1.0 - nx, p1.1 - ny),
                (p0.0 - nx, p0.1 - ny),
            ])
        } else {
            None
        };
        let top = p0.1.min(p1.1) - hw;
        let bottom = p0.1.max(p1.1) + hw;
        self.fill_rows(top, bottom, paint, |yc| {
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            for &(px, py) in [p0, p1].iter() {
                let d2 = hw * hw - (yc - py) * (yc - py);
                if d2 >= 0.0 {
                    let s = d2.sqrt();
                    lo = lo.min(px - s);
                    hi = hi.max(px + s);
                }
            }
            if let Some(q) = quad {
                if let Some((a, b)) = convex_row_interval(&q, yc) {
                    lo = lo.min(a);
                    hi = hi.max(b);
                }
            }
            (lo <= hi).then_some((lo, hi))
        });
    }

    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], closed: bool, width: f32, paint: &Paint) {
        for pair in points.windows(2) {
            self.stroke_line(pair[0], pair[1], width, paint);
        }
        if closed && points.len() > 2 {
            self.stroke_line(points[points.len() - 1], points[0], width, paint);
        }
    }

    /// Draws `img` stretched into `(dx, dy, dw, dh)` with nearest sampling.
    pub fn draw_image(
        &mut self,
        img: &RasterImage,
        dest: (f32, f32, f32, f32),
        alpha: f32,
        clip: Option<CircleClip>,
    ) {
        let (dx, dy, dw, dh) = dest;
        if !(dw > 0.0 && dh > 0.0) || self.w == 0 || self.h == 0 {
            return;
        }
        let mut top = dy;
        let mut bottom = dy + dh;
        let mut left = dx;
        let mut right = dx + dw;
        if let Some(c) = clip {
            top = top.max(c.cy - c.r);
            bottom = bottom.min(c.cy + c.r);
            left = left.max(c.cx - c.r);
            right = right.min(c.cx + c.r);
        }
        let y0 = top.floor().max(0.0) as usize;
        let y1 = (bottom.ceil().max(0.0) as usize).min(self.h);
        let x0 = left.floor().max(0.0) as usize;
        let x1 = (right.ceil().max(0.0) as usize).min(self.w);
        let sx_scale = img.width() as f32 / dw;
        let sy_scale = img.height() as f32 / dh;
        for y in y0..y1 {
            let yc = y as f32 + 0.5;
            if yc < dy || yc >= dy + dh {
                continue;
            }
            let sy = ((yc - dy) * sy_scale) as usize;
            for x in x0..x1 {
                let xc = x as f32 + 0.5;
                if xc < dx || xc >= dx + dw {
                    continue;
                }
                if let Some(c) = clip {
                    if (xc - c.cx).powi(2) + (yc - c.cy).powi(2) > c.r * c.r {
                        continue;
                    }
                }
                let sx = ((xc - dx) * sx_scale) as usize;
                let t = img.texel(sx, sy);
                let c = Color {
                    r: t[0],
                    g: t[1],
                    b: t[2],
                    a: t[3] as f32 / 255.0,
                };
                self.blend(x, y, c, alpha);
            }
        }
    }
}

/// Horizontal extent of a convex polygon at row centre `yc`.
fn convex_row_interval(poly: &[(f32, f32)], yc: f32) -> Option<(f32, f32)> {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        if (a.1 - yc) * (b.1 - yc) > 0.0 {
            continue;
        }
        if (b.1 - a.1).abs() <= f32::EPSILON {
            lo = lo.min(a.0.min(b.0));
            hi = hi.max(a.0.max(b.0));
            continue;
        }
        let x = a.0 + (yc - a.1) * (b.0 - a.0) / (b.1 - a.1);
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo <= hi).then_some((lo, hi))
}
