use crate::color::Color;
use crate::signal::FrequencySample;
use crate::surface::{Paint, Surface};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Inclusive frequency range of interest, in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqWindow {
    pub min_hz: f32,
    pub max_hz: f32,
}

/// Maps bar positions onto bins of a sample of length `len`.
///
/// The mapping is `floor(i / bars * segment) + min_index`, clamped into
/// `[0, len - 1]` whatever the window looks like; inverted or empty windows
/// collapse onto a single bin instead of reading out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinMap {
    len: usize,
    bars: usize,
    min_index: i64,
    segment: i64,
}

impl BinMap {
    pub fn new(len: usize, sample_rate: u32, bars: usize, window: Option<FreqWindow>) -> Self {
        let (min_index, segment) = match window {
            Some(w) => {
                let nyquist = sample_rate as f64 / 2.0;
                let min_index = floor_index(w.min_hz as f64 / nyquist * len as f64);
                let max_index = floor_index(w.max_hz as f64 / nyquist * len as f64);
                (min_index, max_index.saturating_sub(min_index))
            }
            None => (0, len as i64),
        };
        Self {
            len,
            bars,
            min_index,
            segment,
        }
    }

    pub fn bars(&self) -> usize {
        self.bars
    }

    pub fn index(&self, i: usize) -> usize {
        if self.len == 0 || self.bars == 0 {
            return 0;
        }
        let offset = floor_index(i as f64 / self.bars as f64 * self.segment as f64);
        let raw = offset.saturating_add(self.min_index);
        raw.clamp(0, self.len as i64 - 1) as usize
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bars).map(move |i| self.index(i))
    }

    /// Clamped `[start, end)` span of bins the window covers.
    pub fn active_range(&self) -> (usize, usize) {
        if self.len == 0 {
            return (0, 0);
        }
        let last = self.len as i64;
        let a = self.min_index.clamp(0, last);
        let b = self.min_index.saturating_add(self.segment).clamp(0, last);
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        (a as usize, b as usize)
    }
}

fn floor_index(v: f64) -> i64 {
    if v.is_finite() { v.floor() as i64 } else { 0 }
}

/// Per-call drawing parameters shared by every renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumStyle {
    pub bars: usize,
    pub thickness: f32,
    pub color_a: Color,
    pub color_b: Color,
    /// Bar height in percent of the full reach.
    pub height: f32,
    /// Length multiplier.
    pub pulse: f32,
    /// Alpha of the aura glow.
    pub glow: f32,
    pub sample_rate: u32,
    pub window: Option<FreqWindow>,
}

impl Default for SpectrumStyle {
    fn default() -> Self {
        Self {
            bars: 180,
            thickness: 2.0,
            color_a: Color::rgb(0x00, 0xea, 0xff),
            color_b: Color::rgb(0xff, 0x3f, 0xa8),
            height: 60.0,
            pulse: 1.0,
            glow: 0.8,
            sample_rate: 44_100,
            window: None,
        }
    }
}

impl SpectrumStyle {
    pub fn bin_map(&self, sample: &FrequencySample) -> BinMap {
        BinMap::new(sample.len(), self.sample_rate, self.bars, self.window)
    }
}

fn finite(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

fn polar(cx: f32, cy: f32, angle: f32, r: f32) -> (f32, f32) {
    (cx + angle.cos() * r, cy + angle.sin() * r)
}

/// Radial bars starting at `radius` with their angle origin at 12 o'clock.
fn radial_bars(
    surface: &mut Surface,
    center: (f32, f32),
    radius: f32,
    sample: &FrequencySample,
    style: &SpectrumStyle,
    angle_offset: f32,
    mut bar: impl FnMut(usize, f32) -> (f32, f32, Paint),
) {
    if style.bars == 0 || sample.is_empty() {
        return;
    }
    let map = style.bin_map(sample);
    let (cx, cy) = center;
    for (i, idx) in map.indices().enumerate() {
        let v = sample.level(idx);
        let angle = i as f32 / style.bars as f32 * TAU + angle_offset;
        let (len, width, paint) = bar(i, v);
        let p0 = polar(cx, cy, angle, radius);
        let p1 = polar(cx, cy, angle, len);
        let paint = match paint {
            Paint::Linear { a, b, .. } => Paint::linear(p0, p1, a, b),
            other => other,
        };
        surface.stroke_line(p0, p1, width, &paint);
    }
}

fn gradient(a: Color, b: Color) -> Paint {
    Paint::linear((0.0, 0.0), (0.0, 0.0), a, b)
}

pub fn draw_circular(
    surface: &mut Surface,
    center: (f32, f32),
    radius: f32,
    sample: &FrequencySample,
    style: &SpectrumStyle,
) {
    let r = finite(radius);
    let reach = r * 3.5 * finite(style.height) / 100.0 * finite(style.pulse);
    let thickness = finite(style.thickness);
    let paint = gradient(style.color_a, style.color_b);
    radial_bars(surface, center, r, sample, style, -FRAC_PI_2, |_, v| {
        (r + v * reach, (thickness + v * 8.0).max(1.0), paint)
    });
}

/// Columns across `(x, y, w, h)`, centred vertically, gradient B at the
/// bottom to A at the top.
pub fn draw_linear(surface: &mut Surface, rect: (f32, f32, f32, f32), sample: &FrequencySample, style: &SpectrumStyle) {
    if style.bars == 0 || sample.is_empty() {
        return;
    }
    let (x, y, w, h) = rect;
    let bw = w / style.bars as f32;
    let speed = finite(style.pulse);
    let map = style.bin_map(sample);
    for (i, idx) in map.indices().enumerate() {
        let v = sample.level(idx);
        let bar_h = h * v * speed;
        let left = x + i as f32 * bw;
        let paint = Paint::linear((left, y + h), (left, y), style.color_b, style.color_a);
        surface.fill_rect(left, y + (h - bar_h) / 2.0, bw * 0.75, bar_h, &paint);
    }
}

pub const HALO_RINGS: usize = 6;

/// Mean level (0..1) of each ring's contiguous slice of the active window.
pub fn halo_levels(sample: &FrequencySample, style: &SpectrumStyle) -> [f32; HALO_RINGS] {
    let mut levels = [0.0; HALO_RINGS];
    if sample.is_empty() {
        return levels;
    }
    let (lo, hi) = style.bin_map(sample).active_range();
    let span = hi - lo;
    for (k, level) in levels.iter_mut().enumerate() {
        let start = lo + k * span / HALO_RINGS;
        let end = lo + (k + 1) * span / HALO_RINGS;
        let bins = &sample.bins()[start..end];
        if !bins.is_empty() {
            *level = bins.iter().map(|&b| b as f32).sum::<f32>() / (bins.len() as f32 * 255.0);
        }
    }
    levels
}

pub fn draw_halo(surface: &mut Surface, center: (f32, f32), radius: f32, sample: &FrequencySample, style: &SpectrumStyle) {
    let r = finite(radius);
    let (cx, cy) = center;
    if !sample.is_empty() {
        for (k, avg) in halo_levels(sample, style).into_iter().enumerate() {
            let rr = r * (0.5 + k as f32 * 0.2) + avg * r * 0.4;
            let paint = Paint::linear((cx - rr, cy - rr), (cx + rr, cy + rr), style.color_a, style.color_b);
            surface.stroke_ring(cx, cy, rr, 2.0 + k as f32 * 0.8, &paint);
        }
    }
    let glow = Paint::radial(center, r * 0.1, r * 1.5, style.color_b.with_alpha(0.2), Color::TRANSPARENT);
    surface.fill_circle(cx, cy, r * 1.2, &glow);
}

pub fn draw_aura(surface: &mut Surface, center: (f32, f32), radius: f32, sample: &FrequencySample, style: &SpectrumStyle) {
    let r = finite(radius);
    let glow = Paint::radial(center, r * 0.2, r * 1.8, style.color_a.with_alpha(style.glow), Color::TRANSPARENT);
    surface.fill_circle(center.0, center.1, r * 1.4, &glow);
    let thickness = finite(style.thickness);
    let paint = gradient(style.color_a, style.color_b);
    radial_bars(surface, center, r, sample, style, 0.0, |_, v| {
        (r + v * r * 1.2, (thickness + v * 4.0).max(1.0), paint)
    });
}

pub fn draw_energy(surface: &mut Surface, center: (f32, f32), radius: f32, sample: &FrequencySample, style: &SpectrumStyle) {
    let r = finite(radius);
    let thickness = finite(style.thickness);
    let paint = gradient(style.color_a, style.color_b);
    radial_bars(surface, center, r, sample, style, 0.0, |_, v| {
        (r + v * r * 1.6, (thickness + v * 8.0).max(1.0), paint)
    });
    let glow = Paint::radial(center, r * 0.1, r * 1.2, style.color_a.with_alpha(0.3), Color::TRANSPARENT);
    surface.fill_circle(center.0, center.1, r * 0.8, &glow);
}

pub fn draw_retro(surface: &mut Surface, center: (f32, f32), radius: f32, sample: &FrequencySample, style: &SpectrumStyle) {
    let r = finite(radius);
    let thickness = finite(style.thickness);
    let (a, b) = (style.color_a, style.color_b);
    radial_bars(surface, center, r, sample, style, 0.0, |i, v| {
        let c = if i % 2 == 0 { a } else { b };
        (r + v * r * 0.8, (thickness + v * 3.0).max(1.0), Paint::Solid(c))
    });
    let spoke = Paint::Solid(Color::WHITE.with_alpha(0.1));
    for i in 0..8 {
        let angle = i as f32 / 8.0 * TAU;
        surface.stroke_line(center, polar(center.0, center.1, angle, r * 1.5), 1.0, &spoke);
    }
}

const ARC_BARS: usize = 40;
pub const ARC_STEPS: usize = 5;

/// Jittered polylines radiating from `radius`. Quiet bars are dropped at
/// random; silence draws straight lines.
pub fn draw_arcs(
    surface: &mut Surface,
    center: (f32, f32),
    radius: f32,
    sample: &FrequencySample,
    style: &SpectrumStyle,
    rng: &mut fastrand::Rng,
) {
    if sample.is_empty() {
        return;
    }
    let r = finite(radius);
    let (cx, cy) = center;
    for i in 0..ARC_BARS {
        let t = i as f32 / (ARC_BARS - 1) as f32;
        let angle = t * TAU;
        let v = sample.level((t * sample.len() as f32).floor() as usize);
        if rng.f32() > 0.5 && v < 0.06 {
            continue;
        }
        let p0 = polar(cx, cy, angle, r);
        let p1 = polar(cx, cy, angle, r + v * r * 1.8);
        let pts = arc_points(p0, p1, v, rng);
        let paint = Paint::linear(p0, p1, style.color_a.with_alpha(0.9), style.color_b.with_alpha(0.6));
        surface.stroke_polyline(&pts, false, 1.0 + v * 6.0, &paint);
    }
}

/// Evenly spaced points from `p0` to `p1`, each pushed off the line by up to
/// `5 * level` pixels per axis.
pub fn arc_points(p0: (f32, f32), p1: (f32, f32), level: f32, rng: &mut fastrand::Rng) -> [(f32, f32); ARC_STEPS + 1] {
    let mut pts = [(0.0, 0.0); ARC_STEPS + 1];
    for (s, pt) in pts.iter_mut().enumerate() {
        let f = s as f32 / ARC_STEPS as f32;
        *pt = (
            p0.0 + (p1.0 - p0.0) * f + (rng.f32() - 0.5) * 10.0 * level,
            p0.1 + (p1.1 - p0.1) * f + (rng.f32() - 0.5) * 10.0 * level,
        );
    }
    pts
}

const WAVE_POINTS: usize = 600;

/// Closed ring whose radius follows the sample; empty bins read as mid-level.
pub fn wave_points(center: (f32, f32), radius: f32, amplitude: f32, sample: &FrequencySample) -> Vec<(f32, f32)> {
    if sample.is_empty() {
        return Vec::new();
    }
    (0..WAVE_POINTS)
        .map(|i| {
            let t = i as f32 / WAVE_POINTS as f32;
            let raw = sample.get((t * sample.len() as f32).floor() as usize);
            let v = if raw == 0 { 128.0 } else { raw as f32 } / 255.0;
            polar(center.0, center.1, t * TAU, radius + (v - 0.5) * amplitude)
        })
        .collect()
}

pub fn draw_wave(
    surface: &mut Surface,
    center: (f32, f32),
    radius: f32,
    amplitude: f32,
    sample: &FrequencySample,
    style: &SpectrumStyle,
) {
    let r = finite(radius);
    let pts = wave_points(center, r, finite(amplitude), sample);
    if pts.is_empty() {
        return;
    }
    let (cx, cy) = center;
    let paint = Paint::linear((cx - r, cy - r), (cx + r, cy + r), style.color_a, style.color_b).faded(0.9);
    surface.stroke_polyline(&pts, true, finite(style.thickness).max(1.0), &paint);
}
