use super::glow_polyline;
use super::population::Population;
use crate::color::Color;
use crate::settings::coerce_count;
use crate::signal::FrequencySample;
use crate::surface::{Paint, Surface};
use std::f32::consts::TAU;

const MARGIN: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub rot: f32,
    pub spin: f32,
    pub mix: f32,
    pub age: f32,
    pub life: f32,
}

impl Shape {
    /// Triangle corners in surface coordinates.
    pub fn vertices(&self) -> [(f32, f32); 3] {
        let s = self.size;
        let (sin, cos) = self.rot.sin_cos();
        [(0.0, -0.6 * s), (0.8 * s, 0.6 * s), (-0.8 * s, 0.6 * s)]
            .map(|(x, y)| (self.x + x * cos - y * sin, self.y + x * sin + y * cos))
    }
}

/// Rotating outlined triangles. One shape per four particles.
pub struct ShapeField {
    w: f32,
    h: f32,
    rng: fastrand::Rng,
    pop: Population<Shape>,
}

impl ShapeField {
    pub fn new(w: f32, h: f32, particles: f32, rng: fastrand::Rng) -> Self {
        let mut field = Self {
            w: extent(w),
            h: extent(h),
            rng,
            pop: Population::new(),
        };
        field.set_count(particles);
        field
    }

    pub fn count_for(particles: f32) -> usize {
        coerce_count(particles) / 4
    }

    pub fn len(&self) -> usize {
        self.pop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pop.is_empty()
    }

    pub fn shapes(&self) -> &[Shape] {
        self.pop.as_slice()
    }

    pub fn resize(&mut self, w: f32, h: f32) {
        self.w = extent(w);
        self.h = extent(h);
        let (w, h) = (self.w, self.h);
        for s in self.pop.iter_mut() {
            s.x = s.x.clamp(0.0, w);
            s.y = s.y.clamp(0.0, h);
        }
    }

    pub fn set_count(&mut self, particles: f32) {
        let n = Self::count_for(particles);
        let (w, h, rng) = (self.w, self.h, &mut self.rng);
        self.pop.set_len_with(n, || spawn(rng, w, h));
    }

    pub fn tick(&mut self, sample: Option<&FrequencySample>) {
        let bass = sample.filter(|s| !s.is_empty()).map_or(0.0, |s| s.level(1));
        let (w, h, rng) = (self.w, self.h, &mut self.rng);
        for s in self.pop.iter_mut() {
            s.x += s.vx * (1.0 + bass * 2.5);
            s.y += s.vy * (1.0 + bass * 2.5);
            s.rot += s.spin * (1.0 + bass * 1.5);
            s.age += 1.0;
            let outside = s.x < -MARGIN || s.x > w + MARGIN || s.y < -MARGIN || s.y > h + MARGIN;
            if s.age > s.life || outside || !s.x.is_finite() || !s.y.is_finite() {
                *s = spawn(rng, w, h);
            }
        }
    }

    pub fn draw(&self, surface: &mut Surface, color_a: Color, color_b: Color, glow: f32) {
        let glow = if glow.is_finite() { glow.max(0.0) } else { 0.0 };
        for s in self.pop.iter() {
            let base = color_a.mix(color_b, s.mix);
            let global = 0.12 + (1.0 - s.size / 200.0) * 0.6;
            let pts = s.vertices();

            let halo = base.with_alpha((glow / 80.0).clamp(0.02, 0.6) * global);
            let blur = glow * (0.8 + s.size / 200.0);
            let outline = (s.size / 24.0).max(1.0);
            glow_polyline(surface, &pts, true, outline, blur, halo);

            surface.stroke_polyline(&pts, true, outline, &Paint::Solid(base.with_alpha(0.95 * global)));
            let inner = (s.size / 48.0).max(0.8);
            surface.stroke_polyline(&pts, true, inner, &Paint::Solid(base.with_alpha(0.25 * global)));
        }
    }
}

fn spawn(rng: &mut fastrand::Rng, w: f32, h: f32) -> Shape {
    Shape {
        x: rng.f32() * w,
        y: rng.f32() * h,
        vx: (rng.f32() - 0.5) * 0.6,
        vy: (rng.f32() - 0.5) * 0.6,
        size: 8.0 + rng.f32() * 120.0,
        rot: rng.f32() * TAU,
        spin: (rng.f32() - 0.5) * 0.02,
        mix: rng.f32(),
        age: 0.0,
        life: 600.0 + rng.f32() * 600.0,
    }
}

fn extent(v: f32) -> f32 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}
