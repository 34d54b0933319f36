use super::population::Population;
use crate::color::Color;
use crate::settings::coerce_count;
use crate::signal::FrequencySample;
use crate::surface::{Paint, Surface};

const MARGIN: f32 = 40.0;
/// Steady push per tick for the directional modes, before audio.
const DRIFT: f32 = 0.02;
const AUDIO_DRIFT: f32 = 0.15;

/// Which way the field flows. `Float` wanders; the others drift steadily and
/// faster with louder bass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum ParticleDirection {
    #[default]
    Float,
    Up,
    Down,
    Left,
    Right,
}

impl ParticleDirection {
    pub const ALL: [ParticleDirection; 5] = [
        ParticleDirection::Float,
        ParticleDirection::Up,
        ParticleDirection::Down,
        ParticleDirection::Left,
        ParticleDirection::Right,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParticleDirection::Float => "float",
            ParticleDirection::Up => "up",
            ParticleDirection::Down => "down",
            ParticleDirection::Left => "left",
            ParticleDirection::Right => "right",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub mix: f32,
    pub age: f32,
    pub life: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleOptions {
    pub amount: f32,
    pub base_size: f32,
    pub speed: f32,
    pub direction: ParticleDirection,
    pub color_a: Color,
    pub color_b: Color,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self {
            amount: 160.0,
            base_size: 3.0,
            speed: 1.2,
            direction: ParticleDirection::Float,
            color_a: Color::rgb(0x00, 0xea, 0xff),
            color_b: Color::rgb(0xff, 0x3f, 0xa8),
        }
    }
}

/// Partial update for [`ParticleField::set_options`]; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticlePatch {
    pub amount: Option<f32>,
    pub base_size: Option<f32>,
    pub speed: Option<f32>,
    pub direction: Option<ParticleDirection>,
    pub color_a: Option<Color>,
    pub color_b: Option<Color>,
}

/// Drifting dots that age out and respawn. Energy in bin 1 shakes and speeds
/// them up.
pub struct ParticleField {
    w: f32,
    h: f32,
    opts: ParticleOptions,
    rng: fastrand::Rng,
    pop: Population<Particle>,
}

impl ParticleField {
    pub fn new(w: f32, h: f32, opts: ParticleOptions, rng: fastrand::Rng) -> Self {
        let mut field = Self {
            w: extent(w),
            h: extent(h),
            opts,
            rng,
            pop: Population::new(),
        };
        let n = coerce_count(opts.amount);
        let (w, h, rng) = (field.w, field.h, &mut field.rng);
        field.pop.reseed(n, || spawn(rng, w, h, &opts));
        field
    }

    pub fn len(&self) -> usize {
        self.pop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pop.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        self.pop.as_slice()
    }

    pub fn options(&self) -> &ParticleOptions {
        &self.opts
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.w, self.h)
    }

    /// Clamps every particle into the new bounds without reseeding.
    pub fn resize(&mut self, w: f32, h: f32) {
        self.w = extent(w);
        self.h = extent(h);
        let (w, h) = (self.w, self.h);
        for p in self.pop.iter_mut() {
            p.x = p.x.clamp(0.0, w);
            p.y = p.y.clamp(0.0, h);
        }
    }

    pub fn set_options(&mut self, patch: ParticlePatch) {
        if let Some(v) = patch.amount {
            self.opts.amount = coerce_count(v) as f32;
        }
        if let Some(v) = patch.base_size.filter(|v| v.is_finite()) {
            self.opts.base_size = v.max(0.0);
        }
        if let Some(v) = patch.speed.filter(|v| v.is_finite()) {
            self.opts.speed = v;
        }
        if let Some(d) = patch.direction {
            self.opts.direction = d;
        }
        if let Some(c) = patch.color_a {
            self.opts.color_a = c;
        }
        if let Some(c) = patch.color_b {
            self.opts.color_b = c;
        }
        let n = self.opts.amount as usize;
        let (w, h, opts, rng) = (self.w, self.h, self.opts, &mut self.rng);
        self.pop.set_len_with(n, || spawn(rng, w, h, &opts));
    }

    pub fn tick(&mut self, sample: Option<&FrequencySample>) {
        let energy = sample.filter(|s| !s.is_empty()).map_or(0.0, |s| s.level(1));
        let (w, h, opts, rng) = (self.w, self.h, self.opts, &mut self.rng);
        let push = DRIFT + energy * 2.0 * AUDIO_DRIFT;
        for p in self.pop.iter_mut() {
            match opts.direction {
                ParticleDirection::Float => {
                    p.vx += (rng.f32() - 0.5) * 0.08 + (rng.f32() - 0.5) * energy * 0.6;
                    p.vy += (rng.f32() - 0.5) * 0.08 + (rng.f32() - 0.5) * energy * 0.6;
                }
                ParticleDirection::Up => {
                    p.vx += (rng.f32() - 0.5) * 0.02;
                    p.vy -= push;
                }
                ParticleDirection::Down => {
                    p.vx += (rng.f32() - 0.5) * 0.02;
                    p.vy += push;
                }
                ParticleDirection::Left => p.vx -= push,
                ParticleDirection::Right => p.vx += push,
            }
            p.vx *= 0.988;
            p.vy *= 0.988;
            p.x += p.vx * (1.0 + energy * 1.4);
            p.y += p.vy * (1.0 + energy * 1.4);
            p.age += 1.0;
            let outside = p.x < -MARGIN || p.x > w + MARGIN || p.y < -MARGIN || p.y > h + MARGIN;
            if p.age > p.life || outside || !p.x.is_finite() || !p.y.is_finite() {
                *p = spawn(rng, w, h, &opts);
            }
        }
    }

    pub fn draw(&self, surface: &mut Surface, opacity: f32) {
        let (a, b) = (self.opts.color_a, self.opts.color_b);
        for p in self.pop.iter() {
            let alpha = ((1.0 - p.age / p.life) * opacity).clamp(0.03, 0.95);
            let color = a.mix(b, p.mix).with_alpha(alpha);
            surface.fill_circle(p.x, p.y, p.size.max(0.6), &Paint::Solid(color));
        }
    }
}

fn spawn(rng: &mut fastrand::Rng, w: f32, h: f32, opts: &ParticleOptions) -> Particle {
    Particle {
        x: rng.f32() * w,
        y: rng.f32() * h,
        vx: (rng.f32() - 0.5) * opts.speed,
        vy: (rng.f32() - 0.5) * opts.speed,
        size: rng.f32() * opts.base_size + 0.8,
        mix: rng.f32(),
        age: rng.f32() * 100.0,
        life: 120.0 + rng.f32() * 180.0,
    }
}

fn extent(v: f32) -> f32 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}
