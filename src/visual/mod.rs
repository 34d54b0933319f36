pub mod labels;
pub mod particles;
pub mod population;
pub mod shapes;
pub mod spectrum;

use crate::clock::FrameTick;
use crate::color::Color;
use crate::settings::{VisualConfig, coerce_bars};
use crate::signal::{FrequencySample, SignalSource};
use crate::surface::{CircleClip, Paint, RasterImage, Surface, cover_fit};

pub use labels::LabelFont;
pub use particles::{Particle, ParticleDirection, ParticleField, ParticleOptions, ParticlePatch};
pub use population::Population;
pub use shapes::{Shape, ShapeField};
pub use spectrum::{BinMap, FreqWindow, SpectrumStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum VisualMode {
    Triangles,
    Rings,
    Particles,
    Wave,
    Linear,
    Halo,
    Aura,
    Energy,
    Retro,
}

/// One drawing pass of a mode, in paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Shapes,
    Circular,
    Arcs,
    SmallCircular,
    Wave,
    Linear,
    Halo,
    Aura,
    Energy,
    Retro,
}

impl VisualMode {
    pub const ALL: [VisualMode; 9] = [
        VisualMode::Triangles,
        VisualMode::Rings,
        VisualMode::Particles,
        VisualMode::Wave,
        VisualMode::Linear,
        VisualMode::Halo,
        VisualMode::Aura,
        VisualMode::Energy,
        VisualMode::Retro,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Triangles => "triangles",
            Self::Rings => "rings",
            Self::Particles => "particles",
            Self::Wave => "wave",
            Self::Linear => "linear",
            Self::Halo => "halo",
            Self::Aura => "aura",
            Self::Energy => "energy",
            Self::Retro => "retro",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|m| m.name().eq_ignore_ascii_case(s))
    }

    pub fn layers(self) -> &'static [Layer] {
        match self {
            Self::Triangles | Self::Rings => &[Layer::Shapes, Layer::Circular, Layer::Arcs],
            Self::Particles => &[Layer::Shapes, Layer::SmallCircular],
            Self::Wave => &[Layer::Wave],
            Self::Linear => &[Layer::Linear],
            Self::Halo => &[Layer::Halo],
            Self::Aura => &[Layer::Aura],
            Self::Energy => &[Layer::Energy],
            Self::Retro => &[Layer::Retro],
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Approximates a blurred shadow under a stroke with a few wide translucent passes.
pub(crate) fn glow_polyline(surface: &mut Surface, pts: &[(f32, f32)], closed: bool, width: f32, blur: f32, color: Color) {
    if !(blur > 0.5) || color.a <= 0.0 {
        return;
    }
    for (spread, share) in [(1.0, 0.2), (0.6, 0.3), (0.3, 0.5)] {
        let paint = Paint::Solid(color.fade(share));
        surface.stroke_polyline(pts, closed, width + blur * spread, &paint);
    }
}

const BACKGROUND_TOP: Color = Color::rgb(0x03, 0x03, 0x13);
const BACKGROUND_BOTTOM: Color = Color::rgb(0x07, 0x10, 0x28);

/// Owns the surface and every stateful engine; draws one frame per call.
pub struct Compositor {
    surface: Surface,
    particles: ParticleField,
    shapes: ShapeField,
    shape_basis: f32,
    sample: FrequencySample,
    rng: fastrand::Rng,
    background: Option<RasterImage>,
    logo: Option<RasterImage>,
    font: Option<LabelFont>,
}

impl Compositor {
    pub fn new(w: usize, h: usize, cfg: &VisualConfig, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let opts = ParticleOptions {
            amount: cfg.particles,
            direction: cfg.particle_direction,
            color_a: cfg.color_a,
            color_b: cfg.color_b,
            ..ParticleOptions::default()
        };
        let particles = ParticleField::new(w as f32, h as f32, opts, rng.fork());
        let shapes = ShapeField::new(w as f32, h as f32, cfg.particles, rng.fork());
        Self {
            surface: Surface::new(w, h),
            particles,
            shapes,
            shape_basis: cfg.particles,
            sample: FrequencySample::new(0),
            rng,
            background: None,
            logo: None,
            font: None,
        }
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        if (w, h) == (self.surface.width(), self.surface.height()) {
            return;
        }
        self.surface.resize(w, h);
        self.particles.resize(w as f32, h as f32);
        self.shapes.resize(w as f32, h as f32);
    }

    pub fn set_background(&mut self, img: Option<RasterImage>) {
        self.background = img;
    }

    pub fn set_logo(&mut self, img: Option<RasterImage>) {
        self.logo = img;
    }

    /// Labels are skipped while no font is set.
    pub fn set_font(&mut self, font: Option<LabelFont>) {
        self.font = font;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn sample(&self) -> &FrequencySample {
        &self.sample
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn shapes(&self) -> &ShapeField {
        &self.shapes
    }

    /// Paints one frame: background, particles, mode layers, logo, labels.
    pub fn render(&mut self, signal: &mut dyn SignalSource, cfg: &VisualConfig, tick: &FrameTick) {
        if self.sample.len() != signal.bin_count() {
            self.sample = FrequencySample::new(signal.bin_count());
        }
        if cfg.particles.to_bits() != self.shape_basis.to_bits() {
            self.shape_basis = cfg.particles;
            self.shapes.set_count(cfg.particles);
        }

        self.surface.clear(Color::BLACK);
        self.draw_background();

        signal.advance(tick.dt);
        signal.refresh(&mut self.sample);

        self.particles.set_options(ParticlePatch {
            amount: Some(cfg.particles),
            direction: Some(cfg.particle_direction),
            color_a: Some(cfg.color_a),
            color_b: Some(cfg.color_b),
            ..ParticlePatch::default()
        });
        self.particles.tick(Some(&self.sample));
        self.particles.draw(&mut self.surface, 0.95);

        let layers = cfg.mode.layers();
        if layers.contains(&Layer::Shapes) {
            self.shapes.tick(Some(&self.sample));
        }
        for layer in layers {
            self.draw_layer(*layer, cfg, signal.sample_rate());
        }

        self.draw_logo();
        self.draw_labels(cfg);
    }

    fn draw_background(&mut self) {
        let (w, h) = self.surface.size();
        match &self.background {
            Some(img) => {
                let dest = cover_fit(img.aspect(), 0.0, 0.0, w, h);
                self.surface.draw_image(img, dest, 0.92, None);
            }
            None => {
                let paint = Paint::linear((0.0, 0.0), (w, h), BACKGROUND_TOP, BACKGROUND_BOTTOM);
                self.surface.fill(&paint);
            }
        }
    }

    fn draw_layer(&mut self, layer: Layer, cfg: &VisualConfig, sample_rate: u32) {
        let (w, h) = self.surface.size();
        let center = (w / 2.0, h / 2.0);
        let base_r = cfg.spectrum_size * 0.8;
        let style = SpectrumStyle {
            bars: coerce_bars(cfg.spectrum_bars),
            thickness: cfg.spectrum_thickness,
            color_a: cfg.color_a,
            color_b: cfg.color_b,
            height: cfg.spectrum_height,
            pulse: 1.0 + cfg.spectrum_pulse / 120.0,
            sample_rate,
            window: Some(FreqWindow {
                min_hz: cfg.min_freq,
                max_hz: cfg.max_freq,
            }),
            ..SpectrumStyle::default()
        };
        let s = &mut self.surface;
        let sample = &self.sample;
        match layer {
            Layer::Shapes => self.shapes.draw(s, cfg.color_a, cfg.color_b, cfg.glow),
            Layer::Circular => spectrum::draw_circular(s, center, base_r, sample, &style),
            Layer::Arcs => spectrum::draw_arcs(s, center, base_r * 0.9, sample, &style, &mut self.rng),
            Layer::SmallCircular => {
                let small = SpectrumStyle {
                    bars: 110,
                    thickness: 2.0,
                    pulse: 1.2,
                    ..style
                };
                spectrum::draw_circular(s, center, w.min(h) * 0.18, sample, &small);
            }
            Layer::Wave => {
                let amplitude = w.min(h) * 0.18 * (cfg.spectrum_pulse / 120.0);
                spectrum::draw_wave(s, center, cfg.spectrum_size * 0.6, amplitude, sample, &style);
            }
            Layer::Linear => {
                let bar_w = (w * 0.9).min(1400.0);
                let linear = SpectrumStyle {
                    bars: 200,
                    pulse: 1.4,
                    ..style
                };
                spectrum::draw_linear(s, ((w - bar_w) / 2.0, h * 0.28, bar_w, h * 0.44), sample, &linear);
            }
            Layer::Halo => spectrum::draw_halo(s, center, base_r, sample, &style),
            Layer::Aura => spectrum::draw_aura(s, center, base_r, sample, &style),
            Layer::Energy => spectrum::draw_energy(s, center, base_r, sample, &style),
            Layer::Retro => spectrum::draw_retro(s, center, base_r, sample, &style),
        }
    }

    fn draw_logo(&mut self) {
        let Some(img) = &self.logo else {
            return;
        };
        let (w, h) = self.surface.size();
        let size = w.min(h) * 0.18;
        let (cx, cy) = (w / 2.0, h / 2.0);
        let dest = cover_fit(img.aspect(), cx - size / 2.0, cy - size / 2.0, size, size);
        let clip = CircleClip {
            cx,
            cy,
            r: size / 2.0 + 4.0,
        };
        self.surface.draw_image(img, dest, 1.0, Some(clip));
    }

    fn draw_labels(&mut self, cfg: &VisualConfig) {
        let Some(font) = self.font.as_mut() else {
            return;
        };
        let (w, h) = self.surface.size();
        let cx = w / 2.0;
        let title = if cfg.title.is_empty() { "CALL ME" } else { &cfg.title };
        let artist = if cfg.artist.is_empty() { "Campal Haze" } else { &cfg.artist };
        let title_size = if cfg.title_size > 0.0 { cfg.title_size } else { 48.0 };
        let artist_size = if cfg.artist_size > 0.0 { cfg.artist_size } else { 24.0 };
        font.draw_label(&mut self.surface, title, cx, h - 120.0, title_size, cfg.color_a, cfg.glow);
        font.draw_label(
            &mut self.surface,
            artist,
            cx,
            h - 80.0,
            artist_size,
            cfg.color_b,
            (cfg.glow * 0.5).max(2.0),
        );
    }
}

