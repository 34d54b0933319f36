use crate::color::Color;
use crate::visual::{ParticleDirection, VisualMode};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Snapshot of every visual control. Numeric fields accept any value; the
/// engines coerce at use.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualConfig {
    pub color_a: Color,
    pub color_b: Color,
    pub glow: f32,
    pub particles: f32,
    pub particle_direction: ParticleDirection,
    pub spectrum_size: f32,
    pub spectrum_pulse: f32,
    pub spectrum_thickness: f32,
    pub spectrum_height: f32,
    pub spectrum_bars: f32,
    pub min_freq: f32,
    pub max_freq: f32,
    pub title_size: f32,
    pub artist_size: f32,
    pub title: String,
    pub artist: String,
    pub mode: VisualMode,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            color_a: Color::rgb(0x00, 0xea, 0xff),
            color_b: Color::rgb(0xff, 0x3f, 0xa8),
            glow: 20.0,
            particles: 160.0,
            particle_direction: ParticleDirection::Float,
            spectrum_size: 120.0,
            spectrum_pulse: 60.0,
            spectrum_thickness: 2.0,
            spectrum_height: 60.0,
            spectrum_bars: 180.0,
            min_freq: 20.0,
            max_freq: 8000.0,
            title_size: 48.0,
            artist_size: 24.0,
            title: "CALL ME".to_string(),
            artist: "Campal Haze".to_string(),
            mode: VisualMode::Triangles,
        }
    }
}

/// Largest particle population any engine will hold.
pub const MAX_POPULATION: usize = 5000;
/// Largest bar count a spectrum layer will draw.
pub const MAX_BARS: usize = 2048;

/// NaN, infinities and negatives become 0; everything else is floored and
/// capped at [`MAX_POPULATION`].
pub fn coerce_count(v: f32) -> usize {
    coerce_capped(v, MAX_POPULATION)
}

/// Like [`coerce_count`], capped at [`MAX_BARS`].
pub fn coerce_bars(v: f32) -> usize {
    coerce_capped(v, MAX_BARS)
}

fn coerce_capped(v: f32, max: usize) -> usize {
    if v.is_finite() && v > 0.0 { (v.floor() as usize).min(max) } else { 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    Tron,
    Fire,
    Galaxy,
    Gothic,
    Cyber,
    All,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Tron,
        Preset::Fire,
        Preset::Galaxy,
        Preset::Gothic,
        Preset::Cyber,
        Preset::All,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Tron => "tron",
            Preset::Fire => "fire",
            Preset::Galaxy => "galaxy",
            Preset::Gothic => "gothic",
            Preset::Cyber => "cyber",
            Preset::All => "all",
        }
    }

    /// Overwrites colours, glow, population, mode, height, bars and window.
    /// Sizes, pulse, thickness and labels are left alone.
    pub fn apply(self, cfg: &mut VisualConfig) {
        let (a, b, glow, particles, mode, height, bars, min, max) = match self {
            Preset::Tron => ((0x00, 0xea, 0xff), (0x00, 0xff, 0xd4), 20.0, 240.0, VisualMode::Triangles, 60.0, 240.0, 20.0, 5000.0),
            Preset::Fire => ((0xff, 0x6b, 0x00), (0xff, 0x00, 0x22), 28.0, 200.0, VisualMode::Wave, 50.0, 180.0, 100.0, 3000.0),
            Preset::Galaxy => ((0x6f, 0x4c, 0xff), (0x00, 0xff, 0xd4), 16.0, 140.0, VisualMode::Rings, 80.0, 200.0, 50.0, 8000.0),
            Preset::Gothic => ((0xff, 0xd2, 0x7a), (0x6b, 0x3b, 0x00), 10.0, 80.0, VisualMode::Linear, 40.0, 120.0, 200.0, 2000.0),
            Preset::Cyber => ((0xff, 0x3f, 0xa8), (0x00, 0xea, 0xff), 22.0, 260.0, VisualMode::Particles, 90.0, 300.0, 10.0, 10000.0),
            Preset::All => ((0x00, 0xea, 0xff), (0xff, 0x3f, 0xa8), 20.0, 320.0, VisualMode::Triangles, 100.0, 360.0, 0.0, 22050.0),
        };
        cfg.color_a = Color::rgb(a.0, a.1, a.2);
        cfg.color_b = Color::rgb(b.0, b.1, b.2);
        cfg.glow = glow;
        cfg.particles = particles;
        cfg.mode = mode;
        cfg.spectrum_height = height;
        cfg.spectrum_bars = bars;
        cfg.min_freq = min;
        cfg.max_freq = max;
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

const HEADER: &str = "# specterr visual settings v1";

impl VisualConfig {
    /// Reads `key = value` lines over the defaults. A missing file yields the
    /// defaults; unknown keys are ignored; numbers are clamped into range.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        let mut cfg = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = idx + 1;
            let Some((key, value)) = line.split_once('=') else {
                return Err(SettingsError::Parse {
                    line: line_no,
                    message: "expected <key>=<value>".to_string(),
                });
            };
            cfg.set(key.trim(), value.trim())
                .map_err(|message| SettingsError::Parse { line: line_no, message })?;
        }
        Ok(cfg)
    }

    /// Applies one textual setting, the same way the file loader does.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let num = |lo: f32, hi: f32| -> Result<f32, String> {
            value
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(lo, hi))
                .ok_or_else(|| format!("{key} must be a number"))
        };
        let color = || Color::parse_hex(value).ok_or_else(|| format!("{key} must be #RRGGBB"));
        match key {
            "color_a" => self.color_a = color()?,
            "color_b" => self.color_b = color()?,
            "glow" => self.glow = num(0.0, 200.0)?,
            "particles" => self.particles = num(0.0, MAX_POPULATION as f32)?.floor(),
            "particle_direction" => {
                self.particle_direction =
                    ParticleDirection::from_name(value).ok_or_else(|| format!("unknown direction: {value}"))?;
            }
            "spectrum_size" => self.spectrum_size = num(0.0, 2000.0)?,
            "spectrum_pulse" => self.spectrum_pulse = num(0.0, 500.0)?,
            "spectrum_thickness" => self.spectrum_thickness = num(0.0, 100.0)?,
            "spectrum_height" => self.spectrum_height = num(0.0, 500.0)?,
            "spectrum_bars" => self.spectrum_bars = num(0.0, MAX_BARS as f32)?.floor(),
            "min_freq" => self.min_freq = num(0.0, 96_000.0)?,
            "max_freq" => self.max_freq = num(0.0, 96_000.0)?,
            "title_size" => self.title_size = num(0.0, 400.0)?,
            "artist_size" => self.artist_size = num(0.0, 400.0)?,
            "title" => self.title = value.to_string(),
            "artist" => self.artist = value.to_string(),
            "mode" => {
                self.mode = VisualMode::from_name(value).ok_or_else(|| format!("unknown mode: {value}"))?;
            }
            "preset" => {
                let preset = Preset::ALL
                    .into_iter()
                    .find(|p| p.name().eq_ignore_ascii_case(value))
                    .ok_or_else(|| format!("unknown preset: {value}"))?;
                preset.apply(self);
            }
            _ => tracing::debug!(key, "ignoring unknown setting"),
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        format!(
            "{HEADER}\n\
             mode = {}\n\
             color_a = {}\n\
             color_b = {}\n\
             glow = {}\n\
             particles = {}\n\
             particle_direction = {}\n\
             spectrum_size = {}\n\
             spectrum_pulse = {}\n\
             spectrum_thickness = {}\n\
             spectrum_height = {}\n\
             spectrum_bars = {}\n\
             min_freq = {}\n\
             max_freq = {}\n\
             title_size = {}\n\
             artist_size = {}\n\
             title = {}\n\
             artist = {}\n",
            self.mode.name(),
            self.color_a.to_hex(),
            self.color_b.to_hex(),
            self.glow,
            self.particles,
            self.particle_direction.name(),
            self.spectrum_size,
            self.spectrum_pulse,
            self.spectrum_thickness,
            self.spectrum_height,
            self.spectrum_bars,
            self.min_freq,
            self.max_freq,
            self.title_size,
            self.artist_size,
            self.title,
            self.artist,
        )
    }

    /// Writes through a sibling temp file and renames it into place.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_text()).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)
    }
}

pub fn settings_storage_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("specterr").join("settings.txt"));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".config").join("specterr").join("settings.txt"))
}
