use crate::capture::{ExportFormat, ExportRequest, Orientation, Resolution};
use crate::settings::Preset;
use crate::visual::{ParticleDirection, VisualMode};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "specterr", version, about = "Audio-reactive visualizer with video export")]
pub struct Config {
    /// WAV file to play and visualize. Without it the default input device is used.
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Substring of the input device name.
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, value_enum)]
    pub mode: Option<VisualMode>,

    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Settings file; defaults to the per-user config location.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Internal canvas; the terminal view is scaled down from it.
    #[arg(long, default_value = "1280x720")]
    pub canvas: Resolution,

    #[arg(long)]
    pub background: Option<PathBuf>,

    #[arg(long)]
    pub logo: Option<PathBuf>,

    /// TrueType/OpenType font for the title and artist labels.
    #[arg(long)]
    pub font: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub direction: Option<ParticleDirection>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ExportFormat::Mp4)]
    pub format: ExportFormat,

    #[arg(long, value_enum, default_value_t = Orientation::Horizontal)]
    pub orientation: Orientation,

    #[arg(long, default_value = "1920x1080")]
    pub resolution: Resolution,

    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u8).range(0..=63))]
    pub crf: u8,

    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,
}

impl Config {
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            format: self.format,
            orientation: self.orientation,
            resolution: self.resolution,
            crf: self.crf,
            ..ExportRequest::default()
        }
    }
}
