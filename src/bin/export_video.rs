use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result, bail};
use clap::Parser;
use specterr::capability::detect_ffmpeg;
use specterr::capture::{
    ExportFormat, ExportOutcome, ExportRequest, Exporter, FfmpegRecorderFactory, FfmpegTranscoder, Orientation,
    ProgressReporter, Resolution,
};
use specterr::clock::{FrameClock, OfflineClock, RealtimeClock};
use specterr::logging::{self, LogTarget};
use specterr::settings::{Preset, VisualConfig};
use specterr::signal::{SignalSource, TrackSignal};
use specterr::surface::RasterImage;
use specterr::visual::{Compositor, ParticleDirection, VisualMode, labels};

const DEFAULT_SEED: u64 = 0x5eed;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "export_video",
    version,
    about = "Render a WAV track through the visualizer and export it as video"
)]
pub(crate) struct Cli {
    #[arg(long, value_name = "WAV")]
    pub(crate) audio: PathBuf,

    #[arg(long, value_name = "DIR", default_value = ".")]
    pub(crate) out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ExportFormat::Mp4)]
    pub(crate) format: ExportFormat,

    #[arg(long, value_enum, default_value_t = Orientation::Horizontal)]
    pub(crate) orientation: Orientation,

    /// Delivered size, `WIDTHxHEIGHT`.
    #[arg(long, default_value = "1920x1080")]
    pub(crate) resolution: Resolution,

    #[arg(long, default_value_t = 20)]
    pub(crate) crf: u8,

    #[arg(long, default_value_t = 30)]
    pub(crate) fps: u32,

    /// Size of the rendered canvas before scaling.
    #[arg(long, default_value = "1280x720")]
    pub(crate) canvas: Resolution,

    #[arg(long, value_enum)]
    pub(crate) mode: Option<VisualMode>,

    #[arg(long, value_enum)]
    pub(crate) preset: Option<Preset>,

    #[arg(long, value_name = "FILE")]
    pub(crate) settings: Option<PathBuf>,

    #[arg(long, value_name = "IMAGE")]
    pub(crate) background: Option<PathBuf>,

    #[arg(long, value_name = "IMAGE")]
    pub(crate) logo: Option<PathBuf>,

    /// Label font; without it a system sans font is looked up.
    #[arg(long, value_name = "TTF")]
    pub(crate) font: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub(crate) direction: Option<ParticleDirection>,

    #[arg(long)]
    pub(crate) title: Option<String>,

    #[arg(long)]
    pub(crate) artist: Option<String>,

    #[arg(long, default_value = "specterr")]
    pub(crate) prefix: String,

    /// Pace frames to the wall clock and play the track while capturing.
    #[arg(long, default_value_t = false)]
    pub(crate) realtime: bool,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub(crate) seed: u64,

    #[arg(long, default_value = "ffmpeg")]
    pub(crate) ffmpeg: String,

    #[arg(long, default_value = "info")]
    pub(crate) log_level: String,
}

pub(crate) fn validate_args(args: &Cli) -> Result<()> {
    if args.fps == 0 || args.fps > 240 {
        bail!("--fps must be within 1..=240");
    }
    if args.crf > 63 {
        bail!("--crf must be within 0..=63");
    }
    if args.canvas.width % 2 != 0 || args.canvas.height % 2 != 0 {
        bail!("--canvas dimensions must be even, got {}", args.canvas);
    }
    if args.prefix.trim().is_empty() || args.prefix.contains(['/', '\\']) {
        bail!("--prefix must be a plain file name stem");
    }
    Ok(())
}

/// Settings file, then preset, then the individual overrides.
pub(crate) fn build_visual(args: &Cli) -> Result<VisualConfig> {
    let mut visual = VisualConfig::load(args.settings.as_deref()).context("load settings")?;
    if let Some(preset) = args.preset {
        preset.apply(&mut visual);
    }
    if let Some(mode) = args.mode {
        visual.mode = mode;
    }
    if let Some(title) = &args.title {
        visual.title = title.clone();
    }
    if let Some(artist) = &args.artist {
        visual.artist = artist.clone();
    }
    if let Some(direction) = args.direction {
        visual.particle_direction = direction;
    }
    Ok(visual)
}

pub(crate) fn export_request(args: &Cli) -> ExportRequest {
    ExportRequest {
        format: args.format,
        orientation: args.orientation,
        resolution: args.resolution,
        crf: args.crf,
        prefix: args.prefix.clone(),
    }
}

pub(crate) fn exit_code(outcome: &ExportOutcome) -> u8 {
    match outcome {
        ExportOutcome::Success { .. } => 0,
        ExportOutcome::Failed { .. } => 1,
        ExportOutcome::Fallback { .. } => 2,
    }
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    run(args)
}

fn run(args: Cli) -> Result<ExitCode> {
    validate_args(&args)?;
    logging::init(&args.log_level, LogTarget::Stderr)?;

    let visual = build_visual(&args)?;
    let report = detect_ffmpeg(&args.ffmpeg);
    tracing::info!("{}", report.status_label());

    let track = TrackSignal::open(&args.audio).with_context(|| format!("load {}", args.audio.display()))?;
    let mut signal: Box<dyn SignalSource> = if args.realtime {
        match track.with_output_device() {
            Ok(t) => Box::new(t),
            Err(err) => {
                tracing::warn!("no audio output, capturing without playback: {err:#}");
                Box::new(TrackSignal::open(&args.audio)?)
            }
        }
    } else {
        Box::new(track)
    };

    let mut compositor = Compositor::new(
        args.canvas.width as usize,
        args.canvas.height as usize,
        &visual,
        args.seed,
    );
    if let Some(path) = &args.background {
        compositor.set_background(Some(
            RasterImage::open(path).with_context(|| format!("open background {}", path.display()))?,
        ));
    }
    if let Some(path) = &args.logo {
        compositor.set_logo(Some(
            RasterImage::open(path).with_context(|| format!("open logo {}", path.display()))?,
        ));
    }
    match labels::open_label_font(args.font.as_deref()) {
        Ok(font) => compositor.set_font(Some(font)),
        Err(err) if args.font.is_none() => tracing::warn!("rendering without labels: {err:#}"),
        Err(err) => return Err(err),
    }

    let (progress, progress_rx) = ProgressReporter::channel();
    let printer = thread::spawn(move || {
        for pct in progress_rx {
            tracing::info!("export {pct}%");
        }
    });

    let mut clock: Box<dyn FrameClock> = if args.realtime {
        Box::new(RealtimeClock::new(args.fps))
    } else {
        Box::new(OfflineClock::new(args.fps))
    };
    let mut exporter = Exporter::new(
        Box::new(FfmpegRecorderFactory::from_report(&report)),
        Box::new(FfmpegTranscoder::new(report.binary.clone())),
        args.out_dir.clone(),
        progress,
    );
    let outcome = exporter.export_capture(
        &mut compositor,
        signal.as_mut(),
        &visual,
        clock.as_mut(),
        export_request(&args),
    )?;
    drop(exporter);
    let _ = printer.join();

    match &outcome {
        ExportOutcome::Success { path } => println!("{}", path.display()),
        ExportOutcome::Fallback { path, reason } => {
            tracing::warn!("delivered the raw capture instead: {reason}");
            println!("{}", path.display());
        }
        ExportOutcome::Failed { reason } => tracing::error!("export failed: {reason}"),
    }
    Ok(ExitCode::from(exit_code(&outcome)))
}
