use crate::capability::detect_ffmpeg;
use crate::capture::{
    CaptureGeometry, CaptureSession, ExportOutcome, Exporter, FfmpegRecorderFactory, FfmpegTranscoder,
    ProgressReporter, capture_frame,
};
use crate::clock::{FrameClock, RealtimeClock};
use crate::config::Config;
use crate::render::{Frame, HalfBlockRenderer, Renderer};
use crate::settings::{Preset, VisualConfig, settings_storage_path};
use crate::signal::{LiveSignal, SignalSource, TrackSignal};
use crate::surface::RasterImage;
use crate::terminal::TerminalGuard;
use crate::visual::{Compositor, labels};
use anyhow::Context;
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::BufWriter;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const PARTICLE_STEP: f32 = 20.0;
const BAR_STEP: f32 = 10.0;

/// Export work that outlives a single frame.
enum ExportSlot {
    Idle(Exporter),
    Capturing(Exporter, CaptureSession),
    Finishing(JoinHandle<(Exporter, ExportOutcome)>),
    /// Only observable if a finish thread panicked.
    Lost,
}

struct ExportUi {
    slot: ExportSlot,
    progress_rx: Receiver<u8>,
    progress: u8,
    status: String,
}

impl ExportUi {
    fn new(cfg: &Config) -> Self {
        let report = detect_ffmpeg(&cfg.ffmpeg);
        let status = report.status_label();
        let (progress, progress_rx) = ProgressReporter::channel();
        let exporter = Exporter::new(
            Box::new(FfmpegRecorderFactory::from_report(&report)),
            Box::new(FfmpegTranscoder::new(report.binary.clone())),
            cfg.out_dir.clone(),
            progress,
        );
        Self {
            slot: ExportSlot::Idle(exporter),
            progress_rx,
            progress: 0,
            status,
        }
    }

    fn start(&mut self, signal: &mut dyn SignalSource, cfg: &Config, geometry: CaptureGeometry) {
        let slot = std::mem::replace(&mut self.slot, ExportSlot::Lost);
        self.slot = match slot {
            ExportSlot::Idle(mut exporter) => {
                let (progress, rx) = ProgressReporter::channel();
                exporter.set_progress(progress);
                self.progress_rx = rx;
                self.progress = 0;
                match exporter.begin(signal, cfg.export_request(), geometry) {
                    Ok(Ok(session)) => {
                        self.status = "capturing".to_string();
                        ExportSlot::Capturing(exporter, session)
                    }
                    Ok(Err(outcome)) => {
                        self.status = describe(&outcome);
                        ExportSlot::Idle(exporter)
                    }
                    Err(err) => {
                        self.status = err.to_string();
                        ExportSlot::Idle(exporter)
                    }
                }
            }
            busy => busy,
        };
    }

    /// Moves a stopped capture onto a worker thread and collects finished ones.
    fn poll(&mut self) {
        while let Ok(pct) = self.progress_rx.try_recv() {
            self.progress = self.progress.max(pct);
        }
        let slot = std::mem::replace(&mut self.slot, ExportSlot::Lost);
        self.slot = match slot {
            ExportSlot::Capturing(exporter, session) if !session.is_capturing() => {
                self.status = "encoding".to_string();
                let finished = session.finalize();
                let mut exporter = exporter;
                ExportSlot::Finishing(thread::spawn(move || {
                    let outcome = exporter.finish(finished);
                    (exporter, outcome)
                }))
            }
            ExportSlot::Finishing(handle) if handle.is_finished() => match handle.join() {
                Ok((exporter, outcome)) => {
                    self.status = describe(&outcome);
                    ExportSlot::Idle(exporter)
                }
                Err(_) => {
                    tracing::error!("export worker panicked");
                    self.status = "export worker panicked".to_string();
                    ExportSlot::Lost
                }
            },
            other => other,
        };
    }

    fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        match &mut self.slot {
            ExportSlot::Capturing(_, session) => Some(session),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self.slot {
            ExportSlot::Capturing(..) | ExportSlot::Finishing(_) => format!("{} {}%", self.status, self.progress),
            _ => self.status.clone(),
        }
    }

    /// Waits for a running finish stage so a quit never loses the file.
    fn drain(self) {
        if let ExportSlot::Finishing(handle) = self.slot {
            if let Ok((_, outcome)) = handle.join() {
                tracing::info!("{}", describe(&outcome));
            }
        }
    }
}

fn describe(outcome: &ExportOutcome) -> String {
    match outcome {
        ExportOutcome::Success { path } => format!("saved {}", path.display()),
        ExportOutcome::Fallback { path, .. } => format!("fallback saved {}", path.display()),
        ExportOutcome::Failed { reason } => format!("export failed: {reason}"),
    }
}

fn open_signal(cfg: &Config) -> anyhow::Result<Box<dyn SignalSource>> {
    match &cfg.audio {
        Some(path) => {
            let track = TrackSignal::open(path).with_context(|| format!("load {}", path.display()))?;
            let mut signal: Box<dyn SignalSource> = match track.with_output_device() {
                Ok(t) => Box::new(t),
                Err(err) => {
                    tracing::warn!("no audio output, visualizing silently: {err:#}");
                    Box::new(TrackSignal::open(path)?)
                }
            };
            signal.resume()?;
            Ok(signal)
        }
        None => {
            let mut signal = LiveSignal::open(cfg.device.as_deref()).context("open input device")?;
            signal.resume()?;
            Ok(Box::new(signal))
        }
    }
}

fn load_art(path: Option<&PathBuf>) -> Option<RasterImage> {
    let path = path?;
    match RasterImage::open(path) {
        Ok(img) => Some(img),
        Err(err) => {
            tracing::warn!("skipping image {}: {err:#}", path.display());
            None
        }
    }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let settings_path = cfg.settings.clone().or_else(settings_storage_path);
    let mut visual = VisualConfig::load(settings_path.as_deref()).context("load settings")?;
    if let Some(preset) = cfg.preset {
        preset.apply(&mut visual);
    }
    if let Some(mode) = cfg.mode {
        visual.mode = mode;
    }
    if let Some(direction) = cfg.direction {
        visual.particle_direction = direction;
    }

    let mut signal = open_signal(&cfg)?;
    let mut compositor = Compositor::new(
        cfg.canvas.width as usize,
        cfg.canvas.height as usize,
        &visual,
        cfg.seed,
    );
    compositor.set_background(load_art(cfg.background.as_ref()));
    compositor.set_logo(load_art(cfg.logo.as_ref()));
    match labels::open_label_font(cfg.font.as_deref()) {
        Ok(font) => compositor.set_font(Some(font)),
        Err(err) => tracing::warn!("labels disabled: {err:#}"),
    }
    let mut export = ExportUi::new(&cfg);

    let _term = TerminalGuard::enter()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = HalfBlockRenderer::new();
    let mut clock = RealtimeClock::new(cfg.fps);
    let mut fps = FpsCounter::new();
    let mut show_hud = true;
    let mut last_size = TerminalGuard::size()?;

    loop {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    let action = handle_key(k.code, k.modifiers, &mut visual, signal.as_mut(), &mut show_hud);
                    match action {
                        KeyAction::Quit => {
                            save_settings(&visual, settings_path.as_ref());
                            export.drain();
                            return Ok(());
                        }
                        KeyAction::Export => {
                            let geometry = CaptureGeometry {
                                width: compositor.surface().width(),
                                height: compositor.surface().height(),
                                fps: clock.fps(),
                            };
                            export.start(signal.as_mut(), &cfg, geometry);
                        }
                        KeyAction::Save => save_settings(&visual, settings_path.as_ref()),
                        KeyAction::None => {}
                    }
                }
                Event::Resize(c, r) => last_size = (c, r),
                _ => {}
            }
        }
        if let Ok(sz) = crossterm::terminal::size() {
            last_size = sz;
        }

        let Some(tick) = clock.next_frame() else {
            break;
        };
        match export.session_mut() {
            Some(session) => capture_frame(&mut compositor, signal.as_mut(), &visual, &tick, session),
            None => compositor.render(signal.as_mut(), &visual, &tick),
        }
        export.poll();
        fps.tick();

        let (cols, rows) = last_size;
        let hud = if show_hud {
            build_hud(&visual, signal.as_ref(), fps.fps(), &export.label())
        } else {
            String::new()
        };
        let hud_rows = (hud.lines().count() as u16).min(rows.saturating_sub(1));
        let surface = compositor.surface();
        let frame = Frame {
            term_cols: cols,
            visual_rows: rows.saturating_sub(hud_rows).max(1),
            hud_rows,
            canvas_width: surface.width(),
            canvas_height: surface.height(),
            pixels_rgba: surface.pixels(),
            hud: &hud,
            sync_updates: true,
        };
        renderer.render(&frame, &mut out)?;
    }
    export.drain();
    Ok(())
}

fn save_settings(visual: &VisualConfig, path: Option<&PathBuf>) {
    let Some(path) = path else {
        return;
    };
    match visual.save(path) {
        Ok(()) => tracing::info!(path = %path.display(), "settings saved"),
        Err(err) => tracing::warn!("{err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
    Export,
    Save,
}

fn handle_key(
    code: KeyCode,
    mods: KeyModifiers,
    visual: &mut VisualConfig,
    signal: &mut dyn SignalSource,
    show_hud: &mut bool,
) -> KeyAction {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return KeyAction::Quit;
    }
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return KeyAction::Quit,
        KeyCode::Left => visual.mode = visual.mode.prev(),
        KeyCode::Right => visual.mode = visual.mode.next(),
        KeyCode::Char(c @ '1'..='6') => {
            let idx = c as usize - '1' as usize;
            if let Some(preset) = Preset::ALL.get(idx) {
                preset.apply(visual);
            }
        }
        KeyCode::Char(' ') => {
            if signal.is_playing() {
                signal.pause();
            } else if let Err(err) = signal.resume() {
                tracing::warn!("resume failed: {err:#}");
            }
        }
        KeyCode::Char('s') | KeyCode::Char('S') => {
            signal.pause();
            signal.rewind();
        }
        KeyCode::Up => visual.particles = (visual.particles + PARTICLE_STEP).min(2000.0),
        KeyCode::Down => visual.particles = (visual.particles - PARTICLE_STEP).max(0.0),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            visual.spectrum_bars = (visual.spectrum_bars + BAR_STEP).min(720.0)
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            visual.spectrum_bars = (visual.spectrum_bars - BAR_STEP).max(0.0)
        }
        KeyCode::Char('e') | KeyCode::Char('E') => return KeyAction::Export,
        KeyCode::Char('w') | KeyCode::Char('W') => return KeyAction::Save,
        KeyCode::Char('i') | KeyCode::Char('I') => *show_hud = !*show_hud,
        _ => {}
    }
    KeyAction::None
}

fn build_hud(visual: &VisualConfig, signal: &dyn SignalSource, fps: f32, export: &str) -> String {
    let source = match signal.media() {
        Some(m) => m
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| m.path.display().to_string()),
        None => "live input".to_string(),
    };
    [
        format!(
            "Mode: {} | Particles: {:.0} | Bars: {:.0} | {} ({}) | FPS: {:>4.1}",
            visual.mode.name(),
            visual.particles,
            visual.spectrum_bars,
            source,
            if signal.is_playing() { "playing" } else { "paused" },
            fps,
        ),
        format!("Export: {export}"),
        "Keys: ←/→ mode | 1-6 preset | space play/pause | s stop | ↑/↓ particles | +/- bars | e export | w save | i HUD | q quit"
            .to_string(),
    ]
    .join("\n")
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let dt = self.last.elapsed().as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = Instant::now();
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
