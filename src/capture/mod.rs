pub mod progress;
pub mod recorder;
pub mod transcode;

use crate::capability::{Container, RecorderProfile};
use crate::clock::{FrameClock, FrameTick};
use crate::settings::VisualConfig;
use crate::signal::{MediaInfo, SignalSource};
use crate::surface::Surface;
use crate::visual::Compositor;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use progress::ProgressReporter;
pub use recorder::{
    CapturedBlob, FfmpegRecorder, FfmpegRecorderFactory, RecordSpec, Recorder, RecorderFactory, RecorderState,
    Recording, Y4mRecorder,
};
pub use transcode::{FfmpegTranscoder, TranscodeJob, Transcoder, parse_progress_line};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("encoder unavailable: {0}")]
    Unavailable(String),
    #[error("transcoder is not loaded")]
    NotLoaded,
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{0} pipe was not available")]
    Pipe(&'static str),
    #[error("encoder exited with {status}: {stderr}")]
    Encoder { status: String, stderr: String },
    #[error("recorder already started")]
    AlreadyStarted,
    #[error("recorder is not recording")]
    NotRecording,
    #[error("frame has {got} bytes, expected {expected}")]
    FrameSize { expected: usize, got: usize },
    #[error("encoder produced no output")]
    EmptyOutput,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Preconditions that stop an export before any work is done.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no audio loaded; load a track before exporting")]
    NoAudio,
    #[error("could not resume playback: {0}")]
    Resume(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Mp4,
    Webm,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }

    /// True when the capture can be delivered as-is.
    pub fn matches(self, container: Container) -> bool {
        self.extension() == container.extension()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn name(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid dimension '{v}' in '{s}'"))
        };
        Ok(Resolution {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub orientation: Orientation,
    pub resolution: Resolution,
    pub crf: u8,
    pub prefix: String,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp4,
            orientation: Orientation::Horizontal,
            resolution: Resolution::FULL_HD,
            crf: 20,
            prefix: "specterr".to_string(),
        }
    }
}

impl ExportRequest {
    pub fn raw_name(&self, container: Container) -> String {
        format!("{}_export_{}.{}", self.prefix, self.orientation.name(), container.extension())
    }

    pub fn fallback_name(&self, container: Container) -> String {
        format!("{}_fallback_{}.{}", self.prefix, self.orientation.name(), container.extension())
    }

    pub fn encoded_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.prefix,
            self.orientation.name(),
            self.resolution,
            self.format.extension()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Success { path: PathBuf },
    /// The raw capture was delivered because transcoding was impossible.
    Fallback { path: PathBuf, reason: String },
    Failed { reason: String },
}

impl ExportOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ExportOutcome::Success { path } | ExportOutcome::Fallback { path, .. } => Some(path),
            ExportOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Capturing,
    Finalizing,
    Encoding,
    Fallback,
    Done,
    Failed,
}

impl ExportState {
    pub fn can_transition_to(self, next: ExportState) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Idle, Capturing)
                | (Idle, Failed)
                | (Capturing, Finalizing)
                | (Finalizing, Encoding)
                | (Finalizing, Done)
                | (Finalizing, Fallback)
                | (Finalizing, Failed)
                | (Encoding, Done)
                | (Encoding, Fallback)
                | (Fallback, Done)
                | (Fallback, Failed)
                | (Done, Failed)
        )
    }
}

const DEFAULT_CAPTURE_SECS: f64 = 60.0;
const MIN_CAPTURE_SECS: f64 = 5.0;
const MAX_CAPTURE_SECS: f64 = 3600.0;

/// Seconds after which a capture is stopped even without an end-of-track
/// event: `clamp(floor(duration), 5, 3600) + 1`, with 60 s standing in for a
/// missing or zero duration.
pub fn capture_bound_secs(duration_s: f64) -> f64 {
    let d = if duration_s.is_finite() && duration_s > 0.0 {
        duration_s.floor()
    } else {
        DEFAULT_CAPTURE_SECS
    };
    d.clamp(MIN_CAPTURE_SECS, MAX_CAPTURE_SECS) + 1.0
}

/// Frame size and rate of the captured surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureGeometry {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
}

/// One capture in progress, from the first frame to the stop request.
pub struct CaptureSession {
    state: ExportState,
    recorder: Box<dyn Recorder>,
    profile: RecorderProfile,
    request: ExportRequest,
    media: MediaInfo,
    fps: u32,
    bound_frames: u64,
    frames: u64,
    recording: Option<Recording>,
    error: Option<String>,
    progress: ProgressReporter,
}

impl CaptureSession {
    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn request(&self) -> &ExportRequest {
        &self.request
    }

    pub fn media(&self) -> &MediaInfo {
        &self.media
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bound_frames(&self) -> u64 {
        self.bound_frames
    }

    pub fn is_capturing(&self) -> bool {
        self.state == ExportState::Capturing
    }

    fn transition(&mut self, next: ExportState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(from = ?self.state, to = ?next, "export state");
            self.state = next;
        } else {
            tracing::warn!(from = ?self.state, to = ?next, "ignored export state change");
        }
    }

    /// Taps one finished frame. Stops automatically once the bound is reached.
    pub fn on_frame(&mut self, surface: &Surface) {
        if self.state != ExportState::Capturing {
            return;
        }
        if let Err(err) = self.recorder.push_frame(surface.pixels()) {
            tracing::warn!("recorder rejected frame: {err}");
            self.error = Some(err.to_string());
            self.request_stop();
            return;
        }
        self.frames += 1;
        self.progress
            .report_capture(self.frames as f64 / self.bound_frames.max(1) as f64);
        if self.frames >= self.bound_frames {
            tracing::info!(frames = self.frames, "capture bound reached");
            self.request_stop();
        }
    }

    /// Stops the recorder. Whichever of end-of-track and the bound comes
    /// first wins; later calls do nothing.
    pub fn request_stop(&mut self) {
        if self.state != ExportState::Capturing {
            return;
        }
        match self.recorder.stop() {
            Ok(Some(rec)) => self.recording = Some(rec),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("recorder failed while stopping: {err}");
                self.error = Some(err.to_string());
            }
        }
        self.transition(ExportState::Finalizing);
        self.progress.report(progress::CAPTURE_END);
    }

    /// Concatenates the buffered output, ready for delivery.
    pub fn finalize(mut self) -> FinishedCapture {
        self.request_stop();
        let blob = self.recording.take().map(Recording::into_blob).filter(|b| !b.is_empty());
        FinishedCapture {
            state: self.state,
            blob,
            container: self.profile.container,
            request: self.request,
            duration_s: Some(self.frames as f64 / self.fps as f64),
            error: self.error,
        }
    }
}

/// A stopped capture waiting to be encoded or delivered.
pub struct FinishedCapture {
    state: ExportState,
    blob: Option<CapturedBlob>,
    container: Container,
    request: ExportRequest,
    duration_s: Option<f64>,
    error: Option<String>,
}

impl FinishedCapture {
    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn blob(&self) -> Option<&CapturedBlob> {
        self.blob.as_ref()
    }

    fn transition(&mut self, next: ExportState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(from = ?self.state, to = ?next, "export state");
            self.state = next;
        }
    }
}

/// Drives captures and turns them into delivered files. The transcoder is
/// kept across exports so it is loaded at most once.
pub struct Exporter {
    factory: Box<dyn RecorderFactory>,
    transcoder: Box<dyn Transcoder>,
    output_dir: PathBuf,
    progress: ProgressReporter,
}

impl Exporter {
    pub fn new(
        factory: Box<dyn RecorderFactory>,
        transcoder: Box<dyn Transcoder>,
        output_dir: impl Into<PathBuf>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            factory,
            transcoder,
            output_dir: output_dir.into(),
            progress,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn set_progress(&mut self, progress: ProgressReporter) {
        self.progress = progress;
    }

    /// Starts recording. Requires a loaded track; resumes it, starts the
    /// recorder, then rewinds playback to the beginning.
    ///
    /// A recorder that refuses to start yields `Ok(Err(outcome))` carrying
    /// [`ExportOutcome::Failed`].
    pub fn begin(
        &mut self,
        signal: &mut dyn SignalSource,
        request: ExportRequest,
        geometry: CaptureGeometry,
    ) -> Result<Result<CaptureSession, ExportOutcome>, ExportError> {
        let media = signal.media().ok_or(ExportError::NoAudio)?;
        signal.resume().map_err(|e| ExportError::Resume(format!("{e:#}")))?;

        let profile = self.factory.profile();
        let bound = capture_bound_secs(media.duration_s);
        let fps = geometry.fps.max(1);
        let spec = RecordSpec {
            width: geometry.width,
            height: geometry.height,
            fps,
            audio: Some(media.path.clone()),
            max_duration_s: bound,
            chunk_interval: recorder::CHUNK_INTERVAL,
        };
        let mut recorder = self.factory.create();
        if let Err(err) = recorder.start(&spec) {
            tracing::error!("recorder failed to start: {err}");
            return Ok(Err(ExportOutcome::Failed {
                reason: format!("could not start recorder ({}): {err}", profile.mime()),
            }));
        }
        signal.rewind();
        tracing::info!(
            mime = profile.mime(),
            bound_s = bound,
            format = request.format.extension(),
            "capture started"
        );

        Ok(Ok(CaptureSession {
            state: ExportState::Capturing,
            recorder,
            profile,
            request,
            media,
            fps,
            bound_frames: (bound * fps as f64).ceil() as u64,
            frames: 0,
            recording: None,
            error: None,
            progress: self.progress.clone(),
        }))
    }

    /// Encodes or passes through a stopped capture and writes the result into
    /// the output directory.
    pub fn finish(&mut self, mut capture: FinishedCapture) -> ExportOutcome {
        let Some(blob) = capture.blob.take() else {
            capture.transition(ExportState::Failed);
            let reason = capture
                .error
                .take()
                .unwrap_or_else(|| "recorder produced no data".to_string());
            tracing::error!("export failed: {reason}");
            return ExportOutcome::Failed { reason };
        };
        let request = capture.request.clone();

        if request.format.matches(capture.container) {
            let name = request.raw_name(capture.container);
            return match deliver_blob(&self.output_dir, &name, &blob) {
                Ok(path) => {
                    capture.transition(ExportState::Done);
                    self.progress.report(progress::DELIVERED);
                    tracing::info!(path = %path.display(), "raw capture delivered");
                    ExportOutcome::Success { path }
                }
                Err(err) => {
                    capture.transition(ExportState::Failed);
                    ExportOutcome::Failed {
                        reason: format!("write {name}: {err}"),
                    }
                }
            };
        }

        capture.transition(ExportState::Encoding);
        let encoded = self.transcoder.ensure_loaded().and_then(|()| {
            self.progress.report(progress::TRANSCODER_LOADED);
            let job = TranscodeJob {
                input_ext: capture.container.extension(),
                format: request.format,
                resolution: request.resolution,
                orientation: request.orientation,
                crf: request.crf,
                duration_s: capture.duration_s,
            };
            self.transcoder.transcode(&blob, &job, &self.progress)
        });

        let reason = match encoded {
            Ok(bytes) => {
                let name = request.encoded_name();
                match deliver_bytes(&self.output_dir, &name, &bytes) {
                    Ok(path) => {
                        capture.transition(ExportState::Done);
                        self.progress.report(progress::DELIVERED);
                        tracing::info!(path = %path.display(), "export delivered");
                        return ExportOutcome::Success { path };
                    }
                    Err(err) => format!("write {name}: {err}"),
                }
            }
            Err(err) => err.to_string(),
        };

        tracing::warn!("transcode unavailable, delivering raw capture: {reason}");
        capture.transition(ExportState::Fallback);
        let name = request.fallback_name(capture.container);
        match deliver_blob(&self.output_dir, &name, &blob) {
            Ok(path) => {
                capture.transition(ExportState::Done);
                self.progress.report(progress::DELIVERED);
                ExportOutcome::Fallback { path, reason }
            }
            Err(err) => {
                capture.transition(ExportState::Failed);
                ExportOutcome::Failed {
                    reason: format!("{reason}; fallback write {name}: {err}"),
                }
            }
        }
    }

    /// Runs a whole export: capture every frame the clock yields until the
    /// track ends or the bound is reached, then encode and deliver.
    pub fn export_capture(
        &mut self,
        compositor: &mut Compositor,
        signal: &mut dyn SignalSource,
        cfg: &VisualConfig,
        clock: &mut dyn FrameClock,
        request: ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let geometry = CaptureGeometry {
            width: compositor.surface().width(),
            height: compositor.surface().height(),
            fps: clock.fps(),
        };
        let mut session = match self.begin(signal, request, geometry)? {
            Ok(session) => session,
            Err(failed) => return Ok(failed),
        };

        while session.is_capturing() {
            let Some(tick) = clock.next_frame() else {
                break;
            };
            capture_frame(compositor, signal, cfg, &tick, &mut session);
        }
        signal.pause();
        Ok(self.finish(session.finalize()))
    }
}

/// Renders one frame into the session and stops it when the track has ended.
pub fn capture_frame(
    compositor: &mut Compositor,
    signal: &mut dyn SignalSource,
    cfg: &VisualConfig,
    tick: &FrameTick,
    session: &mut CaptureSession,
) {
    compositor.render(signal, cfg, tick);
    session.on_frame(compositor.surface());
    if signal.has_ended() {
        tracing::info!(frames = session.frames(), "track ended");
        session.request_stop();
    }
}

fn deliver_blob(dir: &Path, name: &str, blob: &CapturedBlob) -> io::Result<PathBuf> {
    deliver_with(dir, name, |f| blob.write_to(f))
}

fn deliver_bytes(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    deliver_with(dir, name, |f| f.write_all(bytes))
}

/// Writes through a temp file in `dir` and renames it to `name`.
fn deliver_with(
    dir: &Path,
    name: &str,
    write: impl FnOnce(&mut tempfile::NamedTempFile) -> io::Result<()>,
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new().prefix(".specterr").tempfile_in(dir)?;
    write(&mut tmp)?;
    tmp.flush()?;
    let path = dir.join(name);
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}
