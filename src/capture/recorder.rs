use super::CaptureError;
use crate::capability::{CapabilityReport, Container, RecorderProfile};
use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempPath};

pub const CHUNK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
    /// Track muxed alongside the frames, when the profile records audio.
    pub audio: Option<PathBuf>,
    /// Hard cap passed to the encoder, in seconds.
    pub max_duration_s: f64,
    pub chunk_interval: Duration,
}

impl RecordSpec {
    pub fn frame_len(&self) -> usize {
        self.width * self.height * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Stopped,
}

/// What a recorder hands back on stop, before finalization.
#[derive(Debug)]
pub enum Recording {
    Chunks(Vec<Vec<u8>>),
    Spooled(TempPath),
}

impl Recording {
    /// Joins buffered chunks into one blob; spooled files pass through.
    pub fn into_blob(self) -> CapturedBlob {
        match self {
            Recording::Chunks(chunks) => CapturedBlob::Bytes(chunks.concat()),
            Recording::Spooled(path) => CapturedBlob::Spooled(path),
        }
    }
}

/// The finished capture. Spooled blobs delete their file on drop.
#[derive(Debug)]
pub enum CapturedBlob {
    Bytes(Vec<u8>),
    Spooled(TempPath),
}

impl CapturedBlob {
    pub fn len(&self) -> u64 {
        match self {
            CapturedBlob::Bytes(b) => b.len() as u64,
            CapturedBlob::Spooled(p) => std::fs::metadata(p).map(|m| m.len()).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to(&self, dst: &mut impl Write) -> io::Result<()> {
        match self {
            CapturedBlob::Bytes(b) => dst.write_all(b),
            CapturedBlob::Spooled(p) => {
                let mut f = File::open(p)?;
                io::copy(&mut f, dst).map(|_| ())
            }
        }
    }

    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        let mut f = File::create(path)?;
        self.write_to(&mut f)?;
        f.flush()
    }
}

/// A frame sink that produces one container per recording session.
pub trait Recorder: Send {
    fn start(&mut self, spec: &RecordSpec) -> Result<(), CaptureError>;

    fn push_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError>;

    /// Ends the recording. Acts only while recording; any later call returns
    /// `Ok(None)`.
    fn stop(&mut self) -> Result<Option<Recording>, CaptureError>;

    fn state(&self) -> RecorderState;
}

pub trait RecorderFactory: Send {
    fn profile(&self) -> RecorderProfile;

    fn create(&self) -> Box<dyn Recorder>;
}

pub struct FfmpegRecorderFactory {
    binary: String,
    profile: RecorderProfile,
}

impl FfmpegRecorderFactory {
    pub fn new(binary: impl Into<String>, profile: RecorderProfile) -> Self {
        Self {
            binary: binary.into(),
            profile,
        }
    }

    pub fn from_report(report: &CapabilityReport) -> Self {
        Self::new(report.binary.clone(), report.recorder.clone())
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn profile(&self) -> RecorderProfile {
        self.profile.clone()
    }

    fn create(&self) -> Box<dyn Recorder> {
        match self.profile.container {
            Container::Webm => Box::new(FfmpegRecorder::new(self.binary.clone(), self.profile.clone())),
            Container::Y4m => Box::new(Y4mRecorder::new()),
        }
    }
}

/// Pipes RGBA frames into an encoder process and gathers its WebM output in
/// chunks on a reader thread.
pub struct FfmpegRecorder {
    binary: String,
    profile: RecorderProfile,
    state: RecorderState,
    frame_len: usize,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<io::Result<()>>>,
    chunks_rx: Option<Receiver<Vec<u8>>>,
    chunks: Vec<Vec<u8>>,
    stderr_log: Option<File>,
}

impl FfmpegRecorder {
    pub fn new(binary: String, profile: RecorderProfile) -> Self {
        Self {
            binary,
            profile,
            state: RecorderState::Inactive,
            frame_len: 0,
            child: None,
            stdin: None,
            reader: None,
            chunks_rx: None,
            chunks: Vec::new(),
            stderr_log: None,
        }
    }

    fn command(&self, spec: &RecordSpec) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-hide_banner")
            .args(["-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-video_size")
            .arg(format!("{}x{}", spec.width, spec.height))
            .arg("-framerate")
            .arg(spec.fps.to_string())
            .args(["-i", "-"]);
        let audio = spec.audio.as_ref().filter(|_| self.profile.records_audio());
        if let Some(path) = audio {
            cmd.arg("-i").arg(path);
        }
        cmd.args(["-map", "0:v:0"]);
        if audio.is_some() {
            cmd.args(["-map", "1:a:0"]);
        }
        let video = self.profile.video_codec.as_deref().unwrap_or("libvpx");
        cmd.args(["-c:v", video])
            .args(["-deadline", "realtime", "-cpu-used", "8", "-b:v", "6M"])
            .args(["-pix_fmt", "yuv420p"]);
        if let (Some(codec), true) = (self.profile.audio_codec.as_deref(), audio.is_some()) {
            cmd.args(["-c:a", codec, "-b:a", "192k", "-shortest"]);
        }
        cmd.arg("-t")
            .arg(format!("{:.3}", spec.max_duration_s))
            .args(["-f", "webm", "pipe:1"]);
        cmd
    }

    fn drain_chunks(&mut self) {
        if let Some(rx) = &self.chunks_rx {
            self.chunks.extend(rx.try_iter().filter(|c| !c.is_empty()));
        }
    }

    fn stderr_text(&mut self) -> String {
        let Some(log) = self.stderr_log.as_mut() else {
            return String::new();
        };
        let mut text = String::new();
        if log.rewind().is_ok() {
            let _ = log.read_to_string(&mut text);
        }
        text.trim().to_string()
    }
}

impl Recorder for FfmpegRecorder {
    fn start(&mut self, spec: &RecordSpec) -> Result<(), CaptureError> {
        if self.state != RecorderState::Inactive {
            return Err(CaptureError::AlreadyStarted);
        }
        let log = tempfile::tempfile()?;
        let mut cmd = self.command(spec);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log.try_clone()?));
        let mut child = cmd.spawn().map_err(|source| CaptureError::Spawn {
            what: "recorder",
            source,
        })?;
        let stdin = child.stdin.take().ok_or(CaptureError::Pipe("recorder stdin"))?;
        let stdout = child.stdout.take().ok_or(CaptureError::Pipe("recorder stdout"))?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let interval = spec.chunk_interval;
        let reader = thread::spawn(move || collect_chunks(stdout, tx, interval));

        tracing::info!(
            mime = self.profile.mime(),
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            "recorder started"
        );
        self.frame_len = spec.frame_len();
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.reader = Some(reader);
        self.chunks_rx = Some(rx);
        self.stderr_log = Some(log);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn push_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError> {
        if self.state != RecorderState::Recording {
            return Err(CaptureError::NotRecording);
        }
        if rgba.len() != self.frame_len {
            return Err(CaptureError::FrameSize {
                expected: self.frame_len,
                got: rgba.len(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(CaptureError::Pipe("recorder stdin"))?;
        stdin.write_all(rgba)?;
        self.drain_chunks();
        Ok(())
    }

    fn stop(&mut self) -> Result<Option<Recording>, CaptureError> {
        if self.state != RecorderState::Recording {
            return Ok(None);
        }
        self.state = RecorderState::Stopped;
        drop(self.stdin.take());

        let status = match self.child.take() {
            Some(mut child) => Some(child.wait()?),
            None => None,
        };
        if let Some(reader) = self.reader.take() {
            match reader.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!("recorder output reader failed: {err}"),
                Err(_) => tracing::warn!("recorder output reader panicked"),
            }
        }
        self.drain_chunks();
        self.chunks_rx = None;

        if let Some(status) = status.filter(|s| !s.success()) {
            return Err(CaptureError::Encoder {
                status: status.to_string(),
                stderr: self.stderr_text(),
            });
        }
        tracing::info!(chunks = self.chunks.len(), "recorder stopped");
        Ok(Some(Recording::Chunks(std::mem::take(&mut self.chunks))))
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn collect_chunks(mut out: ChildStdout, tx: Sender<Vec<u8>>, interval: Duration) -> io::Result<()> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut pending = Vec::new();
    let mut last = Instant::now();
    loop {
        let n = out.read(&mut buf)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);
        if last.elapsed() >= interval {
            last = Instant::now();
            let _ = tx.send(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(pending);
    }
    Ok(())
}

/// Uncompressed 4:4:4 YUV4MPEG2 spool, used when no encoder is available.
/// Carries no audio.
pub struct Y4mRecorder {
    state: RecorderState,
    width: usize,
    height: usize,
    out: Option<BufWriter<NamedTempFile>>,
    planes: Vec<u8>,
}

impl Y4mRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Inactive,
            width: 0,
            height: 0,
            out: None,
            planes: Vec::new(),
        }
    }
}

impl Default for Y4mRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for Y4mRecorder {
    fn start(&mut self, spec: &RecordSpec) -> Result<(), CaptureError> {
        if self.state != RecorderState::Inactive {
            return Err(CaptureError::AlreadyStarted);
        }
        let file = tempfile::Builder::new()
            .prefix("specterr_capture")
            .suffix(".y4m")
            .tempfile()?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C444 XCOLORRANGE=FULL",
            spec.width, spec.height, spec.fps
        )?;
        if spec.audio.is_some() {
            tracing::warn!("uncompressed capture drops the audio track");
        }
        self.width = spec.width;
        self.height = spec.height;
        self.planes = vec![0; spec.width * spec.height * 3];
        self.out = Some(out);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn push_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError> {
        if self.state != RecorderState::Recording {
            return Err(CaptureError::NotRecording);
        }
        let n = self.width * self.height;
        if rgba.len() != n * 4 {
            return Err(CaptureError::FrameSize {
                expected: n * 4,
                got: rgba.len(),
            });
        }
        let (y, rest) = self.planes.split_at_mut(n);
        let (u, v) = rest.split_at_mut(n);
        for (i, px) in rgba.chunks_exact(4).enumerate() {
            let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
            y[i] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
            u[i] = (128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b).round().clamp(0.0, 255.0) as u8;
            v[i] = (128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b).round().clamp(0.0, 255.0) as u8;
        }
        let out = self.out.as_mut().ok_or(CaptureError::NotRecording)?;
        out.write_all(b"FRAME\n")?;
        out.write_all(&self.planes)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<Option<Recording>, CaptureError> {
        if self.state != RecorderState::Recording {
            return Ok(None);
        }
        self.state = RecorderState::Stopped;
        let Some(out) = self.out.take() else {
            return Ok(None);
        };
        let file = out.into_inner().map_err(|e| CaptureError::Io(e.into_error()))?;
        Ok(Some(Recording::Spooled(file.into_temp_path())))
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}
