use super::progress::{self, ProgressReporter};
use super::recorder::CapturedBlob;
use super::{CaptureError, ExportFormat, Orientation, Resolution};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    /// Extension of the captured container.
    pub input_ext: &'static str,
    pub format: ExportFormat,
    pub resolution: Resolution,
    pub orientation: Orientation,
    pub crf: u8,
    /// Expected media length, used to turn encoder timestamps into progress.
    pub duration_s: Option<f64>,
}

impl TranscodeJob {
    pub fn video_filter(&self) -> String {
        let mut vf = format!(
            "scale={}:{}:flags=lanczos",
            self.resolution.width, self.resolution.height
        );
        if self.orientation == Orientation::Vertical {
            vf.push_str(",transpose=1");
        }
        vf
    }

    /// Encoder arguments between the input and the output path.
    pub fn codec_args(&self) -> Vec<String> {
        let crf = self.crf.to_string();
        let mut args: Vec<String> = match self.format {
            ExportFormat::Mp4 => vec!["-c:v", "libx264", "-preset", "fast", "-crf", crf.as_str()],
            ExportFormat::Webm => vec!["-c:v", "libvpx-vp9", "-crf", crf.as_str(), "-b:v", "0"],
        }
        .into_iter()
        .map(String::from)
        .collect();
        args.push("-vf".to_string());
        args.push(self.video_filter());
        let tail: &[&str] = match self.format {
            ExportFormat::Mp4 => &["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"],
            ExportFormat::Webm => &["-c:a", "libopus", "-b:a", "192k"],
        };
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }
}

/// Converts a captured container into the requested delivery format.
pub trait Transcoder: Send {
    /// Prepares the engine. Succeeds immediately once loaded; a failure is not
    /// remembered, so the next call tries again.
    fn ensure_loaded(&mut self) -> Result<(), CaptureError>;

    fn is_loaded(&self) -> bool;

    /// Returns the encoded output. Temporary files are removed whatever the result.
    fn transcode(
        &mut self,
        blob: &CapturedBlob,
        job: &TranscodeJob,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    OutTime(Duration),
    End,
}

/// Parses one `key=value` line of `ffmpeg -progress` output.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value
            .trim()
            .parse::<u64>()
            .ok()
            .map(|us| ProgressEvent::OutTime(Duration::from_micros(us))),
        "progress" if value.trim() == "end" => Some(ProgressEvent::End),
        _ => None,
    }
}

/// Runs an `ffmpeg` binary inside a private scratch directory.
pub struct FfmpegTranscoder {
    binary: String,
    workdir: Option<TempDir>,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            workdir: None,
        }
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(|d| d.path())
    }
}

/// Deletes the listed files when dropped.
struct Scratch(Vec<PathBuf>);

impl Drop for Scratch {
    fn drop(&mut self) {
        for p in &self.0 {
            if let Err(err) = std::fs::remove_file(p) {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("could not remove {}: {err}", p.display());
                }
            }
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn ensure_loaded(&mut self) -> Result<(), CaptureError> {
        if self.workdir.is_some() {
            return Ok(());
        }
        let status = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => {}
            Ok(s) => return Err(CaptureError::Unavailable(format!("{} -version exited with {s}", self.binary))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CaptureError::Unavailable(format!("{} not found in PATH", self.binary)));
            }
            Err(source) => {
                return Err(CaptureError::Spawn {
                    what: "transcoder",
                    source,
                });
            }
        }
        let dir = tempfile::Builder::new().prefix("specterr_transcode").tempdir()?;
        tracing::info!(workdir = %dir.path().display(), "transcoder loaded");
        self.workdir = Some(dir);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.workdir.is_some()
    }

    fn transcode(
        &mut self,
        blob: &CapturedBlob,
        job: &TranscodeJob,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, CaptureError> {
        let dir = self.workdir.as_ref().ok_or(CaptureError::NotLoaded)?.path();
        let input = dir.join(format!("capture.{}", job.input_ext));
        let output = dir.join(format!("output.{}", job.format.extension()));
        let _scratch = Scratch(vec![input.clone(), output.clone()]);

        blob.write_file(&input)?;
        progress.report(progress::INPUT_WRITTEN);

        let log = tempfile::tempfile()?;
        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-nostats"])
            .arg("-i")
            .arg(&input)
            .args(job.codec_args())
            .args(["-progress", "pipe:1"])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log.try_clone()?))
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                what: "transcoder",
                source,
            })?;
        progress.report(progress::TRANSCODE_START);

        let stdout = child.stdout.take().ok_or(CaptureError::Pipe("transcoder stdout"))?;
        let reporter = progress.clone();
        let duration = job.duration_s.filter(|d| d.is_finite() && *d > 0.0);
        let watcher = thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                match parse_progress_line(&line) {
                    Some(ProgressEvent::OutTime(t)) => {
                        if let Some(total) = duration {
                            reporter.report_transcode(t.as_secs_f64() / total);
                        }
                    }
                    Some(ProgressEvent::End) => {
                        reporter.report_transcode(1.0);
                    }
                    None => {}
                }
            }
        });

        let status = child.wait()?;
        let _ = watcher.join();
        if !status.success() {
            return Err(CaptureError::Encoder {
                status: status.to_string(),
                stderr: read_log(log),
            });
        }
        progress.report(progress::TRANSCODE_END);

        let bytes = std::fs::read(&output)?;
        if bytes.is_empty() {
            return Err(CaptureError::EmptyOutput);
        }
        tracing::info!(bytes = bytes.len(), format = job.format.extension(), "transcode finished");
        Ok(bytes)
    }
}

fn read_log(mut log: File) -> String {
    let mut text = String::new();
    if log.rewind().is_ok() {
        let _ = log.read_to_string(&mut text);
    }
    text.trim().to_string()
}
