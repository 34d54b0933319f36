use std::io;
use std::process::{Command, Stdio};

/// Container the recorder writes before any transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Webm,
    Y4m,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Y4m => "y4m",
        }
    }
}

/// Negotiated recorder configuration, best first:
/// `video/webm;codecs=vp8,opus`, then plain `video/webm`, then uncompressed y4m.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderProfile {
    pub container: Container,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl RecorderProfile {
    pub fn vp8_opus() -> Self {
        Self {
            container: Container::Webm,
            video_codec: Some("libvpx".to_string()),
            audio_codec: Some("libopus".to_string()),
        }
    }

    pub fn y4m() -> Self {
        Self {
            container: Container::Y4m,
            video_codec: None,
            audio_codec: None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self.container {
            Container::Y4m => "video/x-yuv4mpeg",
            Container::Webm
                if self.video_codec.as_deref() == Some("libvpx")
                    && self.audio_codec.as_deref() == Some("libopus") =>
            {
                "video/webm;codecs=vp8,opus"
            }
            Container::Webm => "video/webm",
        }
    }

    pub fn records_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

pub fn choose_recorder_profile(ffmpeg_found: bool, encoders: &[String]) -> RecorderProfile {
    let has = |name: &str| encoders.iter().any(|e| e == name);
    if !ffmpeg_found {
        return RecorderProfile::y4m();
    }
    if has("libvpx") && has("libopus") {
        return RecorderProfile::vp8_opus();
    }
    let video = ["libvpx", "libvpx-vp9"].into_iter().find(|e| has(e));
    let audio = ["libopus", "libvorbis"].into_iter().find(|e| has(e));
    match video {
        Some(v) => RecorderProfile {
            container: Container::Webm,
            video_codec: Some(v.to_string()),
            audio_codec: audio.map(str::to_string),
        },
        None => RecorderProfile::y4m(),
    }
}

/// Encoder names from `ffmpeg -encoders` output. Only rows after the
/// `------` separator with a six-character flag column are considered.
pub fn parse_encoder_list(text: &str) -> Vec<String> {
    let mut in_table = false;
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("------") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(flags), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        let valid_flags = flags.len() == 6
            && flags.starts_with(['V', 'A', 'S'])
            && flags[1..].chars().all(|c| matches!(c, 'F' | 'S' | 'X' | 'B' | 'D' | '.'));
        if valid_flags {
            out.push(name.to_string());
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub binary: String,
    pub version: Option<String>,
    pub encoders: Vec<String>,
    pub recorder: RecorderProfile,
    notes: Vec<String>,
}

impl CapabilityReport {
    pub fn ffmpeg_found(&self) -> bool {
        self.version.is_some()
    }

    pub fn can_transcode(&self) -> bool {
        self.ffmpeg_found() && self.has_encoder("libx264")
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.iter().any(|e| e == name)
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn status_label(&self) -> String {
        match &self.version {
            Some(v) => format!("{} ({}), recorder {}", self.binary, v, self.recorder.mime()),
            None => format!("{} missing, recorder {}", self.binary, self.recorder.mime()),
        }
    }
}

/// Runs `ffmpeg -version` and `ffmpeg -encoders` and picks the best recorder.
pub fn detect_ffmpeg(binary: &str) -> CapabilityReport {
    let mut notes = Vec::new();
    let version = match run_capture(binary, &["-hide_banner", "-version"]) {
        Ok(text) => text.lines().next().map(|l| l.trim().to_string()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            notes.push(format!("{binary} not found in PATH; exports fall back to uncompressed y4m"));
            None
        }
        Err(err) => {
            notes.push(format!("failed to run {binary}: {err}"));
            None
        }
    };
    let encoders = if version.is_some() {
        match run_capture(binary, &["-hide_banner", "-encoders"]) {
            Ok(text) => parse_encoder_list(&text),
            Err(err) => {
                notes.push(format!("could not list encoders: {err}"));
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let recorder = choose_recorder_profile(version.is_some(), &encoders);
    let mut report = CapabilityReport {
        binary: binary.to_string(),
        version,
        encoders,
        recorder,
        notes,
    };
    if report.ffmpeg_found() && report.recorder.container == Container::Y4m {
        report.push_note("no webm encoder available; recording uncompressed y4m without audio");
    } else if report.ffmpeg_found() && !report.recorder.records_audio() {
        report.push_note("no webm audio encoder available; recording video only");
    }
    if report.ffmpeg_found() && !report.can_transcode() {
        report.push_note("libx264 unavailable; mp4 exports will fall back to the raw capture");
    }
    for note in report.notes() {
        tracing::info!("{note}");
    }
    report
}

fn run_capture(binary: &str, args: &[&str]) -> io::Result<String> {
    let out = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}
