use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

pub const FFT_SIZE: usize = 2048;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const SMOOTHING: f32 = 0.85;
const MIN_DB: f32 = -90.0;
const MAX_DB: f32 = -10.0;

/// One frame of byte magnitudes, lowest bin first. The length is fixed for the
/// lifetime of the source that fills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySample {
    bins: Vec<u8>,
}

impl FrequencySample {
    pub fn new(len: usize) -> Self {
        Self { bins: vec![0; len] }
    }

    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [u8] {
        &mut self.bins
    }

    /// Bin value, or 0 when the index is out of range.
    pub fn get(&self, i: usize) -> u8 {
        self.bins.get(i).copied().unwrap_or(0)
    }

    /// Bin value normalised to 0..1.
    pub fn level(&self, i: usize) -> f32 {
        self.get(i) as f32 / 255.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    /// Seconds; may be 0 or NaN when the container does not report it.
    pub duration_s: f64,
}

/// Anything that can hand the compositor one magnitude frame per tick.
pub trait SignalSource {
    fn sample_rate(&self) -> u32;

    fn bin_count(&self) -> usize {
        BIN_COUNT
    }

    /// Overwrites `out` with the current magnitudes. Never blocks.
    fn refresh(&mut self, out: &mut FrequencySample);

    /// Moves the playback cursor for clock-driven sources.
    fn advance(&mut self, _dt: f32) {}

    /// Starts or resumes playback; returns once audio is flowing.
    fn resume(&mut self) -> anyhow::Result<()>;

    fn pause(&mut self);

    fn rewind(&mut self);

    fn is_playing(&self) -> bool;

    fn has_ended(&self) -> bool;

    /// The loaded track, if any. Live inputs and silence have none.
    fn media(&self) -> Option<MediaInfo>;
}

/// Blackman-windowed FFT with exponential smoothing and a fixed dB range.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let n = fft_size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let window = (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();
        Self {
            fft,
            window,
            buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; n / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyzes the most recent `fft_size` samples of `frame` (zero padded at the
    /// front when shorter) into `out`.
    pub fn analyze(&mut self, frame: &[f32], out: &mut [u8]) {
        let n = self.window.len();
        let take = frame.len().min(n);
        let pad = n - take;
        let tail = &frame[frame.len() - take..];
        for (i, c) in self.buf.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            let s = if s.is_finite() { s } else { 0.0 };
            *c = Complex {
                re: s * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.buf);

        let scale = 255.0 / (MAX_DB - MIN_DB);
        for (k, slot) in self.smoothed.iter_mut().enumerate() {
            let mag = self.buf[k].norm() / n as f32;
            *slot = SMOOTHING * *slot + (1.0 - SMOOTHING) * mag;
            if let Some(o) = out.get_mut(k) {
                let db = 20.0 * slot.log10();
                *o = if db.is_finite() {
                    (scale * (db - MIN_DB)).floor().clamp(0.0, 255.0) as u8
                } else {
                    0
                };
            }
        }
    }
}

/// Produces zeros forever. Used when no track is loaded.
pub struct SilentSignal {
    sample_rate: u32,
}

impl SilentSignal {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl SignalSource for SilentSignal {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn refresh(&mut self, out: &mut FrequencySample) {
        out.bins_mut().iter_mut().for_each(|b| *b = 0);
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn rewind(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    fn has_ended(&self) -> bool {
        false
    }

    fn media(&self) -> Option<MediaInfo> {
        None
    }
}

/// Decoded mono PCM plus its origin.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub mono: Vec<f32>,
}

impl DecodedTrack {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut reader =
            hound::WavReader::open(path).with_context(|| format!("open WAV {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("read float samples")?,
            hound::SampleFormat::Int => {
                let full = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full))
                    .collect::<Result<_, _>>()
                    .context("read integer samples")?
            }
        };
        let mono = interleaved
            .chunks(channels)
            .map(|f| f.iter().sum::<f32>() / channels as f32)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            mono,
        })
    }

    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.mono.len() as f64 / self.sample_rate as f64
    }
}

/// Position shared between the render thread and the playback callback, in
/// source frames scaled by 2^16.
struct PlayHead {
    pos: AtomicU64,
    playing: AtomicBool,
}

const HEAD_ONE: f64 = 65536.0;

impl PlayHead {
    fn frame(&self) -> usize {
        (self.pos.load(Ordering::Relaxed) as f64 / HEAD_ONE) as usize
    }
}

/// A loaded track. Clocked by `advance` unless attached to an output device,
/// in which case the device callback moves the cursor.
pub struct TrackSignal {
    track: Arc<DecodedTrack>,
    analyzer: SpectrumAnalyzer,
    head: Arc<PlayHead>,
    stream: Option<cpal::Stream>,
    window: Vec<f32>,
}

impl TrackSignal {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_track(DecodedTrack::open(path)?))
    }

    pub fn from_track(track: DecodedTrack) -> Self {
        tracing::info!(
            path = %track.path.display(),
            sample_rate = track.sample_rate,
            duration_s = track.duration_s(),
            "track loaded"
        );
        Self {
            track: Arc::new(track),
            analyzer: SpectrumAnalyzer::new(FFT_SIZE),
            head: Arc::new(PlayHead {
                pos: AtomicU64::new(0),
                playing: AtomicBool::new(false),
            }),
            stream: None,
            window: vec![0.0; FFT_SIZE],
        }
    }

    /// Routes playback through the default output device.
    pub fn with_output_device(mut self) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device found"))?;
        let supported = device
            .default_output_config()
            .context("get default output config")?;
        let config: cpal::StreamConfig = supported.clone().into();
        let step = self.track.sample_rate as f64 / config.sample_rate.0.max(1) as f64;
        let channels = config.channels.max(1) as usize;

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_output::<f32>(&device, &config, channels, step, &self.track, &self.head)?,
            SampleFormat::I16 => build_output::<i16>(&device, &config, channels, step, &self.track, &self.head)?,
            SampleFormat::U16 => build_output::<u16>(&device, &config, channels, step, &self.track, &self.head)?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };
        stream.play().context("start output stream")?;
        self.stream = Some(stream);
        Ok(self)
    }

    pub fn position_s(&self) -> f64 {
        self.head.frame() as f64 / self.track.sample_rate.max(1) as f64
    }

    fn ended_at(&self, frame: usize) -> bool {
        frame >= self.track.mono.len()
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    step: f64,
    track: &Arc<DecodedTrack>,
    head: &Arc<PlayHead>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let track = Arc::clone(track);
    let head = Arc::clone(head);
    let inc = (step * HEAD_ONE) as u64;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let mut v = 0.0f32;
                if head.playing.load(Ordering::Relaxed) {
                    let raw = head.pos.load(Ordering::Relaxed);
                    let idx = (raw as f64 / HEAD_ONE) as usize;
                    match track.mono.get(idx) {
                        Some(s) => {
                            v = *s;
                            head.pos.store(raw + inc, Ordering::Relaxed);
                        }
                        None => head.playing.store(false, Ordering::Relaxed),
                    }
                }
                for out in frame.iter_mut() {
                    *out = T::from_sample(v);
                }
            }
        },
        |err| tracing::warn!("audio output stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

impl SignalSource for TrackSignal {
    fn sample_rate(&self) -> u32 {
        self.track.sample_rate
    }

    fn refresh(&mut self, out: &mut FrequencySample) {
        let end = self.head.frame().min(self.track.mono.len());
        let start = end.saturating_sub(FFT_SIZE);
        let src = &self.track.mono[start..end];
        let pad = FFT_SIZE - src.len();
        self.window[..pad].iter_mut().for_each(|v| *v = 0.0);
        self.window[pad..].copy_from_slice(src);
        self.analyzer.analyze(&self.window, out.bins_mut());
    }

    fn advance(&mut self, dt: f32) {
        if self.stream.is_some() || !self.head.playing.load(Ordering::Relaxed) {
            return;
        }
        let frames = (dt.max(0.0) as f64 * self.track.sample_rate as f64 * HEAD_ONE) as u64;
        let pos = self.head.pos.load(Ordering::Relaxed).saturating_add(frames);
        self.head.pos.store(pos, Ordering::Relaxed);
        if self.ended_at(self.head.frame()) {
            self.head.playing.store(false, Ordering::Relaxed);
        }
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        if self.ended_at(self.head.frame()) {
            self.rewind();
        }
        self.head.playing.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.play().context("resume output stream")?;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.head.playing.store(false, Ordering::Relaxed);
    }

    fn rewind(&mut self) {
        self.head.pos.store(0, Ordering::Relaxed);
        self.analyzer.reset();
    }

    fn is_playing(&self) -> bool {
        self.head.playing.load(Ordering::Relaxed)
    }

    fn has_ended(&self) -> bool {
        self.ended_at(self.head.frame())
    }

    fn media(&self) -> Option<MediaInfo> {
        Some(MediaInfo {
            path: self.track.path.clone(),
            duration_s: self.track.duration_s(),
        })
    }
}

/// Latest byte spectrum, published by the analyzer thread under a sequence lock.
struct SharedSpectrum {
    seq: AtomicU64,
    bins: Box<[AtomicU8]>,
}

impl SharedSpectrum {
    fn new(len: usize) -> Self {
        Self {
            seq: AtomicU64::new(0),
            bins: (0..len).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    fn store(&self, src: &[u8]) {
        self.seq.fetch_add(1, Ordering::Release);
        for (dst, v) in self.bins.iter().zip(src) {
            dst.store(*v, Ordering::Relaxed);
        }
        self.seq.fetch_add(1, Ordering::Release);
    }

    /// Copies a consistent snapshot; keeps `out` untouched if a writer is mid-update.
    fn load_into(&self, out: &mut [u8]) -> bool {
        let v1 = self.seq.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return false;
        }
        let mut tmp = [0u8; BIN_COUNT];
        for (dst, src) in tmp.iter_mut().zip(self.bins.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
        if self.seq.load(Ordering::Acquire) != v1 {
            return false;
        }
        let n = out.len().min(tmp.len());
        out[..n].copy_from_slice(&tmp[..n]);
        true
    }
}

pub fn list_input_devices() -> anyhow::Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "<unknown>".to_string()))
        .collect())
}

/// Microphone or line input analysed on a helper thread.
pub struct LiveSignal {
    stream: cpal::Stream,
    stop: Arc<AtomicBool>,
    analyzer_handle: Option<thread::JoinHandle<()>>,
    spectrum: Arc<SharedSpectrum>,
    playing: bool,
    sample_rate: u32,
}

impl LiveSignal {
    pub fn open(device_query: Option<&str>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels().max(1) as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let rb = HeapRb::<f32>::new((sample_rate as usize).saturating_mul(2).max(FFT_SIZE));
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let spectrum = Arc::new(SharedSpectrum::new(BIN_COUNT));
        let stop_for_thread = Arc::clone(&stop);
        let spectrum_for_thread = Arc::clone(&spectrum);

        let err_fn = |err| tracing::warn!("audio input stream error: {err}");
        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };
        stream.play().context("start input stream")?;
        tracing::info!(sample_rate, channels, "live input started");

        let analyzer_handle =
            thread::spawn(move || analyze_loop(&mut cons, &stop_for_thread, &spectrum_for_thread));

        Ok(Self {
            stream,
            stop,
            analyzer_handle: Some(analyzer_handle),
            spectrum,
            playing: true,
            sample_rate,
        })
    }
}

impl Drop for LiveSignal {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.analyzer_handle.take() {
            let _ = h.join();
        }
    }
}

impl SignalSource for LiveSignal {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn refresh(&mut self, out: &mut FrequencySample) {
        self.spectrum.load_into(out.bins_mut());
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        self.stream.play().context("resume input stream")?;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::warn!("pause input stream: {err}");
        }
        self.playing = false;
    }

    fn rewind(&mut self) {}

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn has_ended(&self) -> bool {
        false
    }

    fn media(&self) -> Option<MediaInfo> {
        None
    }
}

fn select_input_device(host: &cpal::Host, device_query: Option<&str>) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    if let Some(want) = device_query.map(|s| s.to_lowercase()) {
        return devices
            .into_iter()
            .find(|d| d.name().map(|n| n.to_lowercase().contains(&want)).unwrap_or(false))
            .ok_or_else(|| anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    for frame in data.chunks(channels) {
        let acc: f32 = frame.iter().map(|s| s.to_float_sample()).sum();
        let _ = prod.try_push(acc / channels as f32);
    }
}

fn analyze_loop(cons: &mut ringbuf::HeapCons<f32>, stop: &AtomicBool, spectrum: &SharedSpectrum) {
    let hop = 512usize;
    let mut scratch = vec![0.0f32; FFT_SIZE];
    let mut ordered = vec![0.0f32; FFT_SIZE];
    let mut write_pos = 0usize;
    let mut since_last = 0usize;
    let mut analyzer = SpectrumAnalyzer::new(FFT_SIZE);
    let mut bytes = vec![0u8; BIN_COUNT];

    while !stop.load(Ordering::Relaxed) {
        let mut got_any = false;
        while let Some(s) = cons.try_pop() {
            got_any = true;
            scratch[write_pos] = s;
            write_pos = (write_pos + 1) % FFT_SIZE;
            since_last += 1;
            if since_last >= hop {
                since_last = 0;
                let (older, newer) = scratch.split_at(write_pos);
                ordered[..newer.len()].copy_from_slice(newer);
                ordered[newer.len()..].copy_from_slice(older);
                analyzer.analyze(&ordered, &mut bytes);
                spectrum.store(&bytes);
            }
        }
        if !got_any {
            thread::sleep(Duration::from_millis(2));
        }
    }
}
