use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

/// Percentages at the stage boundaries of an export.
pub const CAPTURE_END: u8 = 8;
pub const TRANSCODER_LOADED: u8 = 10;
pub const INPUT_WRITTEN: u8 = 20;
pub const TRANSCODE_START: u8 = 30;
pub const TRANSCODE_END: u8 = 90;
pub const DELIVERED: u8 = 100;

/// Shares export progress with whoever holds the receiving end. Reported
/// values never decrease; repeated or lower values are swallowed. The
/// high-water mark is only raised while holding its lock, and the send happens
/// under the same lock, so the channel sees a strictly increasing sequence
/// even when clones report from several threads.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Option<Sender<u8>>,
    last: Arc<Mutex<u8>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, Receiver<u8>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                tx: Some(tx),
                last: Arc::new(Mutex::new(0)),
            },
            rx,
        )
    }

    pub fn silent() -> Self {
        Self {
            tx: None,
            last: Arc::new(Mutex::new(0)),
        }
    }

    pub fn current(&self) -> u8 {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value now in effect.
    pub fn report(&self, pct: u8) -> u8 {
        let pct = pct.min(DELIVERED);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if pct <= *last {
            return *last;
        }
        *last = pct;
        if let Some(tx) = &self.tx {
            let _ = tx.send(pct);
        }
        pct
    }

    /// Maps a 0..1 fraction of the capture onto `0..CAPTURE_END`.
    pub fn report_capture(&self, fraction: f64) -> u8 {
        self.report(scale(0, CAPTURE_END, fraction))
    }

    /// Maps a 0..1 fraction of the transcode onto `TRANSCODE_START..TRANSCODE_END`.
    pub fn report_transcode(&self, fraction: f64) -> u8 {
        self.report(scale(TRANSCODE_START, TRANSCODE_END, fraction))
    }
}

fn scale(lo: u8, hi: u8, fraction: f64) -> u8 {
    let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    lo + ((hi - lo) as f64 * f).floor() as u8
}
