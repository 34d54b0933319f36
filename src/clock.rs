use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub index: u64,
    /// Seconds since the clock started.
    pub t: f32,
    /// Seconds since the previous tick.
    pub dt: f32,
}

/// Source of frame ticks for the render loop. The loop ends when `next_frame`
/// returns `None`.
pub trait FrameClock {
    fn next_frame(&mut self) -> Option<FrameTick>;
    fn fps(&self) -> u32;
}

/// Wall-clock ticks paced to a target rate; sleeps off the remainder of each
/// frame.
pub struct RealtimeClock {
    fps: u32,
    start: Instant,
    last: Option<Instant>,
    index: u64,
}

impl RealtimeClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            start: Instant::now(),
            last: None,
            index: 0,
        }
    }

    fn target(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps as f32)
    }
}

impl FrameClock for RealtimeClock {
    fn next_frame(&mut self) -> Option<FrameTick> {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            let target = self.target();
            if elapsed < target {
                std::thread::sleep(target - elapsed);
            }
        }
        let now = Instant::now();
        let dt = match self.last {
            Some(last) => now.duration_since(last).as_secs_f32().max(1e-6),
            None => 1.0 / self.fps as f32,
        };
        self.last = Some(now);
        let tick = FrameTick {
            index: self.index,
            t: now.duration_since(self.start).as_secs_f32(),
            dt,
        };
        self.index += 1;
        Some(tick)
    }

    fn fps(&self) -> u32 {
        self.fps
    }
}

/// Fixed-step ticks with no waiting, for rendering faster than real time.
pub struct OfflineClock {
    fps: u32,
    index: u64,
    limit: Option<u64>,
}

impl OfflineClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            index: 0,
            limit: None,
        }
    }

    /// Stops after `frames` ticks.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }
}

impl FrameClock for OfflineClock {
    fn next_frame(&mut self) -> Option<FrameTick> {
        if self.limit.is_some_and(|l| self.index >= l) {
            return None;
        }
        let dt = 1.0 / self.fps as f32;
        let tick = FrameTick {
            index: self.index,
            t: self.index as f32 * dt,
            dt,
        };
        self.index += 1;
        Some(tick)
    }

    fn fps(&self) -> u32 {
        self.fps
    }
}
