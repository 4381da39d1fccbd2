use std::time::{Duration, Instant};

use crate::config::MIN_FPS;

/// Throttles a display-refresh driven loop down to a target frame rate.
///
/// Pacing only guarantees that frames are never drawn earlier than one
/// interval after the previous one.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    last_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(target_fps: f64) -> Self {
        Self {
            interval: interval_for(target_fps),
            last_frame: None,
        }
    }

    pub fn set_target_fps(&mut self, target_fps: f64) {
        self.interval = interval_for(target_fps);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
    }

    /// Whether one interval has elapsed at `now` since the last recorded
    /// frame. Always true before the first frame.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_frame {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Marks `now` as the time the last frame was drawn.
    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }
}

fn interval_for(target_fps: f64) -> Duration {
    let fps = if target_fps.is_finite() && target_fps > 0.0 {
        target_fps
    } else {
        MIN_FPS
    };
    Duration::from_secs_f64(1.0 / fps)
}

/// Counts drawn frames and asks for a surface clear every `threshold` draws.
#[derive(Debug, Default, Clone)]
pub struct ClearSchedule {
    threshold: u32,
    since_clear: u32,
}

impl ClearSchedule {
    /// A threshold of zero never clears.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            since_clear: 0,
        }
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }

    pub fn since_clear(&self) -> u32 {
        self.since_clear
    }

    /// Called before each draw. Returns `true` and resets the counter when
    /// the surface should be cleared first.
    pub fn take_clear(&mut self) -> bool {
        // `>=` so that lowering the threshold mid-playback still clears.
        if self.threshold > 0 && self.since_clear >= self.threshold {
            self.since_clear = 0;
            true
        } else {
            false
        }
    }

    pub fn record_draw(&mut self) {
        self.since_clear = self.since_clear.saturating_add(1);
    }
}

/// Monotonic frame counter; the displayed frame wraps around the sequence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    position: u64,
}

impl FrameCursor {
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn display_frame(&self, frame_count: usize) -> usize {
        if frame_count == 0 {
            return 0;
        }
        (self.position % frame_count as u64) as usize
    }

    pub fn advance(&mut self) {
        self.position = self.position.wrapping_add(1);
    }
}
