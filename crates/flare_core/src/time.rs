//! Frame timing
//!
//! Kernels integrate with the frame's dt directly, so a hitch has to be
//! clamped before it reaches them or fast sparks tunnel through the ground.

use std::time::Duration;

/// Default upper bound on one simulation step (20 Hz).
pub const DEFAULT_MAX_FRAME_DT: Duration = Duration::from_millis(50);

/// Engine time tracker
pub struct FrameClock {
    max_dt: Duration,
    frame: u64,
    elapsed: Duration,
}

impl FrameClock {
    pub fn new(max_dt: Duration) -> Self {
        Self {
            max_dt,
            frame: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Start a new frame from a wall-clock delta; returns the clamped step.
    pub fn advance(&mut self, wall_dt: Duration) -> Duration {
        let dt = wall_dt.min(self.max_dt);
        self.frame += 1;
        self.elapsed += dt;
        dt
    }

    /// Frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated time, the sum of clamped steps.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DT)
    }
}
