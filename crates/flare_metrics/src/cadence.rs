//! Fixed-interval gate for low-frequency sampling

use std::time::Duration;

/// Fires at most once per `interval` of accumulated frame time.
///
/// Driven by frame deltas, not the wall clock.
pub struct Cadence {
    interval: Duration,
    accumulated: Duration,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: Duration::ZERO,
        }
    }

    /// Convenience for the common "N times per second" case.
    pub fn from_hz(hz: f32) -> Self {
        if hz <= 0.0 || !hz.is_finite() {
            return Self::new(Duration::ZERO);
        }
        // Rates too slow to represent never fire.
        Self::new(Duration::try_from_secs_f32(1.0 / hz).unwrap_or(Duration::MAX))
    }

    /// Advance by one frame. Returns true when a sample is due.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        self.accumulated = self.accumulated.saturating_add(dt);
        if self.accumulated < self.interval {
            return false;
        }
        // A long stall fires once, not once per missed interval.
        self.accumulated = if self.accumulated >= self.interval.saturating_mul(2) {
            Duration::ZERO
        } else {
            self.accumulated - self.interval
        };
        true
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_interval() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        let frame = Duration::from_millis(25);

        let fired: Vec<bool> = (0..8).map(|_| cadence.tick(frame)).collect();
        assert_eq!(
            fired,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_stall_fires_once() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        assert!(cadence.tick(Duration::from_secs(3)));
        assert!(!cadence.tick(Duration::from_millis(10)));
    }

    #[test]
    fn test_unrepresentable_rate_never_fires() {
        let mut cadence = Cadence::from_hz(1e-20);
        assert!(!cadence.tick(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_interval_always_fires() {
        let mut cadence = Cadence::from_hz(0.0);
        assert!(cadence.tick(Duration::ZERO));
        assert!(cadence.tick(Duration::from_millis(1)));
    }
}
