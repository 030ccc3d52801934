//! Per-kind alive and drop counters
//!
//! Counters are produced by the device every frame but only read back on a
//! low cadence. The device keeps a wrapping `u32` running total of drops per
//! kind; [`DropTotals`] widens it to `u64` on the host.

use crate::kind::PerKind;
use flare_metrics::{Cadence, RingBuffer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounters {
    /// Survivors of the last update, whether or not they fit the list.
    pub alive: u32,
    /// Survivors the last update could not append.
    pub dropped: u32,
    /// Drops since the arena was allocated.
    pub dropped_total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Engine frame the counters belong to.
    pub frame: u64,
    pub kinds: PerKind<KindCounters>,
}

impl KindStats {
    pub fn total_alive(&self) -> u64 {
        self.kinds.iter().map(|(_, c)| u64::from(c.alive)).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.kinds.iter().map(|(_, c)| c.dropped_total).sum()
    }

    /// `"shell 12:0 spark 2000:1000 ..."`, alive and dropped per kind.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KindStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, c)) in self.kinds.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{} {}:{}", kind, c.alive, c.dropped)?;
        }
        Ok(())
    }
}

/// Widens the device's wrapping 32-bit drop totals.
#[derive(Debug, Clone, Default)]
pub struct DropTotals {
    last_raw: PerKind<u32>,
    total: PerKind<u64>,
}

impl DropTotals {
    pub fn observe(&mut self, raw: PerKind<u32>) -> PerKind<u64> {
        for (kind, total) in self.total.iter_mut() {
            *total += u64::from(raw[kind].wrapping_sub(self.last_raw[kind]));
        }
        self.last_raw = raw;
        self.total
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Decides when to read counters back and remembers what came back.
pub struct DiagnosticsSampler {
    enabled: bool,
    cadence: Cadence,
    history: RingBuffer<KindStats>,
}

impl DiagnosticsSampler {
    /// `hz <= 0` disables sampling.
    pub fn new(hz: f32) -> Self {
        Self {
            enabled: hz > 0.0 && hz.is_finite(),
            cadence: Cadence::from_hz(hz),
            history: RingBuffer::new(16),
        }
    }

    /// Advance by one frame. True when a readback should be requested now.
    pub fn should_request(&mut self, dt: Duration) -> bool {
        self.enabled && self.cadence.tick(dt)
    }

    pub fn record(&mut self, stats: KindStats) {
        self.history.push(stats);
    }

    pub fn latest(&self) -> Option<KindStats> {
        self.history.latest()
    }

    pub fn reset(&mut self) {
        self.cadence.reset();
        self.history.clear();
    }
}
