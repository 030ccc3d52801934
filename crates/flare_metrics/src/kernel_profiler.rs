//! Host-side timing of named dispatch stages

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct StageTiming {
    pub last: Duration,
    pub total: Duration,
    pub calls: u64,
}

impl StageTiming {
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

pub struct KernelProfiler {
    timings: HashMap<&'static str, StageTiming>,
}

impl KernelProfiler {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn time_stage<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        let entry = self.timings.entry(name).or_default();
        entry.last = elapsed;
        entry.total += elapsed;
        entry.calls += 1;
        result
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &StageTiming)> {
        self.timings.iter().map(|(name, timing)| (*name, timing))
    }
}

impl Default for KernelProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_calls_per_stage() {
        let mut profiler = KernelProfiler::new();
        let value = profiler.time_stage("spawn", || 7);
        profiler.time_stage("spawn", || ());
        profiler.time_stage("update", || ());

        assert_eq!(value, 7);
        let calls = |name: &str| {
            profiler
                .iter()
                .find(|(stage, _)| *stage == name)
                .map_or(0, |(_, timing)| timing.calls)
        };
        assert_eq!(calls("spawn"), 2);
        assert_eq!(calls("update"), 1);
        assert_eq!(calls("missing"), 0);

        profiler.reset();
        assert_eq!(profiler.iter().count(), 0);
    }
}
