//! Flare Metrics - Low-frequency instrumentation for the particle engine
//!
//! Provides zero-cost abstractions for diagnostics sampling that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use flare_metrics::{Cadence, FrameTimer};
//!
//! let mut cadence = Cadence::from_hz(1.0);
//! let mut timer = FrameTimer::new(60); // Track last 60 frames
//! timer.record(dt);
//! if cadence.tick(dt) {
//!     tracing::info!("FPS: {:.1}", timer.fps());
//! }
//! ```
//!
//! In production builds (without `metrics` feature), all instrumentation
//! is compiled out to zero overhead.

#[cfg(feature = "metrics")]
mod cadence;
#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod kernel_profiler;
#[cfg(feature = "metrics")]
mod ring_buffer;

#[cfg(feature = "metrics")]
pub use cadence::Cadence;
#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use kernel_profiler::{KernelProfiler, StageTiming};
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct Cadence;

#[cfg(not(feature = "metrics"))]
impl Cadence {
    pub fn new(_interval: std::time::Duration) -> Self { Self }
    pub fn from_hz(_hz: f32) -> Self { Self }
    pub fn tick(&mut self, _dt: std::time::Duration) -> bool { false }
    pub fn reset(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
pub struct FrameTimer;

#[cfg(not(feature = "metrics"))]
impl FrameTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn record(&mut self, _dt: std::time::Duration) {}
    pub fn frames(&self) -> u64 { 0 }
    pub fn fps(&self) -> f64 { 0.0 }
    pub fn frame_time_ms(&self) -> f64 { 0.0 }
    pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn clear(&mut self) {}
    pub fn latest(&self) -> Option<T> { None }
}

#[cfg(not(feature = "metrics"))]
pub struct KernelProfiler;

#[cfg(not(feature = "metrics"))]
impl KernelProfiler {
    pub fn new() -> Self { Self }
    pub fn time_stage<F, R>(&mut self, _name: &'static str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn reset(&mut self) {}
}
