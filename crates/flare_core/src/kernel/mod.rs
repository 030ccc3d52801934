//! Pure per-task kernel bodies
//!
//! These functions are what one device invocation computes. The CPU device
//! runs them directly under rayon; `spawn.wgsl` and `update.wgsl` implement
//! the same formulas on the GPU. Keeping them free of shared state is what
//! makes spawn output deterministic and testable without a device.

mod spawn;
mod update;

pub use spawn::derive_particle;
pub use update::{gravity_scale, step_particle, StepOutcome};

/// Lifetime jitter applied to sparks, smoke and finale sparks.
pub const LIFETIME_JITTER: (f32, f32) = (0.8, 1.2);
/// Speed jitter applied to burst sparks.
pub const SPEED_JITTER: (f32, f32) = (0.9, 1.1);
/// Size jitter applied to smoke.
pub const SIZE_JITTER: (f32, f32) = (0.8, 1.2);
/// Fraction of a crackling spark's lifetime spent before it crackles.
pub const CRACKLE_DELAY: (f32, f32) = (0.4, 0.8);
/// Duration of the flash a crackling spark turns into.
pub const CRACKLE_FLASH: f32 = 0.12;
/// How long the smoke left by a detonated shell lingers, at most.
pub const SHELL_SMOKE_LIFETIME: f32 = 2.5;
