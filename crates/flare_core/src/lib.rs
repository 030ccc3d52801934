//! Flare Core
//!
//! Particle arena and lifecycle engine:
//! - Particle records, kinds and per-kind budgets
//! - Spawn requests, batching and the pure kernel derivations
//! - Bounded append lists and indirect draw arguments
//! - Upload ring and low-frequency diagnostics
//! - The `ParticleDevice` seam, the engine front end and a rayon CPU device

pub mod compact;
pub mod config;
pub mod cpu;
pub mod device;
pub mod diagnostics;
pub mod draw_args;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod kind;
pub mod particle;
pub mod queue;
pub mod request;
pub mod rng;
pub mod time;
pub mod upload;

pub use glam;

pub use config::EngineConfig;
pub use cpu::CpuDevice;
pub use device::ParticleDevice;
pub use diagnostics::{DropTotals, KindCounters, KindStats};
pub use draw_args::{ArenaLayout, DrawIndirectArgs};
pub use engine::{FrameStatus, ParticleEngine};
pub use error::{ConfigError, EngineError, Rejection};
pub use kind::{BlendPass, KindBudgets, ParticleKind, PerKind, LIVE_KIND_COUNT};
pub use particle::{DetonationEvent, Particle, SimParams};
pub use queue::{SpawnBatch, SpawnQueue};
pub use request::{
    ConeBurst, DirectionalBurst, PopFlash, ShellLaunch, SmokePuff, SpawnRecord, SpawnRequest,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
