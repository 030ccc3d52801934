// error.rs - Error types for the particle engine

use thiserror::Error;

/// Why an enqueue or upload was refused. Refusal never mutates engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("device spawning is disabled")]
    Disabled,

    #[error("device resources are not ready")]
    NotReady,

    #[error("request produces no particles")]
    Degenerate,

    #[error("request contains a non-finite parameter")]
    NonFinite,

    #[error("slot range {start}..{end} exceeds arena capacity {capacity}")]
    NoRoom { start: u64, end: u64, capacity: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,

    #[error("upload ring needs at least 2 regions, got {0}")]
    RingTooShallow(usize),

    #[error("index lists for a {0}-slot arena do not fit a 32-bit index buffer")]
    ListsTooLarge(u32),

    #[error("device error: {0}")]
    Device(String),
}
