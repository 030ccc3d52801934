//! Engine configuration
//!
//! Loaded from JSON; every field has a default so a partial file (or none at
//! all) is valid. The `FLARE_DEVICE_SPAWN` environment variable overrides
//! `device_spawn` and is read once, when the configuration is loaded.

use crate::draw_args::ArenaLayout;
use crate::error::{ConfigError, EngineError};
use crate::kind::KindBudgets;
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::time::DEFAULT_MAX_FRAME_DT;
use std::time::Duration;

pub const DEVICE_SPAWN_ENV: &str = "FLARE_DEVICE_SPAWN";

/// Longest accepted `max_frame_dt`, in seconds.
pub const MAX_FRAME_DT_LIMIT: f32 = 1.0;
/// Slowest non-zero diagnostics rate.
pub const MIN_DIAGNOSTICS_HZ: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Arena slots.
    pub capacity: u32,
    /// Per-kind compacted list budgets. Clamped to `capacity`.
    pub budgets: KindBudgets,
    /// When false every spawn request is rejected; uploads still work.
    pub device_spawn: bool,
    pub gravity: [f32; 3],
    pub ground_y: f32,
    /// Particles per upload region.
    pub upload_chunk: u32,
    pub upload_ring_depth: usize,
    /// Counter readback rate; zero disables it.
    pub diagnostics_hz: f32,
    /// Longest step handed to the kernels, in seconds.
    pub max_frame_dt: f32,
    /// Shell detonations reported per frame; zero disables the channel.
    pub detonation_capacity: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 65_536,
            budgets: KindBudgets::default(),
            device_spawn: true,
            gravity: [0.0, -9.81, 0.0],
            ground_y: 0.0,
            upload_chunk: 4096,
            upload_ring_depth: 3,
            diagnostics_hz: 1.0,
            max_frame_dt: 0.05,
            detonation_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Parse, validate and apply the environment override.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate()?;
        config.apply_env();
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Defaults plus the environment override.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be non-zero".into()));
        }
        if self.upload_ring_depth < 2 {
            return Err(ConfigError::Invalid(format!(
                "upload_ring_depth must be at least 2, got {}",
                self.upload_ring_depth
            )));
        }
        if self.upload_chunk == 0 {
            return Err(ConfigError::Invalid("upload_chunk must be non-zero".into()));
        }
        if !(self.max_frame_dt > 0.0 && self.max_frame_dt <= MAX_FRAME_DT_LIMIT) {
            return Err(ConfigError::Invalid(format!(
                "max_frame_dt must be in (0, {}], got {}",
                MAX_FRAME_DT_LIMIT, self.max_frame_dt
            )));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) || !self.ground_y.is_finite() {
            return Err(ConfigError::Invalid("gravity and ground_y must be finite".into()));
        }
        let hz = self.diagnostics_hz;
        if !hz.is_finite() || (hz > 0.0 && hz < MIN_DIAGNOSTICS_HZ) {
            return Err(ConfigError::Invalid(format!(
                "diagnostics_hz must be 0 or at least {}, got {}",
                MIN_DIAGNOSTICS_HZ, hz
            )));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(DEVICE_SPAWN_ENV) {
            match parse_switch(&value) {
                Some(enabled) => self.device_spawn = enabled,
                None => tracing::warn!("ignoring {}={:?}: not a boolean", DEVICE_SPAWN_ENV, value),
            }
        }
    }

    /// Falls back to the default clamp when `max_frame_dt` is unrepresentable.
    pub fn max_frame_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.max_frame_dt)
            .ok()
            .filter(|dt| !dt.is_zero())
            .unwrap_or(DEFAULT_MAX_FRAME_DT)
    }

    pub fn layout(&self) -> Result<ArenaLayout, EngineError> {
        self.layout_with_capacity(self.capacity)
    }

    pub fn layout_with_capacity(&self, capacity: u32) -> Result<ArenaLayout, EngineError> {
        ArenaLayout::new(
            capacity,
            &self.budgets,
            self.detonation_capacity,
            self.upload_chunk,
            self.upload_ring_depth,
        )
    }
}

/// `1/true/on/yes` and `0/false/off/no`, case-insensitive.
pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
