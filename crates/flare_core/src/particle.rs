//! Arena record layouts shared between host and device
//!
//! Every struct here is `#[repr(C)]` + `Pod` and mirrors a WGSL struct of the
//! same name in `flare_render`'s shaders. Field order is load-bearing.

use crate::kind::ParticleKind;
use bytemuck::{Pod, Zeroable};

/// One arena slot. 80 bytes, 16-byte aligned rows (5 x vec4).
///
/// An all-zero record is a `Dead` slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 3],
    /// `ParticleKind` discriminant; authoritative for liveness.
    pub kind: u32,
    pub velocity: [f32; 3],
    /// Seconds since spawn.
    pub age: f32,
    pub color: [f32; 4],
    /// Declared maximum lifetime. Kind transitions may shorten it, never extend it.
    pub lifetime: f32,
    pub drag: f32,
    pub size: f32,
    pub seed: u32,
    /// Kind-specific state, see [`aux`].
    pub aux: [f32; 4],
}

/// Meaning of `Particle::aux` lanes per kind.
pub mod aux {
    /// Shell: age at which the shell detonates.
    pub const SHELL_FUSE: usize = 0;

    /// Spark / FinaleSpark: age at which the spark turns into a crackle (0 = never).
    pub const SPARK_CRACKLE_AT: usize = 0;
    /// Spark / FinaleSpark: duration of the crackle flash.
    pub const SPARK_FLASH: usize = 1;
    /// FinaleSpark: flicker frequency in Hz.
    pub const SPARK_SPARKLE: usize = 2;
    /// FinaleSpark: flicker phase in radians.
    pub const SPARK_PHASE: usize = 3;

    /// Smoke: size growth per second.
    pub const SMOKE_GROWTH: usize = 0;
    /// Smoke: opacity at age zero.
    pub const SMOKE_ALPHA: usize = 1;

    /// Crackle: age at which the flash started.
    pub const CRACKLE_START: usize = 0;
    /// Crackle: flash duration.
    pub const CRACKLE_FLASH: usize = 1;

    /// PopFlash: size at age zero.
    pub const POP_SIZE: usize = 0;
}

impl Particle {
    pub const DEAD: Particle = Particle {
        position: [0.0; 3],
        kind: 0,
        velocity: [0.0; 3],
        age: 0.0,
        color: [0.0; 4],
        lifetime: 0.0,
        drag: 0.0,
        size: 0.0,
        seed: 0,
        aux: [0.0; 4],
    };

    /// Decoded kind; unknown tags read as `Dead`.
    #[inline]
    pub fn kind(&self) -> ParticleKind {
        ParticleKind::from_u32(self.kind).unwrap_or(ParticleKind::Dead)
    }

    #[inline]
    pub fn set_kind(&mut self, kind: ParticleKind) {
        self.kind = kind.as_u32();
    }

    /// True when every float lane that feeds integration is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.age.is_finite()
            && self.lifetime.is_finite()
    }
}

/// Emitted by the update kernel when a shell detonates.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DetonationEvent {
    pub position: [f32; 3],
    /// Arena slot of the shell that detonated.
    pub slot: u32,
    pub color: [f32; 4],
}

/// Per-frame simulation constants bound to the update kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub gravity: [f32; 3],
    pub dt: f32,
    pub ground_y: f32,
    /// Seconds since the engine started; drives flicker.
    pub time: f32,
    pub detonation_capacity: u32,
    pub _pad: u32,
}
