//! Typed spawn requests and their device record
//!
//! Every request kind encodes into the same [`SpawnRecord`] shape; the spawn
//! kernel switches on `tag`. Validation happens here, before anything touches
//! the queue, so a rejected request leaves no trace.

use crate::error::Rejection;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use std::f32::consts::PI;

/// `SpawnRecord::tag` values, shared with `spawn.wgsl`.
pub mod tag {
    pub const DIRECTIONAL_BURST: u32 = 0;
    pub const SMOKE_PUFF: u32 = 1;
    pub const SHELL_LAUNCH: u32 = 2;
    pub const CONE_BURST: u32 = 3;
    pub const POP_FLASH: u32 = 4;
}

/// `SpawnRecord::flags` bits.
pub const FLAG_FINALE: u32 = 1;

/// Device-side spawn command. 112 bytes (7 x vec4).
///
/// Lane usage per tag:
/// - directional burst: `speed`, `crackle`, `dir_start..dir_start + dir_count`
/// - smoke puff: `vector` is drift velocity, `speed` is size growth per second
/// - shell launch: `vector` is launch velocity, `fuse`
/// - cone burst: `vector` is the unit axis, `cone_angle`, `speed`, `crackle`,
///   `sparkle`, `FLAG_FINALE`
/// - pop flash: none beyond the common lanes
///
/// `spread` is a positional jitter radius for every tag.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpawnRecord {
    pub tag: u32,
    pub particle_start: u32,
    pub count: u32,
    /// Exclusive prefix sum of `count` over earlier records in the batch.
    pub item_offset: u32,
    pub origin: [f32; 3],
    pub seed: u32,
    pub vector: [f32; 3],
    pub speed: f32,
    pub color: [f32; 4],
    pub lifetime: f32,
    pub drag: f32,
    pub size: f32,
    pub spread: f32,
    pub crackle: f32,
    pub sparkle: f32,
    pub fuse: f32,
    pub flags: u32,
    pub dir_start: u32,
    pub dir_count: u32,
    pub cone_angle: f32,
    pub _pad: u32,
}

/// One `Spark` per listed direction.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalBurst {
    pub particle_start: u32,
    pub origin: Vec3,
    /// Need not be normalized; zero-length entries are rejected.
    pub directions: Vec<Vec3>,
    pub speed: f32,
    pub color: Vec4,
    pub lifetime: f32,
    pub drag: f32,
    pub size: f32,
    /// Probability in [0, 1] that a spark ends in a crackle.
    pub crackle: f32,
    pub seed: u32,
}

impl Default for DirectionalBurst {
    fn default() -> Self {
        Self {
            particle_start: 0,
            origin: Vec3::ZERO,
            directions: Vec::new(),
            speed: 18.0,
            color: Vec4::new(1.0, 0.8, 0.4, 1.0),
            lifetime: 1.6,
            drag: 0.6,
            size: 0.12,
            crackle: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmokePuff {
    pub particle_start: u32,
    pub count: u32,
    pub origin: Vec3,
    pub radius: f32,
    pub drift: Vec3,
    /// Alpha channel is the starting opacity.
    pub color: Vec4,
    pub lifetime: f32,
    pub size: f32,
    pub growth: f32,
    pub drag: f32,
    pub seed: u32,
}

impl Default for SmokePuff {
    fn default() -> Self {
        Self {
            particle_start: 0,
            count: 32,
            origin: Vec3::ZERO,
            radius: 1.5,
            drift: Vec3::new(0.3, 0.4, 0.0),
            color: Vec4::new(0.35, 0.33, 0.32, 0.35),
            lifetime: 4.0,
            size: 0.8,
            growth: 0.6,
            drag: 0.8,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellLaunch {
    pub particle_start: u32,
    pub count: u32,
    pub origin: Vec3,
    pub velocity: Vec3,
    /// Seconds after launch the shell detonates, unless it reaches its apex first.
    pub fuse: f32,
    pub color: Vec4,
    pub lifetime: f32,
    pub drag: f32,
    pub size: f32,
    pub spread: f32,
    pub seed: u32,
}

impl Default for ShellLaunch {
    fn default() -> Self {
        Self {
            particle_start: 0,
            count: 1,
            origin: Vec3::ZERO,
            velocity: Vec3::new(0.0, 32.0, 0.0),
            fuse: 2.5,
            color: Vec4::new(1.0, 0.7, 0.3, 1.0),
            lifetime: 6.0,
            drag: 0.05,
            size: 0.2,
            spread: 0.0,
            seed: 0,
        }
    }
}

/// `Spark`s (or `FinaleSpark`s) fanned out inside a cone.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeBurst {
    pub particle_start: u32,
    pub count: u32,
    pub origin: Vec3,
    pub axis: Vec3,
    /// Radians, clamped to [0, PI].
    pub half_angle: f32,
    pub speed: f32,
    pub color: Vec4,
    pub lifetime: f32,
    pub drag: f32,
    pub size: f32,
    pub crackle: f32,
    /// Flicker frequency in Hz for finale sparks.
    pub sparkle: f32,
    pub finale: bool,
    pub seed: u32,
}

impl Default for ConeBurst {
    fn default() -> Self {
        Self {
            particle_start: 0,
            count: 256,
            origin: Vec3::ZERO,
            axis: Vec3::Y,
            half_angle: 30f32.to_radians(),
            speed: 20.0,
            color: Vec4::new(1.0, 0.9, 0.6, 1.0),
            lifetime: 1.8,
            drag: 0.5,
            size: 0.1,
            crackle: 0.0,
            sparkle: 0.0,
            finale: false,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopFlash {
    pub particle_start: u32,
    pub count: u32,
    pub origin: Vec3,
    pub spread: f32,
    pub color: Vec4,
    pub lifetime: f32,
    pub size: f32,
    pub seed: u32,
}

impl Default for PopFlash {
    fn default() -> Self {
        Self {
            particle_start: 0,
            count: 1,
            origin: Vec3::ZERO,
            spread: 0.0,
            color: Vec4::new(1.0, 1.0, 0.9, 1.0),
            lifetime: 0.15,
            size: 2.5,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpawnRequest {
    DirectionalBurst(DirectionalBurst),
    SmokePuff(SmokePuff),
    ShellLaunch(ShellLaunch),
    ConeBurst(ConeBurst),
    PopFlash(PopFlash),
}

macro_rules! impl_from_request {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for SpawnRequest {
                fn from(req: $variant) -> Self {
                    SpawnRequest::$variant(req)
                }
            }
        )*
    };
}

impl_from_request!(DirectionalBurst, SmokePuff, ShellLaunch, ConeBurst, PopFlash);

fn finite3(v: Vec3) -> bool {
    v.is_finite()
}

fn finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl SpawnRequest {
    pub fn tag(&self) -> u32 {
        match self {
            Self::DirectionalBurst(_) => tag::DIRECTIONAL_BURST,
            Self::SmokePuff(_) => tag::SMOKE_PUFF,
            Self::ShellLaunch(_) => tag::SHELL_LAUNCH,
            Self::ConeBurst(_) => tag::CONE_BURST,
            Self::PopFlash(_) => tag::POP_FLASH,
        }
    }

    pub fn particle_start(&self) -> u32 {
        match self {
            Self::DirectionalBurst(r) => r.particle_start,
            Self::SmokePuff(r) => r.particle_start,
            Self::ShellLaunch(r) => r.particle_start,
            Self::ConeBurst(r) => r.particle_start,
            Self::PopFlash(r) => r.particle_start,
        }
    }

    /// Number of slots the request writes.
    pub fn count(&self) -> u32 {
        match self {
            Self::DirectionalBurst(r) => u32::try_from(r.directions.len()).unwrap_or(u32::MAX),
            Self::SmokePuff(r) => r.count,
            Self::ShellLaunch(r) => r.count,
            Self::ConeBurst(r) => r.count,
            Self::PopFlash(r) => r.count,
        }
    }

    /// Directions the kernel reads through `dir_start..dir_start + dir_count`.
    pub fn directions(&self) -> &[Vec3] {
        match self {
            Self::DirectionalBurst(r) => &r.directions,
            _ => &[],
        }
    }

    /// Check the request against an arena of `capacity` slots.
    pub fn validate(&self, capacity: u32) -> Result<(), Rejection> {
        let count = self.count();
        if count == 0 {
            return Err(Rejection::Degenerate);
        }

        let (points, scalars): (Vec<Vec3>, Vec<f32>) = match self {
            Self::DirectionalBurst(r) => (
                vec![r.origin],
                vec![r.speed, r.lifetime, r.drag, r.size, r.crackle],
            ),
            Self::SmokePuff(r) => (
                vec![r.origin, r.drift],
                vec![r.radius, r.lifetime, r.size, r.growth, r.drag],
            ),
            Self::ShellLaunch(r) => (
                vec![r.origin, r.velocity],
                vec![r.fuse, r.lifetime, r.drag, r.size, r.spread],
            ),
            Self::ConeBurst(r) => (
                vec![r.origin, r.axis],
                vec![
                    r.half_angle,
                    r.speed,
                    r.lifetime,
                    r.drag,
                    r.size,
                    r.crackle,
                    r.sparkle,
                ],
            ),
            Self::PopFlash(r) => (vec![r.origin], vec![r.spread, r.lifetime, r.size]),
        };
        let color = self.color();
        if !points.iter().copied().all(finite3)
            || !finite(&scalars)
            || !color.is_finite()
            || !self.directions().iter().copied().all(finite3)
        {
            return Err(Rejection::NonFinite);
        }

        if self.lifetime() <= 0.0 {
            return Err(Rejection::Degenerate);
        }
        if self.directions().iter().any(|d| d.length_squared() < 1e-12) {
            return Err(Rejection::Degenerate);
        }
        if let Self::ConeBurst(r) = self {
            if r.axis.length_squared() < 1e-12 {
                return Err(Rejection::Degenerate);
            }
        }

        let start = u64::from(self.particle_start());
        let end = start + u64::from(count);
        if end > u64::from(capacity) {
            return Err(Rejection::NoRoom {
                start,
                end,
                capacity,
            });
        }
        Ok(())
    }

    fn color(&self) -> Vec4 {
        match self {
            Self::DirectionalBurst(r) => r.color,
            Self::SmokePuff(r) => r.color,
            Self::ShellLaunch(r) => r.color,
            Self::ConeBurst(r) => r.color,
            Self::PopFlash(r) => r.color,
        }
    }

    fn lifetime(&self) -> f32 {
        match self {
            Self::DirectionalBurst(r) => r.lifetime,
            Self::SmokePuff(r) => r.lifetime,
            Self::ShellLaunch(r) => r.lifetime,
            Self::ConeBurst(r) => r.lifetime,
            Self::PopFlash(r) => r.lifetime,
        }
    }

    /// Encode into the device record with parameters clamped to their legal
    /// ranges. `item_offset` and `dir_start` are filled in by the queue.
    pub fn encode(&self) -> SpawnRecord {
        let mut rec = SpawnRecord {
            tag: self.tag(),
            particle_start: self.particle_start(),
            count: self.count(),
            color: self.color().to_array(),
            lifetime: self.lifetime(),
            ..SpawnRecord::default()
        };

        match self {
            Self::DirectionalBurst(r) => {
                rec.origin = r.origin.to_array();
                rec.seed = r.seed;
                rec.speed = r.speed;
                rec.drag = r.drag.max(0.0);
                rec.size = r.size.max(0.0);
                rec.crackle = r.crackle.clamp(0.0, 1.0);
                rec.dir_count = rec.count;
            }
            Self::SmokePuff(r) => {
                rec.origin = r.origin.to_array();
                rec.seed = r.seed;
                rec.vector = r.drift.to_array();
                rec.speed = r.growth.max(0.0);
                rec.drag = r.drag.max(0.0);
                rec.size = r.size.max(0.0);
                rec.spread = r.radius.max(0.0);
            }
            Self::ShellLaunch(r) => {
                rec.origin = r.origin.to_array();
                rec.seed = r.seed;
                rec.vector = r.velocity.to_array();
                rec.fuse = r.fuse.max(0.0);
                rec.drag = r.drag.max(0.0);
                rec.size = r.size.max(0.0);
                rec.spread = r.spread.max(0.0);
            }
            Self::ConeBurst(r) => {
                rec.origin = r.origin.to_array();
                rec.seed = r.seed;
                rec.vector = r.axis.normalize().to_array();
                rec.cone_angle = r.half_angle.clamp(0.0, PI);
                rec.speed = r.speed;
                rec.drag = r.drag.max(0.0);
                rec.size = r.size.max(0.0);
                rec.crackle = r.crackle.clamp(0.0, 1.0);
                rec.sparkle = r.sparkle.max(0.0);
                if r.finale {
                    rec.flags |= FLAG_FINALE;
                }
            }
            Self::PopFlash(r) => {
                rec.origin = r.origin.to_array();
                rec.seed = r.seed;
                rec.size = r.size.max(0.0);
                rec.spread = r.spread.max(0.0);
            }
        }
        rec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<SpawnRecord>(), 112);
    }

    #[test]
    fn test_zero_count_is_degenerate() {
        let req: SpawnRequest = ConeBurst {
            count: 0,
            ..Default::default()
        }
        .into();
        assert_eq!(req.validate(100), Err(Rejection::Degenerate));

        let req: SpawnRequest = DirectionalBurst::default().into();
        assert_eq!(req.validate(100), Err(Rejection::Degenerate));
    }

    #[test]
    fn test_range_must_fit_capacity() {
        let req: SpawnRequest = SmokePuff {
            particle_start: 90,
            count: 11,
            ..Default::default()
        }
        .into();
        assert!(matches!(req.validate(100), Err(Rejection::NoRoom { end: 101, .. })));
        assert_eq!(req.validate(101), Ok(()));

        let req: SpawnRequest = PopFlash {
            particle_start: u32::MAX,
            count: 2,
            ..Default::default()
        }
        .into();
        assert!(matches!(req.validate(u32::MAX), Err(Rejection::NoRoom { .. })));
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let req: SpawnRequest = ShellLaunch {
            velocity: Vec3::new(0.0, f32::NAN, 0.0),
            ..Default::default()
        }
        .into();
        assert_eq!(req.validate(10), Err(Rejection::NonFinite));

        let req: SpawnRequest = DirectionalBurst {
            directions: vec![Vec3::X, Vec3::new(f32::INFINITY, 0.0, 0.0)],
            ..Default::default()
        }
        .into();
        assert_eq!(req.validate(10), Err(Rejection::NonFinite));
    }

    #[test]
    fn test_zero_axis_and_direction_rejected() {
        let req: SpawnRequest = ConeBurst {
            axis: Vec3::ZERO,
            ..Default::default()
        }
        .into();
        assert_eq!(req.validate(1000), Err(Rejection::Degenerate));

        let req: SpawnRequest = DirectionalBurst {
            directions: vec![Vec3::Y, Vec3::ZERO],
            ..Default::default()
        }
        .into();
        assert_eq!(req.validate(10), Err(Rejection::Degenerate));
    }

    #[test]
    fn test_encode_clamps_rates() {
        let rec = SpawnRequest::from(ConeBurst {
            axis: Vec3::new(0.0, 2.0, 0.0),
            half_angle: 10.0,
            crackle: 3.0,
            sparkle: -4.0,
            finale: true,
            ..Default::default()
        })
        .encode();
        assert_eq!(rec.tag, tag::CONE_BURST);
        assert_eq!(rec.crackle, 1.0);
        assert_eq!(rec.sparkle, 0.0);
        assert_eq!(rec.cone_angle, PI);
        assert_eq!(rec.vector, [0.0, 1.0, 0.0]);
        assert_eq!(rec.flags & FLAG_FINALE, FLAG_FINALE);
    }
}
