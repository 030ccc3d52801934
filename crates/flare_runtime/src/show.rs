//! Scripted demo show
//!
//! Launches shells on a timer and ignites a burst wherever a shell reports
//! a detonation. A finale of flickering cones closes the show.

use crate::slots::SlotAllocator;
use flare_core::glam::{Vec3, Vec4};
use flare_core::rng::ItemRng;
use flare_core::{
    ConeBurst, DetonationEvent, DirectionalBurst, ParticleDevice, ParticleEngine, PopFlash,
    ShellLaunch, SmokePuff, SpawnRequest,
};
use std::f32::consts::{PI, TAU};
use tracing::debug;

const SPARKS_PER_BURST: u32 = 600;
const RING_DIRECTIONS: u32 = 96;
const FINALE_CONES: u32 = 5;
const FINALE_SPARKS: u32 = 1500;

#[derive(Debug, Clone)]
pub struct ShowConfig {
    pub seed: u32,
    /// Seconds between shell launches.
    pub launch_interval: f32,
    /// Show time at which the finale fires.
    pub finale_at: f32,
    /// Half-width of the launch line along x.
    pub field_width: f32,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            launch_interval: 0.6,
            finale_at: 20.0,
            field_width: 30.0,
        }
    }
}

/// What one tick asked the engine for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowTick {
    pub launched: u32,
    pub bursts: u32,
    pub rejected: u32,
}

pub struct Show {
    config: ShowConfig,
    slots: SlotAllocator,
    rng: ItemRng,
    clock: f32,
    next_launch: f32,
    finale_fired: bool,
    bursts: u32,
}

impl Show {
    pub fn new(config: ShowConfig, capacity: u32) -> Self {
        Self {
            rng: ItemRng::new(config.seed, 0),
            slots: SlotAllocator::new(capacity),
            clock: 0.0,
            next_launch: 0.0,
            finale_fired: false,
            bursts: 0,
            config,
        }
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn finale_fired(&self) -> bool {
        self.finale_fired
    }

    /// Queue this frame's requests. Call before `run_frame`.
    pub fn tick<D: ParticleDevice>(&mut self, engine: &mut ParticleEngine<D>, dt: f32) -> ShowTick {
        self.clock += dt;
        let mut tick = ShowTick::default();

        for event in engine.drain_detonations() {
            for request in self.burst(&event) {
                self.submit(engine, request, &mut tick);
            }
            tick.bursts += 1;
        }

        if !self.finale_fired {
            while self.clock >= self.next_launch {
                self.next_launch += self.config.launch_interval;
                if let Some(request) = self.shell() {
                    self.submit(engine, request, &mut tick);
                    tick.launched += 1;
                }
            }
        }

        if !self.finale_fired && self.clock >= self.config.finale_at {
            self.finale_fired = true;
            for request in self.finale() {
                self.submit(engine, request, &mut tick);
            }
        }
        tick
    }

    fn submit<D: ParticleDevice>(
        &mut self,
        engine: &mut ParticleEngine<D>,
        request: SpawnRequest,
        tick: &mut ShowTick,
    ) {
        if let Err(reason) = engine.enqueue(request) {
            debug!("show request rejected: {}", reason);
            tick.rejected += 1;
        }
    }

    fn next_seed(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn palette(&mut self) -> Vec4 {
        const COLORS: [[f32; 3]; 6] = [
            [1.0, 0.35, 0.2],
            [1.0, 0.8, 0.3],
            [0.4, 0.7, 1.0],
            [0.6, 1.0, 0.5],
            [1.0, 0.45, 0.9],
            [1.0, 1.0, 1.0],
        ];
        let [r, g, b] = COLORS[(self.rng.next_u32() % COLORS.len() as u32) as usize];
        Vec4::new(r, g, b, 1.0)
    }

    fn shell(&mut self) -> Option<SpawnRequest> {
        let x = self.rng.range(-self.config.field_width, self.config.field_width);
        let velocity = Vec3::new(
            self.rng.range(-2.0, 2.0),
            self.rng.range(28.0, 36.0),
            self.rng.range(-2.0, 2.0),
        );
        let fuse = self.rng.range(2.0, 2.8);
        let color = self.palette();
        let seed = self.next_seed();
        Some(
            ShellLaunch {
                particle_start: self.slots.alloc(1)?,
                origin: Vec3::new(x, 0.5, 0.0),
                velocity,
                fuse,
                color,
                seed,
                ..Default::default()
            }
            .into(),
        )
    }

    /// Sparks, a flash and a smoke puff at a detonation.
    fn burst(&mut self, event: &DetonationEvent) -> Vec<SpawnRequest> {
        let origin = Vec3::from(event.position);
        let color = Vec4::from(event.color);
        let mut requests = Vec::with_capacity(3);

        self.bursts = self.bursts.wrapping_add(1);
        // Every fourth burst is a flat ring, the rest are full spheres.
        if self.bursts % 4 == 0 {
            let tilt = self.rng.range(-0.4, 0.4);
            let directions: Vec<Vec3> = (0..RING_DIRECTIONS)
                .map(|i| {
                    let a = TAU * i as f32 / RING_DIRECTIONS as f32;
                    Vec3::new(a.cos(), tilt * a.sin(), a.sin()).normalize()
                })
                .collect();
            let seed = self.next_seed();
            if let Some(start) = self.slots.alloc(RING_DIRECTIONS) {
                requests.push(
                    DirectionalBurst {
                        particle_start: start,
                        origin,
                        directions,
                        speed: 16.0,
                        color,
                        crackle: 0.3,
                        seed,
                        ..Default::default()
                    }
                    .into(),
                );
            }
        } else {
            let seed = self.next_seed();
            let crackle = self.rng.range(0.0, 0.5);
            if let Some(start) = self.slots.alloc(SPARKS_PER_BURST) {
                requests.push(
                    ConeBurst {
                        particle_start: start,
                        count: SPARKS_PER_BURST,
                        origin,
                        half_angle: PI,
                        speed: 14.0,
                        color,
                        crackle,
                        seed,
                        ..Default::default()
                    }
                    .into(),
                );
            }
        }

        let seed = self.next_seed();
        if let Some(start) = self.slots.alloc(1) {
            requests.push(
                PopFlash {
                    particle_start: start,
                    origin,
                    seed,
                    ..Default::default()
                }
                .into(),
            );
        }

        let seed = self.next_seed();
        if let Some(start) = self.slots.alloc(24) {
            requests.push(
                SmokePuff {
                    particle_start: start,
                    count: 24,
                    origin,
                    radius: 2.0,
                    seed,
                    ..Default::default()
                }
                .into(),
            );
        }
        requests
    }

    /// Flickering cones fanned across the launch line.
    fn finale(&mut self) -> Vec<SpawnRequest> {
        (0..FINALE_CONES)
            .filter_map(|i| {
                let t = i as f32 / (FINALE_CONES - 1) as f32;
                let x = (t * 2.0 - 1.0) * self.config.field_width;
                let axis = Vec3::new(-x * 0.01, 1.0, 0.0).normalize();
                let color = self.palette();
                let seed = self.next_seed();
                let start = self.slots.alloc(FINALE_SPARKS)?;
                Some(
                    ConeBurst {
                        particle_start: start,
                        count: FINALE_SPARKS,
                        origin: Vec3::new(x, 0.5, 0.0),
                        axis,
                        half_angle: 12f32.to_radians(),
                        speed: 30.0,
                        color,
                        lifetime: 2.5,
                        sparkle: 9.0,
                        finale: true,
                        seed,
                        ..Default::default()
                    }
                    .into(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flare_core::{CpuDevice, EngineConfig, ParticleKind};
    use std::time::Duration;

    fn engine(capacity: u32) -> ParticleEngine<CpuDevice> {
        let config = EngineConfig {
            capacity,
            device_spawn: true,
            ..Default::default()
        };
        ParticleEngine::with_arena(config, CpuDevice::new()).unwrap()
    }

    #[test]
    fn test_shells_launch_on_schedule() {
        let mut engine = engine(16_384);
        let mut show = Show::new(ShowConfig::default(), engine.capacity());
        let dt = 1.0 / 60.0;
        let mut launched = 0;
        for _ in 0..60 {
            launched += show.tick(&mut engine, dt).launched;
            engine.run_frame(Duration::from_secs_f32(dt));
        }
        // One second at 0.6 s intervals: launches at 0.0 and 0.6.
        assert_eq!(launched, 2);
        assert!(engine.device().count_kind(ParticleKind::Shell) >= 1);
    }

    #[test]
    fn test_detonations_ignite_bursts() {
        let mut engine = engine(32_768);
        let mut show = Show::new(ShowConfig::default(), engine.capacity());
        let dt = 1.0 / 60.0;
        let mut bursts = 0;
        for _ in 0..(60 * 5) {
            bursts += show.tick(&mut engine, dt).bursts;
            engine.run_frame(Duration::from_secs_f32(dt));
        }
        assert!(bursts > 0);
        let sparks = engine.device().count_kind(ParticleKind::Spark)
            + engine.device().count_kind(ParticleKind::Crackle);
        assert!(sparks > 0);
    }

    #[test]
    fn test_finale_fires_once() {
        let mut engine = engine(16_384);
        let config = ShowConfig {
            finale_at: 0.5,
            ..Default::default()
        };
        let mut show = Show::new(config, engine.capacity());
        for _ in 0..60 {
            show.tick(&mut engine, 1.0 / 60.0);
            engine.run_frame(Duration::from_secs_f32(1.0 / 60.0));
        }
        assert!(show.finale_fired());
        assert!(engine.device().count_kind(ParticleKind::FinaleSpark) > 0);
    }
}
