//! Reference device on the CPU
//!
//! Runs the same per-slot kernel bodies as the GPU under rayon. Stages are
//! separated by rayon's implicit join, which plays the role of the barrier
//! between compute passes.

use crate::compact::AppendList;
use crate::device::ParticleDevice;
use crate::diagnostics::{KindCounters, KindStats};
use crate::draw_args::{ArenaLayout, DrawIndirectArgs};
use crate::error::EngineError;
use crate::kernel::{derive_particle, step_particle, StepOutcome};
use crate::kind::{ParticleKind, PerKind};
use crate::particle::{DetonationEvent, Particle, SimParams};
use crate::queue::SpawnBatch;
use crate::upload::UploadRing;
use rayon::prelude::*;
use tracing::{debug, info};

struct CpuArena {
    layout: ArenaLayout,
    particles: Vec<Particle>,
    lists: PerKind<AppendList>,
    args: PerKind<DrawIndirectArgs>,
    counters: PerKind<KindCounters>,
    detonations: Vec<DetonationEvent>,
    staging: UploadRing<Vec<Particle>>,
}

#[derive(Default)]
pub struct CpuDevice {
    arena: Option<CpuArena>,
    readback: Option<KindStats>,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena contents; empty before allocation.
    pub fn particles(&self) -> &[Particle] {
        self.arena
            .as_ref()
            .map(|a| a.particles.as_slice())
            .unwrap_or(&[])
    }

    /// Compacted slot indices of `kind`, in append order.
    pub fn list(&self, kind: ParticleKind) -> Vec<u32> {
        self.arena
            .as_ref()
            .map_or_else(Vec::new, |a| a.lists[kind].to_vec())
    }

    pub fn draw_args(&self, kind: ParticleKind) -> DrawIndirectArgs {
        self.arena
            .as_ref()
            .map_or_else(DrawIndirectArgs::default, |a| a.args[kind])
    }

    /// Counters as of the last `build_draw_args`, without waiting for the
    /// diagnostics cadence.
    pub fn counters(&self, kind: ParticleKind) -> KindCounters {
        self.arena
            .as_ref()
            .map_or_else(KindCounters::default, |a| a.counters[kind])
    }

    pub fn count_kind(&self, kind: ParticleKind) -> usize {
        self.particles().iter().filter(|p| p.kind() == kind).count()
    }
}

impl ParticleDevice for CpuDevice {
    fn is_ready(&self) -> bool {
        self.arena.is_some()
    }

    fn allocate(&mut self, layout: &ArenaLayout) -> Result<(), EngineError> {
        let chunk = layout.upload_chunk as usize;
        let staging = UploadRing::from_fn(layout.upload_ring_depth, |_| Vec::with_capacity(chunk))?;
        self.arena = Some(CpuArena {
            layout: layout.clone(),
            particles: vec![Particle::DEAD; layout.capacity as usize],
            lists: PerKind::from_fn(|kind| AppendList::with_budget(layout.budget(kind))),
            args: PerKind::from_fn(|_| DrawIndirectArgs::quads(0)),
            counters: PerKind::default(),
            detonations: Vec::new(),
            staging,
        });
        self.readback = None;
        info!("cpu arena: {} slots", layout.capacity);
        Ok(())
    }

    fn layout(&self) -> Option<&ArenaLayout> {
        self.arena.as_ref().map(|a| &a.layout)
    }

    fn dispatch_spawn(&mut self, batch: &SpawnBatch<'_>) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        // Requests run in batch order; within one, items run in parallel.
        for rec in batch.records {
            let start = rec.particle_start as usize;
            let slots = &mut arena.particles[start..start + rec.count as usize];
            slots.par_iter_mut().enumerate().for_each(|(item, slot)| {
                *slot = derive_particle(rec, item as u32, batch.directions);
            });
        }
        debug!("spawned {} particles from {} requests", batch.total_items, batch.records.len());
    }

    fn reset_lists(&mut self) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        for (_, list) in arena.lists.iter_mut() {
            list.reset();
        }
        for (_, counters) in arena.counters.iter_mut() {
            counters.alive = 0;
            counters.dropped = 0;
        }
        arena.detonations.clear();
    }

    fn dispatch_update(&mut self, params: &SimParams) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let lists = &arena.lists;
        let mut events: Vec<DetonationEvent> = arena
            .particles
            .par_iter_mut()
            .enumerate()
            .filter_map(|(slot, p)| {
                let position = p.position;
                let color = p.color;
                match step_particle(p, params) {
                    StepOutcome::Survived { kind, detonated } => {
                        lists[kind].push(slot as u32);
                        detonated.then_some(DetonationEvent {
                            position,
                            slot: slot as u32,
                            color,
                        })
                    }
                    StepOutcome::Skipped | StepOutcome::Expired => None,
                }
            })
            .collect();
        events.truncate(params.detonation_capacity as usize);
        arena.detonations.extend(events);
    }

    fn build_draw_args(&mut self) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        for kind in ParticleKind::LIVE {
            let list = &arena.lists[kind];
            let cursor = list.attempted();
            arena.args[kind] = DrawIndirectArgs::from_cursor(cursor, list.budget());
            let counters = &mut arena.counters[kind];
            counters.alive = cursor;
            counters.dropped = list.dropped();
            counters.dropped_total += u64::from(counters.dropped);
        }
    }

    fn upload(&mut self, start: u32, particles: &[Particle]) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let (_, region) = arena.staging.next_region();
        region.clear();
        region.extend_from_slice(particles);

        let start = start as usize;
        arena.particles[start..start + region.len()].copy_from_slice(region);
    }

    fn request_diagnostics(&mut self, frame: u64) -> bool {
        let Some(arena) = self.arena.as_ref() else {
            return false;
        };
        self.readback = Some(KindStats {
            frame,
            kinds: arena.counters,
        });
        true
    }

    fn poll_diagnostics(&mut self) -> Option<KindStats> {
        self.readback.take()
    }

    fn drain_detonations(&mut self, out: &mut Vec<DetonationEvent>) {
        if let Some(arena) = self.arena.as_mut() {
            out.append(&mut arena.detonations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{FrameStatus, ParticleEngine};
    use crate::error::Rejection;
    use crate::kind::KindBudgets;
    use crate::request::{ConeBurst, DirectionalBurst, ShellLaunch, SmokePuff};
    use bytemuck::cast_slice;
    use glam::Vec3;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn engine(config: EngineConfig) -> ParticleEngine<CpuDevice> {
        ParticleEngine::with_arena(config, CpuDevice::new()).unwrap()
    }

    fn scenario_config() -> EngineConfig {
        EngineConfig {
            capacity: 10_000,
            budgets: KindBudgets::default().with(ParticleKind::Spark, 2000),
            ..Default::default()
        }
    }

    #[test]
    fn test_cone_burst_over_budget() {
        let mut engine = engine(scenario_config());
        let accepted = engine
            .enqueue(ConeBurst {
                count: 3000,
                half_angle: 15f32.to_radians(),
                seed: 42,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(accepted, 3000);

        let status = engine.run_frame(FRAME);
        assert_eq!(status, FrameStatus::Submitted { frame: 1, spawned: 3000 });

        let device = engine.device();
        assert_eq!(device.count_kind(ParticleKind::Spark), 3000);
        assert_eq!(device.list(ParticleKind::Spark).len(), 2000);
        assert_eq!(device.draw_args(ParticleKind::Spark).instance_count, 2000);
        assert_eq!(device.draw_args(ParticleKind::Spark).vertex_count, 6);
        assert!(device.counters(ParticleKind::Spark).dropped >= 1000);
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_instance_count_matches_appends() {
        let mut engine = engine(scenario_config());
        engine.enqueue(SmokePuff {
            origin: Vec3::new(0.0, 20.0, 0.0),
            count: 500,
            ..Default::default()
        })
        .unwrap();
        engine.run_frame(FRAME);

        let device = engine.device();
        let layout = device.layout().unwrap().clone();
        for kind in ParticleKind::LIVE {
            let list = device.list(kind);
            let args = device.draw_args(kind);
            assert_eq!(args.instance_count as usize, list.len(), "{kind}");
            assert_eq!(list.len(), device.count_kind(kind).min(layout.budget(kind) as usize));
            for slot in list {
                assert_eq!(device.particles()[slot as usize].kind(), kind);
            }
        }
        assert_eq!(device.list(ParticleKind::Smoke).len(), 500);
    }

    #[test]
    fn test_rejections_leave_arena_untouched() {
        let mut engine = engine(scenario_config());
        engine.enqueue(ConeBurst { count: 100, ..Default::default() }).unwrap();
        engine.run_frame(FRAME);
        let before: Vec<u8> = cast_slice(engine.device().particles()).to_vec();

        assert_eq!(
            engine.enqueue(ConeBurst { count: 0, ..Default::default() }),
            Err(Rejection::Degenerate)
        );
        assert_eq!(
            engine.enqueue(DirectionalBurst::default()),
            Err(Rejection::Degenerate)
        );
        assert!(matches!(
            engine.enqueue(ConeBurst {
                particle_start: 9_990,
                count: 11,
                ..Default::default()
            }),
            Err(Rejection::NoRoom { .. })
        ));
        assert_eq!(engine.pending_requests(), 0);
        assert_eq!(cast_slice::<Particle, u8>(engine.device().particles()), &before[..]);
    }

    #[test]
    fn test_disabled_spawn_rejects_everything() {
        let mut engine = engine(EngineConfig {
            device_spawn: false,
            ..scenario_config()
        });
        let before: Vec<u8> = cast_slice(engine.device().particles()).to_vec();
        let lists_before = engine.device().list(ParticleKind::Spark);

        assert_eq!(engine.enqueue(ConeBurst::default()), Err(Rejection::Disabled));
        assert_eq!(engine.enqueue(ShellLaunch::default()), Err(Rejection::Disabled));
        assert_eq!(cast_slice::<Particle, u8>(engine.device().particles()), &before[..]);
        assert_eq!(engine.device().list(ParticleKind::Spark), lists_before);
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_not_ready_engine_is_a_no_op() {
        let mut engine = ParticleEngine::new(scenario_config(), CpuDevice::new());
        assert_eq!(engine.enqueue(ConeBurst::default()), Err(Rejection::NotReady));
        assert_eq!(engine.upload(0, &[Particle::DEAD]), Err(Rejection::NotReady));
        assert_eq!(engine.run_frame(FRAME), FrameStatus::NotReady);

        engine.initialize().unwrap();
        assert!(engine.is_ready());
        assert_eq!(engine.capacity(), 10_000);
    }

    #[test]
    fn test_spawn_is_deterministic_across_engines() {
        let run = || {
            let mut engine = engine(scenario_config());
            engine
                .enqueue(ConeBurst {
                    count: 2500,
                    crackle: 0.3,
                    seed: 7,
                    ..Default::default()
                })
                .unwrap();
            engine
                .enqueue(DirectionalBurst {
                    particle_start: 3000,
                    directions: vec![Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X],
                    seed: 11,
                    ..Default::default()
                })
                .unwrap();
            for _ in 0..5 {
                engine.run_frame(FRAME);
            }
            cast_slice::<Particle, u8>(engine.device().particles()).to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_soak_overload_stays_within_budget() {
        let budgets = KindBudgets::uniform(64);
        let mut engine = engine(EngineConfig {
            capacity: 4096,
            budgets,
            ..Default::default()
        });
        let mut last_totals = PerKind([0u64; crate::kind::LIVE_KIND_COUNT]);

        for frame in 0..60u32 {
            engine
                .enqueue(ConeBurst {
                    particle_start: 0,
                    count: 2048,
                    crackle: 0.5,
                    seed: frame,
                    ..Default::default()
                })
                .unwrap();
            engine
                .enqueue(ConeBurst {
                    particle_start: 2048,
                    count: 2048,
                    finale: true,
                    sparkle: 6.0,
                    seed: frame + 1000,
                    ..Default::default()
                })
                .unwrap();
            engine.run_frame(FRAME);

            let device = engine.device();
            for kind in ParticleKind::LIVE {
                assert!(device.list(kind).len() <= 64);
                assert!(device.draw_args(kind).instance_count <= 64);
                let total = device.counters(kind).dropped_total;
                assert!(total >= last_totals[kind], "{kind} total went backwards");
                last_totals[kind] = total;
            }
        }
        assert!(last_totals[ParticleKind::Spark] > 0);
    }

    #[test]
    fn test_kinds_never_regress_and_particles_expire() {
        let mut engine = engine(EngineConfig {
            capacity: 2048,
            budgets: KindBudgets::uniform(2048),
            ..Default::default()
        });
        engine
            .enqueue(ConeBurst {
                count: 512,
                origin: Vec3::new(0.0, 50.0, 0.0),
                crackle: 1.0,
                ..Default::default()
            })
            .unwrap();
        engine
            .enqueue(ConeBurst {
                particle_start: 512,
                count: 512,
                origin: Vec3::new(0.0, 50.0, 0.0),
                finale: true,
                crackle: 0.5,
                sparkle: 4.0,
                ..Default::default()
            })
            .unwrap();
        engine
            .enqueue(ShellLaunch {
                particle_start: 1024,
                count: 16,
                origin: Vec3::new(0.0, 5.0, 0.0),
                spread: 1.0,
                fuse: 1.0,
                ..Default::default()
            })
            .unwrap();
        engine
            .enqueue(SmokePuff {
                particle_start: 1100,
                count: 64,
                origin: Vec3::new(0.0, 30.0, 0.0),
                ..Default::default()
            })
            .unwrap();

        let dt = FRAME.as_secs_f32();
        engine.run_frame(FRAME);
        let initial: Vec<Particle> = engine.device().particles().to_vec();
        let mut previous = initial.clone();
        let mut elapsed = vec![dt; previous.len()];

        for _ in 0..600 {
            engine.run_frame(FRAME);
            let current = engine.device().particles();
            for (slot, (before, now)) in previous.iter().zip(current).enumerate() {
                if !before.kind().is_live() {
                    assert!(!now.kind().is_live(), "slot {slot} came back to life");
                    continue;
                }
                elapsed[slot] += dt;
                if now.kind().is_live() {
                    assert!(now.kind >= before.kind, "slot {slot} regressed");
                    assert!(before.kind().can_become(now.kind()));
                    assert!(now.lifetime <= before.lifetime);
                } else {
                    let limit = initial[slot].lifetime + dt + 1e-3;
                    assert!(elapsed[slot] <= limit, "slot {slot} outlived its lifetime");
                }
            }
            previous = current.to_vec();
        }
        assert!(previous.iter().all(|p| !p.kind().is_live()));
    }

    #[test]
    fn test_shells_report_detonations() {
        let mut engine = engine(EngineConfig {
            capacity: 64,
            budgets: KindBudgets::uniform(64),
            detonation_capacity: 4,
            ..Default::default()
        });
        engine
            .enqueue(ShellLaunch {
                count: 8,
                fuse: 0.5,
                ..Default::default()
            })
            .unwrap();

        let mut events = Vec::new();
        for _ in 0..60 {
            engine.run_frame(FRAME);
            events.extend(engine.drain_detonations());
        }
        // All eight detonate on the same frame; the channel keeps four.
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.position[1] > 5.0 && e.slot < 8));
        assert_eq!(engine.device().count_kind(ParticleKind::Shell), 0);
    }

    #[test]
    fn test_upload_writes_records_in_chunks() {
        let mut engine = engine(EngineConfig {
            capacity: 100,
            budgets: KindBudgets::uniform(100),
            upload_chunk: 8,
            device_spawn: false,
            ..Default::default()
        });
        let mut spark = Particle {
            position: [0.0, 10.0, 0.0],
            lifetime: 5.0,
            color: [1.0; 4],
            ..Particle::DEAD
        };
        spark.set_kind(ParticleKind::Spark);

        assert_eq!(engine.upload(40, &vec![spark; 20]), Ok(20));
        assert!(matches!(
            engine.upload(90, &vec![spark; 11]),
            Err(Rejection::NoRoom { .. })
        ));
        assert_eq!(engine.upload(0, &[]), Err(Rejection::Degenerate));

        engine.run_frame(FRAME);
        let device = engine.device();
        assert_eq!(device.count_kind(ParticleKind::Spark), 20);
        assert_eq!(device.list(ParticleKind::Spark).len(), 20);
        assert!(device.particles()[..40].iter().all(|p| !p.kind().is_live()));
    }

    #[test]
    fn test_reallocation_discards_state() {
        let mut engine = engine(scenario_config());
        engine.enqueue(ConeBurst { count: 1000, ..Default::default() }).unwrap();
        engine.run_frame(FRAME);
        assert!(engine.device().count_kind(ParticleKind::Spark) > 0);

        engine.reallocate(500).unwrap();
        assert_eq!(engine.capacity(), 500);
        assert!(engine.device().particles().iter().all(|p| *p == Particle::DEAD));
        assert_eq!(engine.device().counters(ParticleKind::Spark), KindCounters::default());
        assert!(matches!(
            engine.enqueue(ConeBurst { count: 501, ..Default::default() }),
            Err(Rejection::NoRoom { .. })
        ));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_diagnostics_arrive_on_cadence() {
        let mut engine = engine(EngineConfig {
            diagnostics_hz: 1.0,
            ..scenario_config()
        });
        engine.enqueue(ConeBurst { count: 3000, seed: 42, ..Default::default() }).unwrap();
        engine.run_frame(FRAME);
        assert!(engine.latest_stats().is_none());

        for _ in 0..70 {
            engine.run_frame(FRAME);
        }
        let stats = engine.latest_stats().expect("a sample after one second");
        assert!(stats.frame > 1);
        assert!(stats.kinds[ParticleKind::Spark].dropped_total >= 1000);
        assert!(stats.summary().contains("spark "));
    }
}
