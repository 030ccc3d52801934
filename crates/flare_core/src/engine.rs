//! Particle engine front end
//!
//! Owns the spawn queue, the frame clock and a device. Callers enqueue
//! requests between frames and call [`ParticleEngine::run_frame`] once per
//! frame; everything else happens on the device.

use crate::config::EngineConfig;
use crate::device::ParticleDevice;
use crate::diagnostics::{DiagnosticsSampler, KindStats};
use crate::error::{EngineError, Rejection};
use crate::particle::{DetonationEvent, Particle, SimParams};
use crate::queue::SpawnQueue;
use crate::request::SpawnRequest;
use crate::time::FrameClock;
use flare_metrics::KernelProfiler;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of [`ParticleEngine::run_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Submitted { frame: u64, spawned: u32 },
    /// The device has no arena; nothing ran and the queue was dropped.
    NotReady,
}

pub struct ParticleEngine<D: ParticleDevice> {
    config: EngineConfig,
    device: D,
    queue: SpawnQueue,
    clock: FrameClock,
    sampler: DiagnosticsSampler,
    profiler: KernelProfiler,
    detonations: Vec<DetonationEvent>,
}

impl<D: ParticleDevice> ParticleEngine<D> {
    /// Engine with no arena yet; call [`initialize`](Self::initialize).
    pub fn new(config: EngineConfig, device: D) -> Self {
        Self {
            clock: FrameClock::new(config.max_frame_duration()),
            sampler: DiagnosticsSampler::new(config.diagnostics_hz),
            queue: SpawnQueue::new(),
            profiler: KernelProfiler::new(),
            detonations: Vec::new(),
            config,
            device,
        }
    }

    /// `new` followed by `initialize`.
    pub fn with_arena(config: EngineConfig, device: D) -> Result<Self, EngineError> {
        let mut engine = Self::new(config, device);
        engine.initialize()?;
        Ok(engine)
    }

    /// Allocate the arena at the configured capacity.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.reallocate(self.config.capacity)
    }

    /// Allocate a fresh zeroed arena of `capacity` slots. Every in-flight
    /// particle, list and cumulative counter is discarded.
    pub fn reallocate(&mut self, capacity: u32) -> Result<(), EngineError> {
        let layout = self.config.layout_with_capacity(capacity)?;
        self.device.allocate(&layout)?;
        self.config.capacity = capacity;
        self.queue.clear();
        self.sampler.reset();
        self.profiler.reset();
        self.detonations.clear();
        info!(
            "particle arena allocated: {} slots, {} index entries, device spawn {}",
            capacity,
            layout.list_len,
            if self.config.device_spawn { "on" } else { "off" }
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.device.is_ready()
    }

    pub fn capacity(&self) -> u32 {
        self.device.capacity()
    }

    pub fn device_spawn_enabled(&self) -> bool {
        self.config.device_spawn
    }

    /// Queue a request for the next frame. Returns the particle count it
    /// will write; a rejection leaves the engine untouched.
    pub fn enqueue(&mut self, request: impl Into<SpawnRequest>) -> Result<u32, Rejection> {
        if !self.config.device_spawn {
            return Err(Rejection::Disabled);
        }
        if !self.device.is_ready() {
            return Err(Rejection::NotReady);
        }
        self.queue.push(&request.into(), self.device.capacity())
    }

    /// Requests waiting for the next frame.
    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    /// Copy fully formed records into `start..start + particles.len()`,
    /// one upload chunk at a time. Works with device spawning disabled.
    pub fn upload(&mut self, start: u32, particles: &[Particle]) -> Result<u32, Rejection> {
        let Some(layout) = self.device.layout() else {
            return Err(Rejection::NotReady);
        };
        if particles.is_empty() {
            return Err(Rejection::Degenerate);
        }
        let chunk = layout.upload_chunk as usize;
        let start64 = u64::from(start);
        let end = start64 + particles.len() as u64;
        if end > u64::from(layout.capacity) {
            warn!(
                "rejected upload of {} particles at slot {}: arena holds {}",
                particles.len(),
                start,
                layout.capacity
            );
            return Err(Rejection::NoRoom {
                start: start64,
                end,
                capacity: layout.capacity,
            });
        }

        for (i, part) in particles.chunks(chunk).enumerate() {
            self.device.upload(start + (i * chunk) as u32, part);
        }
        Ok(particles.len() as u32)
    }

    /// Run one frame: spawn, reset, update, draw-args build. The queue is
    /// always empty afterwards, even when the device was not ready.
    pub fn run_frame(&mut self, wall_dt: Duration) -> FrameStatus {
        if !self.device.is_ready() {
            if !self.queue.is_empty() {
                debug!("dropping {} spawn requests: device not ready", self.queue.len());
            }
            self.queue.clear();
            return FrameStatus::NotReady;
        }

        let dt = self.clock.advance(wall_dt);
        let frame = self.clock.frame();
        let params = SimParams {
            gravity: self.config.gravity,
            dt: dt.as_secs_f32(),
            ground_y: self.config.ground_y,
            time: self.clock.elapsed().as_secs_f32(),
            detonation_capacity: self.config.detonation_capacity,
            _pad: 0,
        };
        let spawned = self.queue.total_items();

        let device = &mut self.device;
        let queue = &self.queue;
        let profiler = &mut self.profiler;

        device.begin_frame();
        profiler.time_stage("spawn", || {
            let batch = queue.batch();
            if !batch.is_empty() {
                device.dispatch_spawn(&batch);
            }
        });
        profiler.time_stage("reset", || device.reset_lists());
        profiler.time_stage("update", || device.dispatch_update(&params));
        profiler.time_stage("draw_args", || device.build_draw_args());

        if self.sampler.should_request(dt) && !device.request_diagnostics(frame) {
            debug!(frame, "diagnostics readback skipped: no free slot");
        }
        device.end_frame();
        self.queue.clear();

        if let Some(stats) = self.device.poll_diagnostics() {
            debug!(frame = stats.frame, "{}", stats);
            self.sampler.record(stats);
        }

        self.device.drain_detonations(&mut self.detonations);
        let backlog = self.config.detonation_capacity as usize * 8;
        if self.detonations.len() > backlog {
            let excess = self.detonations.len() - backlog;
            self.detonations.drain(..excess);
        }

        FrameStatus::Submitted { frame, spawned }
    }

    /// Most recent diagnostics sample, if any has arrived.
    pub fn latest_stats(&self) -> Option<KindStats> {
        self.sampler.latest()
    }

    /// Take detonation events reported since the last call.
    pub fn drain_detonations(&mut self) -> Vec<DetonationEvent> {
        std::mem::take(&mut self.detonations)
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profiler(&self) -> &KernelProfiler {
        &self.profiler
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}
