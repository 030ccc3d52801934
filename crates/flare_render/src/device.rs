//! wgpu implementation of the particle device
//!
//! Every stage of a frame is recorded into one command encoder opened by
//! `begin_frame` and submitted by `end_frame`; the host never waits on the
//! GPU. Counters and detonations come back through [`ReadbackRing`] a few
//! frames late.

use crate::buffer::GrowableBuffer;
use crate::context::GpuContext;
use crate::gpu_types::{
    detonation_block_size, dispatch_grid, ListLayoutUniform, SpawnInfo, COUNTERS_SIZE,
};
use crate::kernels::Kernels;
use crate::readback::{Readback, ReadbackRing};
use flare_core::upload::UploadRing;
use flare_core::{
    ArenaLayout, DetonationEvent, DrawIndirectArgs, DropTotals, EngineError, KindCounters,
    KindStats, Particle, ParticleDevice, PerKind, SimParams, SpawnBatch, SpawnRecord,
    LIVE_KIND_COUNT,
};
use std::sync::Arc;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

const PARTICLE_SIZE: u64 = std::mem::size_of::<Particle>() as u64;
const READBACK_DEPTH: usize = 4;

/// Buffers a renderer needs to draw the current arena.
pub struct ArenaResources<'a> {
    pub layout: &'a ArenaLayout,
    pub particles: &'a wgpu::Buffer,
    pub indices: &'a wgpu::Buffer,
    pub args: &'a wgpu::Buffer,
    /// Bumped on every allocation; bind groups built for an older value are stale.
    pub generation: u64,
}

struct GpuArena {
    layout: ArenaLayout,
    particles: wgpu::Buffer,
    indices: wgpu::Buffer,
    counters: wgpu::Buffer,
    args: wgpu::Buffer,
    detonations: wgpu::Buffer,
    params: wgpu::Buffer,
    frame_group: wgpu::BindGroup,
    records: GrowableBuffer,
    directions: GrowableBuffer,
    spawn_info: wgpu::Buffer,
    spawn_group: wgpu::BindGroup,
    staging: UploadRing<wgpu::Buffer>,
    readback: ReadbackRing,
}

pub struct GpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    kernels: Kernels,
    max_particles: u32,
    arena: Option<GpuArena>,
    generation: u64,
    encoder: Option<wgpu::CommandEncoder>,
    /// Readback slot claimed for the frame being recorded.
    frame_readback: Option<usize>,
    totals: DropTotals,
    stats: Option<KindStats>,
    detonations: Vec<DetonationEvent>,
}

impl GpuDevice {
    pub fn new(context: &GpuContext) -> Self {
        Self::from_parts(
            context.device.clone(),
            context.queue.clone(),
            context.capabilities.max_particles(),
        )
    }

    pub fn from_parts(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, max_particles: u32) -> Self {
        let kernels = Kernels::new(&device);
        Self {
            device,
            queue,
            kernels,
            max_particles,
            arena: None,
            generation: 0,
            encoder: None,
            frame_readback: None,
            totals: DropTotals::default(),
            stats: None,
            detonations: Vec::new(),
        }
    }

    pub fn wgpu_device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn wgpu_queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn max_particles(&self) -> u32 {
        self.max_particles
    }

    pub fn resources(&self) -> Option<ArenaResources<'_>> {
        self.arena.as_ref().map(|arena| ArenaResources {
            layout: &arena.layout,
            particles: &arena.particles,
            indices: &arena.indices,
            args: &arena.args,
            generation: self.generation,
        })
    }

    fn create_arena(&self, layout: &ArenaLayout) -> Result<GpuArena, EngineError> {
        let device = &*self.device;
        let storage = wgpu::BufferUsages::STORAGE;

        let particles = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Arena"),
            size: u64::from(layout.capacity) * PARTICLE_SIZE,
            usage: storage | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let indices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Index Lists"),
            size: u64::from(layout.list_len.max(1)) * 4,
            usage: storage,
            mapped_at_creation: false,
        });
        let counters = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Kind Counters"),
            size: COUNTERS_SIZE,
            usage: storage | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Draw Args"),
            contents: bytemuck::cast_slice(&[DrawIndirectArgs::quads(0); LIVE_KIND_COUNT]),
            usage: storage | wgpu::BufferUsages::INDIRECT,
        });
        let detonations = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Detonations"),
            size: detonation_block_size(layout.detonation_capacity),
            usage: storage | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Sim Params"),
            size: std::mem::size_of::<SimParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lists = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle List Layout"),
            contents: bytemuck::bytes_of(&ListLayoutUniform::new(layout)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Frame Bind Group"),
            layout: &self.kernels.frame_layout,
            entries: &[
                whole(0, &particles),
                whole(1, &indices),
                whole(2, &counters),
                whole(3, &args),
                whole(4, &detonations),
                whole(5, &params),
                whole(6, &lists),
            ],
        });

        let copy_dst = storage | wgpu::BufferUsages::COPY_DST;
        let records = GrowableBuffer::new(
            device,
            "Particle Spawn Records",
            copy_dst,
            64 * std::mem::size_of::<SpawnRecord>() as u64,
        );
        let directions = GrowableBuffer::new(device, "Particle Spawn Directions", copy_dst, 1024);
        let spawn_info = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Spawn Info"),
            size: std::mem::size_of::<SpawnInfo>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let spawn_group = spawn_group(device, &self.kernels, &records, &directions, &spawn_info);

        let chunk_bytes = u64::from(layout.upload_chunk) * PARTICLE_SIZE;
        let staging = UploadRing::from_fn(layout.upload_ring_depth, |i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Particle Upload {i}")),
                size: chunk_bytes,
                usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        Ok(GpuArena {
            layout: layout.clone(),
            particles,
            indices,
            counters,
            args,
            detonations,
            params,
            frame_group,
            records,
            directions,
            spawn_info,
            spawn_group,
            staging,
            readback: ReadbackRing::new(device, READBACK_DEPTH, layout.detonation_capacity),
        })
    }

    /// Move finished readbacks into `stats` and `detonations`.
    fn harvest(&mut self) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let _ = self.device.poll(wgpu::Maintain::Poll);

        let totals = &mut self.totals;
        let stats = &mut self.stats;
        let events = &mut self.detonations;
        arena.readback.harvest(|Readback { counters, detonations }| {
            events.extend(detonations);
            if let Some((frame, raw)) = counters {
                let widened = totals.observe(PerKind(raw.map(|c| c.dropped_total)));
                *stats = Some(KindStats {
                    frame,
                    kinds: PerKind::from_fn(|kind| {
                        let c = raw[kind.live_index().unwrap_or(0)];
                        KindCounters {
                            alive: c.alive,
                            dropped: c.dropped,
                            dropped_total: widened[kind],
                        }
                    }),
                });
            }
        });
    }
}

fn spawn_group(
    device: &wgpu::Device,
    kernels: &Kernels,
    records: &GrowableBuffer,
    directions: &GrowableBuffer,
    info: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Particle Spawn Bind Group"),
        layout: &kernels.spawn_layout,
        entries: &[whole(0, records.buffer()), whole(1, directions.buffer()), whole(2, info)],
    })
}

fn whole(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn compute_pass<'e>(encoder: &'e mut wgpu::CommandEncoder, label: &str) -> wgpu::ComputePass<'e> {
    encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    })
}

impl ParticleDevice for GpuDevice {
    fn is_ready(&self) -> bool {
        self.arena.is_some()
    }

    fn allocate(&mut self, layout: &ArenaLayout) -> Result<(), EngineError> {
        if layout.capacity > self.max_particles {
            return Err(EngineError::Device(format!(
                "{} particles exceed the adapter's storage binding limit of {}",
                layout.capacity, self.max_particles
            )));
        }
        // Drop in-flight work that references the old buffers.
        self.encoder = None;
        self.frame_readback = None;
        self.arena = Some(self.create_arena(layout)?);
        self.generation += 1;
        self.totals.reset();
        self.stats = None;
        self.detonations.clear();
        debug!(
            "gpu arena: {} MiB of particles, {} index entries",
            (u64::from(layout.capacity) * PARTICLE_SIZE) >> 20,
            layout.list_len
        );
        Ok(())
    }

    fn layout(&self) -> Option<&ArenaLayout> {
        self.arena.as_ref().map(|arena| &arena.layout)
    }

    fn begin_frame(&mut self) {
        if self.encoder.is_none() {
            self.encoder = Some(self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Frame Encoder"),
            }));
        }
    }

    fn dispatch_spawn(&mut self, batch: &SpawnBatch<'_>) {
        self.begin_frame();
        let Some(arena) = self.arena.as_mut() else {
            return;
        };

        let record_bytes = std::mem::size_of_val(batch.records) as u64;
        let direction_bytes = std::mem::size_of_val(batch.directions) as u64;
        let grew = arena.records.ensure(&self.device, record_bytes)
            | arena.directions.ensure(&self.device, direction_bytes);
        if grew {
            arena.spawn_group = spawn_group(
                &self.device,
                &self.kernels,
                &arena.records,
                &arena.directions,
                &arena.spawn_info,
            );
        }

        self.queue
            .write_buffer(arena.records.buffer(), 0, bytemuck::cast_slice(batch.records));
        if !batch.directions.is_empty() {
            self.queue
                .write_buffer(arena.directions.buffer(), 0, bytemuck::cast_slice(batch.directions));
        }
        let info = SpawnInfo {
            record_count: batch.records.len() as u32,
            total_items: batch.total_items,
            _pad: [0; 2],
        };
        self.queue.write_buffer(&arena.spawn_info, 0, bytemuck::bytes_of(&info));

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let (x, y) = dispatch_grid(batch.total_items);
        let mut pass = compute_pass(encoder, "particle spawn");
        pass.set_pipeline(&self.kernels.spawn);
        pass.set_bind_group(0, &arena.frame_group, &[]);
        pass.set_bind_group(1, &arena.spawn_group, &[]);
        pass.dispatch_workgroups(x, y, 1);
    }

    fn reset_lists(&mut self) {
        self.begin_frame();
        let (Some(arena), Some(encoder)) = (self.arena.as_ref(), self.encoder.as_mut()) else {
            return;
        };
        let mut pass = compute_pass(encoder, "particle reset");
        pass.set_pipeline(&self.kernels.reset);
        pass.set_bind_group(0, &arena.frame_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }

    fn dispatch_update(&mut self, params: &SimParams) {
        self.begin_frame();
        let (Some(arena), Some(encoder)) = (self.arena.as_ref(), self.encoder.as_mut()) else {
            return;
        };
        self.queue.write_buffer(&arena.params, 0, bytemuck::bytes_of(params));

        let (x, y) = dispatch_grid(arena.layout.capacity);
        let mut pass = compute_pass(encoder, "particle update");
        pass.set_pipeline(&self.kernels.update);
        pass.set_bind_group(0, &arena.frame_group, &[]);
        pass.dispatch_workgroups(x, y, 1);
    }

    fn build_draw_args(&mut self) {
        self.begin_frame();
        let (Some(arena), Some(encoder)) = (self.arena.as_ref(), self.encoder.as_mut()) else {
            return;
        };
        let mut pass = compute_pass(encoder, "particle draw args");
        pass.set_pipeline(&self.kernels.build_args);
        pass.set_bind_group(0, &arena.frame_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }

    fn end_frame(&mut self) {
        let Some(mut encoder) = self.encoder.take() else {
            return;
        };
        let Some(arena) = self.arena.as_mut() else {
            return;
        };

        if self.frame_readback.is_none() && arena.layout.detonation_capacity > 0 {
            self.frame_readback = arena.readback.acquire();
            if self.frame_readback.is_none() {
                debug!(
                    "{} readbacks in flight; this frame's detonations are not reported",
                    arena.readback.in_flight()
                );
            }
        }
        let slot = self.frame_readback.take();
        if let Some(slot) = slot {
            arena
                .readback
                .record(slot, &mut encoder, &arena.counters, &arena.detonations);
        }

        self.queue.submit(Some(encoder.finish()));

        if let Some(slot) = slot {
            arena.readback.submit(slot);
        }
    }

    fn upload(&mut self, start: u32, particles: &[Particle]) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let bytes: &[u8] = bytemuck::cast_slice(particles);
        let (_, region) = arena.staging.next_region();
        if bytes.len() as u64 > region.size() {
            warn!("upload of {} particles exceeds one staging region", particles.len());
            return;
        }
        self.queue.write_buffer(region, 0, bytes);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Upload Encoder"),
        });
        encoder.copy_buffer_to_buffer(
            region,
            0,
            &arena.particles,
            u64::from(start) * PARTICLE_SIZE,
            bytes.len() as u64,
        );
        self.queue.submit(Some(encoder.finish()));
    }

    fn request_diagnostics(&mut self, frame: u64) -> bool {
        let Some(arena) = self.arena.as_mut() else {
            return false;
        };
        if self.frame_readback.is_none() {
            self.frame_readback = arena.readback.acquire();
        }
        match self.frame_readback {
            Some(slot) => {
                arena.readback.want_counters(slot, frame);
                true
            }
            None => false,
        }
    }

    fn poll_diagnostics(&mut self) -> Option<KindStats> {
        self.harvest();
        self.stats.take()
    }

    fn drain_detonations(&mut self, out: &mut Vec<DetonationEvent>) {
        self.harvest();
        out.append(&mut self.detonations);
    }
}
