//! Execution backend seam
//!
//! The engine drives a device through the per-frame stage order below and
//! never touches arena memory itself. `CpuDevice` runs the stages with rayon,
//! the wgpu device in `flare_render` records them as compute passes.
//!
//! Per frame the engine calls, in this order:
//! `begin_frame`, `dispatch_spawn`, `reset_lists`, `dispatch_update`,
//! `build_draw_args`, optionally `request_diagnostics`, then `end_frame`.

use crate::diagnostics::KindStats;
use crate::draw_args::ArenaLayout;
use crate::error::EngineError;
use crate::particle::{DetonationEvent, Particle, SimParams};
use crate::queue::SpawnBatch;

pub trait ParticleDevice {
    /// True once `allocate` has succeeded.
    fn is_ready(&self) -> bool;

    /// (Re)create every arena resource for `layout`, all slots `Dead` and
    /// all counters zero. Previous contents are discarded.
    fn allocate(&mut self, layout: &ArenaLayout) -> Result<(), EngineError>;

    fn layout(&self) -> Option<&ArenaLayout>;

    fn capacity(&self) -> u32 {
        self.layout().map_or(0, |layout| layout.capacity)
    }

    fn begin_frame(&mut self) {}

    /// Write every item of `batch` into its slot. Indices are pre-validated.
    fn dispatch_spawn(&mut self, batch: &SpawnBatch<'_>);

    /// Zero every append cursor and per-frame counter.
    fn reset_lists(&mut self);

    fn dispatch_update(&mut self, params: &SimParams);

    /// `instance_count = min(cursor, budget)` per kind, plus counter bookkeeping.
    fn build_draw_args(&mut self);

    fn end_frame(&mut self) {}

    /// Copy `particles` (at most one upload chunk) into slots starting at
    /// `start` through the upload ring. The range is pre-validated.
    fn upload(&mut self, start: u32, particles: &[Particle]);

    /// Start a counter readback tagged with `frame`. False if none could be
    /// started; the caller will try again on its next cadence tick.
    fn request_diagnostics(&mut self, frame: u64) -> bool;

    /// A finished readback, if any. Never blocks.
    fn poll_diagnostics(&mut self) -> Option<KindStats>;

    /// Move detonation events that have become visible to the host into `out`.
    fn drain_detonations(&mut self, out: &mut Vec<DetonationEvent>);
}
