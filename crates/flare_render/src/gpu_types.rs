//! Host mirrors of the device-only WGSL structs
//!
//! Records shared with the CPU path (`Particle`, `SpawnRecord`, `SimParams`,
//! `DrawIndirectArgs`, `DetonationEvent`) live in `flare_core`; these exist
//! only because the GPU needs them.

use bytemuck::{Pod, Zeroable};
use flare_core::{ArenaLayout, DetonationEvent, ParticleKind, LIVE_KIND_COUNT};

/// Compute workgroup width used by the spawn and update kernels.
pub const WORKGROUP_SIZE: u32 = 64;
/// Per-dimension dispatch limit from the default wgpu limits.
pub const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// `ListLayout` uniform: `(offset, budget, 0, 0)` per live kind.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ListLayoutUniform {
    pub entries: [[u32; 4]; LIVE_KIND_COUNT],
}

impl ListLayoutUniform {
    pub fn new(layout: &ArenaLayout) -> Self {
        let mut entries = [[0u32; 4]; LIVE_KIND_COUNT];
        for kind in ParticleKind::LIVE {
            if let Some(i) = kind.live_index() {
                entries[i] = [layout.list_offsets[kind], layout.budget(kind), 0, 0];
            }
        }
        Self { entries }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SpawnInfo {
    pub record_count: u32,
    pub total_items: u32,
    pub _pad: [u32; 2],
}

/// `KindCounter` as the device leaves it after the draw-args pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct KindCounterRaw {
    pub cursor: u32,
    pub alive: u32,
    pub dropped: u32,
    /// Wrapping running total.
    pub dropped_total: u32,
}

pub const COUNTERS_SIZE: u64 = (std::mem::size_of::<KindCounterRaw>() * LIVE_KIND_COUNT) as u64;

/// Head of the `DetonationList` storage block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DetonationHeader {
    /// Attempted appends; may exceed the capacity.
    pub count: u32,
    pub _pad: [u32; 3],
}

pub const DETONATION_HEADER_SIZE: u64 = std::mem::size_of::<DetonationHeader>() as u64;

/// Bytes of the detonation block. Never zero so the binding stays valid.
pub fn detonation_block_size(capacity: u32) -> u64 {
    DETONATION_HEADER_SIZE
        + u64::from(capacity.max(1)) * std::mem::size_of::<DetonationEvent>() as u64
}

/// Workgroup grid covering `tasks` invocations, folded into a second
/// dimension past the per-dimension limit.
pub fn dispatch_grid(tasks: u32) -> (u32, u32) {
    let groups = tasks.div_ceil(WORKGROUP_SIZE).max(1);
    if groups <= MAX_GROUPS_PER_DIM {
        (groups, 1)
    } else {
        (MAX_GROUPS_PER_DIM, groups.div_ceil(MAX_GROUPS_PER_DIM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flare_core::KindBudgets;

    #[test]
    fn test_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<ListLayoutUniform>(), 96);
        assert_eq!(std::mem::size_of::<SpawnInfo>(), 16);
        assert_eq!(COUNTERS_SIZE, 96);
        assert_eq!(detonation_block_size(0), 48);
        assert_eq!(detonation_block_size(256), 16 + 256 * 32);
    }

    #[test]
    fn test_list_uniform_follows_layout() {
        let layout = ArenaLayout::new(1000, &KindBudgets::uniform(100), 4, 64, 2).unwrap();
        let uniform = ListLayoutUniform::new(&layout);
        assert_eq!(uniform.entries[0], [0, 100, 0, 0]);
        assert_eq!(uniform.entries[1][0], layout.list_offsets[ParticleKind::Spark]);
        assert!(uniform.entries.iter().all(|e| e[1] == 100));
    }

    #[test]
    fn test_dispatch_grid_covers_tasks() {
        assert_eq!(dispatch_grid(0), (1, 1));
        assert_eq!(dispatch_grid(64), (1, 1));
        assert_eq!(dispatch_grid(65), (2, 1));

        let tasks = 8_000_000;
        let (x, y) = dispatch_grid(tasks);
        assert_eq!(x, MAX_GROUPS_PER_DIM);
        assert!(u64::from(x) * u64::from(y) * 64 >= u64::from(tasks));
    }
}
