//! Indirect draw arguments and index-list layout

use crate::error::EngineError;
use crate::kind::{KindBudgets, ParticleKind, PerKind, LIVE_KIND_COUNT};
use bytemuck::{Pod, Zeroable};

/// Vertices per particle billboard (two triangles).
pub const QUAD_VERTICES: u32 = 6;

/// Index-list regions start on multiples of this many `u32`s so each one
/// can be bound at a 256-byte aligned storage offset.
pub const LIST_ALIGN: u32 = 64;

/// Layout of a non-indexed indirect draw, as consumed by `draw_indirect`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn quads(instance_count: u32) -> Self {
        Self {
            vertex_count: QUAD_VERTICES,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Arguments for a kind whose append cursor reached `cursor`.
    pub fn from_cursor(cursor: u32, budget: u32) -> Self {
        Self::quads(cursor.min(budget))
    }
}

/// Where everything for one arena lives, shared by every device.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaLayout {
    pub capacity: u32,
    pub budgets: PerKind<u32>,
    /// First `u32` of each kind's region in the shared index buffer.
    pub list_offsets: PerKind<u32>,
    /// Total `u32`s in the index buffer.
    pub list_len: u32,
    pub detonation_capacity: u32,
    pub upload_chunk: u32,
    pub upload_ring_depth: usize,
}

impl ArenaLayout {
    pub fn new(
        capacity: u32,
        budgets: &KindBudgets,
        detonation_capacity: u32,
        upload_chunk: u32,
        upload_ring_depth: usize,
    ) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::ZeroCapacity);
        }
        if upload_ring_depth < 2 {
            return Err(EngineError::RingTooShallow(upload_ring_depth));
        }

        // A kind can never have more survivors than the arena has slots.
        let budgets = budgets.table().map(|_, &budget| budget.min(capacity));

        let mut offsets = [0u32; LIVE_KIND_COUNT];
        let mut cursor = 0u32;
        for (i, (_, &budget)) in budgets.iter().enumerate() {
            offsets[i] = cursor;
            cursor = cursor
                .checked_add(budget.max(1))
                .and_then(|end| align_up(end, LIST_ALIGN))
                .ok_or(EngineError::ListsTooLarge(capacity))?;
        }

        Ok(Self {
            capacity,
            budgets,
            list_offsets: PerKind(offsets),
            list_len: cursor,
            detonation_capacity,
            upload_chunk: upload_chunk.max(1),
            upload_ring_depth,
        })
    }

    pub fn budget(&self, kind: ParticleKind) -> u32 {
        self.budgets[kind]
    }

    /// Byte offset of a kind's draw arguments in the packed args buffer.
    pub fn args_offset(kind: ParticleKind) -> u64 {
        kind.live_index().unwrap_or(0) as u64 * DrawIndirectArgs::SIZE
    }
}

fn align_up(value: u32, align: u32) -> Option<u32> {
    value.div_ceil(align).checked_mul(align)
}
