//! Non-blocking readback ring
//!
//! Each slot receives a copy of the kind counters and the detonation block at
//! the end of a frame, is mapped after submission, and is harvested whenever
//! the map callback has fired. Nothing here ever waits on the device.

use crate::gpu_types::{
    detonation_block_size, DetonationHeader, KindCounterRaw, COUNTERS_SIZE, DETONATION_HEADER_SIZE,
};
use flare_core::{DetonationEvent, LIVE_KIND_COUNT};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const MAP_PENDING: u8 = 0;
const MAP_READY: u8 = 1;
const MAP_FAILED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Recording,
    InFlight,
}

struct Slot {
    buffer: wgpu::Buffer,
    state: SlotState,
    status: Arc<AtomicU8>,
    /// Engine frame whose counters this slot carries, if any.
    counters_frame: Option<u64>,
    has_detonations: bool,
}

/// What one harvested slot contained.
pub struct Readback {
    pub counters: Option<(u64, [KindCounterRaw; LIVE_KIND_COUNT])>,
    pub detonations: Vec<DetonationEvent>,
}

pub struct ReadbackRing {
    slots: Vec<Slot>,
    in_flight: VecDeque<usize>,
    detonation_capacity: u32,
}

impl ReadbackRing {
    pub fn new(device: &wgpu::Device, depth: usize, detonation_capacity: u32) -> Self {
        let size = COUNTERS_SIZE + detonation_block_size(detonation_capacity);
        let slots = (0..depth)
            .map(|i| Slot {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Particle Readback {i}")),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                state: SlotState::Idle,
                status: Arc::new(AtomicU8::new(MAP_PENDING)),
                counters_frame: None,
                has_detonations: false,
            })
            .collect();
        Self {
            slots,
            in_flight: VecDeque::new(),
            detonation_capacity,
        }
    }

    /// Claim an idle slot for the frame being recorded.
    pub fn acquire(&mut self) -> Option<usize> {
        let index = self.slots.iter().position(|s| s.state == SlotState::Idle)?;
        let slot = &mut self.slots[index];
        slot.state = SlotState::Recording;
        slot.counters_frame = None;
        slot.has_detonations = false;
        slot.status.store(MAP_PENDING, Ordering::Release);
        Some(index)
    }

    pub fn want_counters(&mut self, index: usize, frame: u64) {
        self.slots[index].counters_frame = Some(frame);
    }

    /// Record the copies into slot `index`.
    pub fn record(
        &mut self,
        index: usize,
        encoder: &mut wgpu::CommandEncoder,
        counters: &wgpu::Buffer,
        detonations: &wgpu::Buffer,
    ) {
        let capacity = self.detonation_capacity;
        let slot = &mut self.slots[index];
        if slot.counters_frame.is_some() {
            encoder.copy_buffer_to_buffer(counters, 0, &slot.buffer, 0, COUNTERS_SIZE);
        }
        if capacity > 0 {
            encoder.copy_buffer_to_buffer(
                detonations,
                0,
                &slot.buffer,
                COUNTERS_SIZE,
                detonation_block_size(capacity),
            );
            slot.has_detonations = true;
        }
    }

    /// Start mapping slot `index`. Call after the copies were submitted.
    pub fn submit(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        let status = slot.status.clone();
        slot.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let value = if result.is_ok() { MAP_READY } else { MAP_FAILED };
                status.store(value, Ordering::Release);
            });
        slot.state = SlotState::InFlight;
        self.in_flight.push_back(index);
    }

    /// Hand every finished slot to `f`, oldest first. Stops at the first slot
    /// still waiting so results arrive in submission order.
    pub fn harvest(&mut self, mut f: impl FnMut(Readback)) {
        while let Some(&index) = self.in_flight.front() {
            let slot = &mut self.slots[index];
            match slot.status.load(Ordering::Acquire) {
                MAP_PENDING => break,
                MAP_READY => {
                    let readback = read_slot(slot, self.detonation_capacity);
                    slot.buffer.unmap();
                    f(readback);
                }
                _ => tracing::warn!("particle readback slot {} failed to map", index),
            }
            slot.state = SlotState::Idle;
            self.in_flight.pop_front();
        }
    }

    /// Slots mapped or waiting to be.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

fn read_slot(slot: &Slot, detonation_capacity: u32) -> Readback {
    let data = slot.buffer.slice(..).get_mapped_range();

    let counters = slot.counters_frame.map(|frame| {
        let raw: [KindCounterRaw; LIVE_KIND_COUNT] =
            std::array::from_fn(|i| read_at(&data, i * std::mem::size_of::<KindCounterRaw>()));
        (frame, raw)
    });

    let detonations = if slot.has_detonations {
        decode_detonations(&data[COUNTERS_SIZE as usize..], detonation_capacity)
    } else {
        Vec::new()
    };

    Readback {
        counters,
        detonations,
    }
}

/// Events in a detonation block, clamped to what the block can hold.
pub fn decode_detonations(block: &[u8], capacity: u32) -> Vec<DetonationEvent> {
    let header: DetonationHeader = read_at(block, 0);
    let count = header.count.min(capacity) as usize;
    let stride = std::mem::size_of::<DetonationEvent>();
    (0..count)
        .map(|i| read_at(block, DETONATION_HEADER_SIZE as usize + i * stride))
        .collect()
}

fn read_at<T: bytemuck::Pod>(bytes: &[u8], offset: usize) -> T {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + std::mem::size_of::<T>()])
}
