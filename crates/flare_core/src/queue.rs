//! Per-frame spawn batch
//!
//! Requests are flattened into `SpawnRecord`s plus one shared direction list.
//! Each record carries the exclusive prefix of item counts before it, so a
//! flat task id `t` belongs to the last record with `item_offset <= t`.

use crate::error::Rejection;
use crate::request::{SpawnRecord, SpawnRequest};

#[derive(Debug, Default)]
pub struct SpawnQueue {
    records: Vec<SpawnRecord>,
    /// xyz direction, w unused; vec4 rows keep the WGSL array stride simple.
    directions: Vec<[f32; 4]>,
    total_items: u32,
}

impl SpawnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a request. Returns the number of particles it
    /// will write. On error the queue is untouched.
    pub fn push(&mut self, request: &SpawnRequest, capacity: u32) -> Result<u32, Rejection> {
        request.validate(capacity)?;

        let count = request.count();
        // Requests may overlap, so the item total is not bounded by capacity.
        let total_items = self
            .total_items
            .checked_add(count)
            .ok_or(Rejection::NoRoom {
                start: u64::from(request.particle_start()),
                end: u64::from(request.particle_start()) + u64::from(count),
                capacity,
            })?;

        let mut record = request.encode();
        record.item_offset = self.total_items;
        if !request.directions().is_empty() {
            record.dir_start = self.directions.len() as u32;
            self.directions.extend(
                request
                    .directions()
                    .iter()
                    .map(|d| d.normalize().extend(0.0).to_array()),
            );
        }

        self.records.push(record);
        self.total_items = total_items;
        Ok(count)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.directions.clear();
        self.total_items = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn batch(&self) -> SpawnBatch<'_> {
        SpawnBatch {
            records: &self.records,
            directions: &self.directions,
            total_items: self.total_items,
        }
    }
}

/// Borrowed view of a queue, handed to a device for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SpawnBatch<'a> {
    pub records: &'a [SpawnRecord],
    pub directions: &'a [[f32; 4]],
    pub total_items: u32,
}

impl<'a> SpawnBatch<'a> {
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    /// Map a flat task id to `(record index, item within record)`.
    pub fn locate(&self, task: u32) -> Option<(usize, u32)> {
        if task >= self.total_items {
            return None;
        }
        let idx = self
            .records
            .partition_point(|rec| rec.item_offset <= task)
            .checked_sub(1)?;
        Some((idx, task - self.records[idx].item_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ConeBurst, DirectionalBurst, SmokePuff};
    use glam::Vec3;

    #[test]
    fn test_prefix_offsets_and_lookup() {
        let mut queue = SpawnQueue::new();
        queue
            .push(&ConeBurst { count: 3, ..Default::default() }.into(), 100)
            .unwrap();
        queue
            .push(
                &DirectionalBurst {
                    particle_start: 10,
                    directions: vec![Vec3::X, Vec3::Y],
                    ..Default::default()
                }
                .into(),
                100,
            )
            .unwrap();
        queue
            .push(&SmokePuff { particle_start: 20, count: 4, ..Default::default() }.into(), 100)
            .unwrap();

        let batch = queue.batch();
        assert_eq!(batch.total_items, 9);
        assert_eq!(batch.records[1].item_offset, 3);
        assert_eq!(batch.records[2].item_offset, 5);
        assert_eq!(batch.records[1].dir_start, 0);
        assert_eq!(batch.records[1].dir_count, 2);
        assert_eq!(batch.directions.len(), 2);

        assert_eq!(batch.locate(0), Some((0, 0)));
        assert_eq!(batch.locate(2), Some((0, 2)));
        assert_eq!(batch.locate(3), Some((1, 0)));
        assert_eq!(batch.locate(4), Some((1, 1)));
        assert_eq!(batch.locate(8), Some((2, 3)));
        assert_eq!(batch.locate(9), None);
    }

    #[test]
    fn test_rejected_push_leaves_queue_untouched() {
        let mut queue = SpawnQueue::new();
        let err = queue.push(&ConeBurst { count: 0, ..Default::default() }.into(), 100);
        assert_eq!(err, Err(Rejection::Degenerate));
        let err = queue.push(
            &ConeBurst { particle_start: 99, count: 2, ..Default::default() }.into(),
            100,
        );
        assert!(matches!(err, Err(Rejection::NoRoom { .. })));
        assert!(queue.is_empty());
        assert_eq!(queue.total_items(), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut queue = SpawnQueue::new();
        queue
            .push(
                &DirectionalBurst { directions: vec![Vec3::Z], ..Default::default() }.into(),
                10,
            )
            .unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.batch().directions.is_empty());
        assert!(queue.batch().is_empty());
    }
}
