//! Rotating staging regions for CPU-built particle records
//!
//! Region `i` is handed out again only after the other `depth - 1` regions
//! have been, which gives the device that many submissions to finish copying
//! out of it before the CPU writes it again.

use crate::error::EngineError;

#[derive(Debug)]
pub struct UploadRing<R> {
    regions: Vec<R>,
    next: usize,
}

impl<R> UploadRing<R> {
    pub fn from_fn(depth: usize, mut make: impl FnMut(usize) -> R) -> Result<Self, EngineError> {
        if depth < 2 {
            return Err(EngineError::RingTooShallow(depth));
        }
        Ok(Self {
            regions: (0..depth).map(&mut make).collect(),
            next: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.regions.len()
    }

    /// Next region in `i mod depth` order, with its index.
    pub fn next_region(&mut self) -> (usize, &mut R) {
        let index = self.next;
        self.next = (self.next + 1) % self.regions.len();
        (index, &mut self.regions[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let mut ring = UploadRing::from_fn(3, |i| i * 10).unwrap();
        let order: Vec<usize> = (0..7).map(|_| ring.next_region().0).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_no_region_repeats_within_a_rotation() {
        let mut ring = UploadRing::from_fn(4, |_| Vec::<u32>::new()).unwrap();
        for start in 0..8 {
            let window: Vec<usize> = (0..ring.depth()).map(|_| ring.next_region().0).collect();
            let mut sorted = window.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), ring.depth(), "rotation {start}");
        }
    }

    #[test]
    fn test_regions_keep_their_contents() {
        let mut ring = UploadRing::from_fn(2, |_| Vec::new()).unwrap();
        ring.next_region().1.push(1u8);
        ring.next_region().1.push(2u8);
        let (idx, region) = ring.next_region();
        assert_eq!(idx, 0);
        assert_eq!(region, &vec![1u8]);
    }

    #[test]
    fn test_depth_must_be_at_least_two() {
        assert!(UploadRing::from_fn(1, |_| ()).is_err());
    }
}
