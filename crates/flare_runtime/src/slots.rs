//! Wrap-around slot allocation for the demo show
//!
//! Ranges are handed out front to back and the cursor wraps to zero when
//! the next request would run off the end, overwriting the oldest particles.

#[derive(Debug, Clone)]
pub struct SlotAllocator {
    capacity: u32,
    next: u32,
    wraps: u64,
}

impl SlotAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            wraps: 0,
        }
    }

    /// First slot of a fresh `count`-slot range, or `None` if it can never fit.
    pub fn alloc(&mut self, count: u32) -> Option<u32> {
        if count == 0 || count > self.capacity {
            return None;
        }
        if u64::from(self.next) + u64::from(count) > u64::from(self.capacity) {
            self.next = 0;
            self.wraps += 1;
        }
        let start = self.next;
        self.next += count;
        Some(start)
    }

    pub fn wraps(&self) -> u64 {
        self.wraps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_stay_inside_capacity() {
        let mut slots = SlotAllocator::new(100);
        assert_eq!(slots.alloc(40), Some(0));
        assert_eq!(slots.alloc(40), Some(40));
        // 80 + 40 would overrun, so the cursor wraps.
        assert_eq!(slots.alloc(40), Some(0));
        assert_eq!(slots.wraps(), 1);
        assert_eq!(slots.alloc(60), Some(40));
        assert_eq!(slots.alloc(1), Some(0));
    }

    #[test]
    fn test_impossible_requests() {
        let mut slots = SlotAllocator::new(10);
        assert_eq!(slots.alloc(0), None);
        assert_eq!(slots.alloc(11), None);
        assert_eq!(slots.alloc(10), Some(0));
    }
}
