//! Bounded lock-free append list
//!
//! One per live kind. Appenders bump a shared cursor with `fetch_add` and
//! write only when the returned index is inside the budget; the cursor keeps
//! counting past the budget so `attempted - len` is the number of drops.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct AppendList {
    slots: Box<[AtomicU32]>,
    cursor: AtomicU32,
}

impl AppendList {
    pub fn with_budget(budget: u32) -> Self {
        let slots = (0..budget).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            cursor: AtomicU32::new(0),
        }
    }

    pub fn budget(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Truncate the list. Takes `&mut self` so no append can be in flight.
    pub fn reset(&mut self) {
        *self.cursor.get_mut() = 0;
    }

    /// Append `value`. Returns false when the list is full; the attempt is
    /// still counted.
    pub fn push(&self, value: u32) -> bool {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        match self.slots.get(i as usize) {
            Some(slot) => {
                slot.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Appends attempted since the last reset.
    pub fn attempted(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Entries actually stored: `min(attempted, budget)`.
    pub fn len(&self) -> u32 {
        self.attempted().min(self.budget())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u32 {
        self.attempted() - self.len()
    }

    /// Snapshot of the stored entries, in append order.
    pub fn to_vec(&self) -> Vec<u32> {
        self.slots[..self.len() as usize]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }
}

impl std::fmt::Debug for AppendList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendList")
            .field("budget", &self.budget())
            .field("attempted", &self.attempted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_caps_at_budget() {
        let list = AppendList::with_budget(3);
        let stored: Vec<bool> = (0..5).map(|i| list.push(i)).collect();
        assert_eq!(stored, vec![true, true, true, false, false]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.attempted(), 5);
        assert_eq!(list.dropped(), 2);
        assert_eq!(list.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reset_truncates() {
        let mut list = AppendList::with_budget(4);
        for i in 0..6 {
            list.push(i);
        }
        list.reset();
        assert!(list.is_empty());
        assert_eq!(list.dropped(), 0);
        list.push(9);
        assert_eq!(list.to_vec(), vec![9]);
    }

    #[test]
    fn test_zero_budget_drops_everything() {
        let list = AppendList::with_budget(0);
        assert!(!list.push(1));
        assert_eq!(list.len(), 0);
        assert_eq!(list.dropped(), 1);
    }

    #[test]
    fn test_parallel_appends_store_each_value_once() {
        let list = AppendList::with_budget(10_000);
        (0..25_000u32).into_par_iter().for_each(|i| {
            list.push(i);
        });
        assert_eq!(list.len(), 10_000);
        assert_eq!(list.dropped(), 15_000);

        let mut stored = list.to_vec();
        stored.sort_unstable();
        stored.dedup();
        assert_eq!(stored.len(), 10_000);
        assert!(stored.iter().all(|&v| v < 25_000));
    }
}
