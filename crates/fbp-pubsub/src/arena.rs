//! Bookkeeping for the bounded ring arena backing non-const variable-length
//! publishes.
//!
//! The payload itself is already safe to share (`Arc<str>`/`Arc<[u8]>`); what
//! this tracks is the spec's resource budget — how many bytes of
//! "arena-owned" payload are outstanding between publish and retirement, so
//! a slow consumer can't let an unbounded backlog build up.

use std::collections::VecDeque;

use fbp_value::{FbpError, Result};

pub struct Arena {
    capacity: usize,
    used: usize,
    entries: VecDeque<(u64, usize)>,
    next_id: u64,
}

impl Arena {
    #[must_use]
    pub fn new(capacity: usize) -> Arena {
        Arena {
            capacity,
            used: 0,
            entries: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Reserve `size` bytes for a pending non-const publish. A single entry
    /// may not exceed half the arena.
    pub fn reserve(&mut self, size: usize) -> Result<u64> {
        if size > self.capacity / 2 {
            return Err(FbpError::TooBig(format!(
                "payload of {size} bytes exceeds half the {}-byte arena",
                self.capacity
            )));
        }
        if self.used + size > self.capacity {
            return Err(FbpError::NotEnoughMemory(format!(
                "arena has {} bytes free, need {size}",
                self.capacity - self.used
            )));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back((id, size));
        self.used += size;
        Ok(id)
    }

    /// Retire the given reservation. It must be the oldest outstanding one —
    /// anything else means arena bookkeeping has drifted from the message
    /// queue, a fatal invariant violation.
    ///
    /// # Panics
    /// Panics if the arena has nothing outstanding, or if `id` is not the
    /// FIFO head.
    pub fn retire(&mut self, id: u64) {
        let (front_id, size) = self
            .entries
            .pop_front()
            .expect("arena retire called with nothing outstanding (fatal invariant violation)");
        assert_eq!(
            front_id, id,
            "arena desync: retiring {id} but FIFO head is {front_id} (fatal invariant violation)"
        );
        self.used -= size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_retire_round_trip() {
        let mut a = Arena::new(100);
        let id = a.reserve(10).unwrap();
        assert_eq!(a.used, 10);
        a.retire(id);
        assert_eq!(a.used, 0);
    }

    #[test]
    fn reserve_over_half_capacity_is_too_big() {
        let mut a = Arena::new(100);
        assert!(matches!(a.reserve(51), Err(FbpError::TooBig(_))));
        assert!(a.reserve(50).is_ok());
    }

    #[test]
    fn reserve_beyond_remaining_capacity_is_not_enough_memory() {
        let mut a = Arena::new(100);
        a.reserve(50).unwrap();
        assert!(matches!(a.reserve(40), Err(FbpError::NotEnoughMemory(_))));
    }

    #[test]
    #[should_panic(expected = "desync")]
    fn retiring_out_of_order_panics() {
        let mut a = Arena::new(100);
        let first = a.reserve(10).unwrap();
        let second = a.reserve(10).unwrap();
        let _ = first;
        a.retire(second);
    }
}
