//! A bounded, power-of-two-sized FIFO ring for re-entrant event emission.
//!
//! Handlers called from inside [`crate::Fsm::event`] may themselves call
//! `event()`; those events are queued here rather than dispatched
//! recursively. Overflow is a fatal invariant violation — the embedded
//! convention is assert-and-halt, not a recoverable error.

use crate::ids::EventId;

pub struct EventRing {
    buf: Vec<Option<EventId>>,
    mask: usize,
    head: usize,
    len: usize,
}

impl EventRing {
    /// `capacity` must be a power of two (the default executor uses 8).
    ///
    /// # Panics
    /// Panics if `capacity` is zero or not a power of two.
    #[must_use]
    pub fn new(capacity: usize) -> EventRing {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "fsm event ring capacity must be a nonzero power of two, got {capacity}"
        );
        EventRing {
            buf: vec![None; capacity],
            mask: capacity - 1,
            head: 0,
            len: 0,
        }
    }

    /// # Panics
    /// Panics on overflow (`FsmInvariantViolation`): the ring is full and a
    /// new event was pushed anyway.
    pub fn push(&mut self, e: EventId) {
        assert!(
            self.len < self.buf.len(),
            "fsm event ring overflow: capacity {} exceeded (fatal invariant violation)",
            self.buf.len()
        );
        let tail = (self.head + self.len) & self.mask;
        self.buf[tail] = Some(e);
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<EventId> {
        if self.len == 0 {
            return None;
        }
        let e = self.buf[self.head].take();
        self.head = (self.head + 1) & self.mask;
        self.len -= 1;
        e
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
