//! An in-memory, synchronous stand-in for a real byte transport — lets
//! tests wire two [`fbp_port::Port`]s together without a socket, mirroring
//! the paired mock client/server the teacher keeps for its own integration
//! tests.

use std::collections::VecDeque;
use std::sync::Arc;

use fbp_port::Transport;
use parking_lot::Mutex;

type Frame = (u8, Vec<u8>);

/// One end of a pair of in-memory transports. `send` pushes onto the
/// peer's inbox; `try_recv` pops this side's own inbox. Pair two with
/// [`channel`].
pub struct MockTransport {
    inbox: Arc<Mutex<VecDeque<Frame>>>,
    outbox: Arc<Mutex<VecDeque<Frame>>>,
    /// When `true`, every `send` reports failure without enqueueing — used
    /// to exercise the port's stall/retry-tick path.
    pub drop_sends: bool,
    /// Drop exactly this many of the next `send` calls (decremented on
    /// each, regardless of `drop_sends`), then stop dropping. Lets a test
    /// fail one specific send — e.g. a negotiation reply — and recover
    /// without the caller needing a handle back into an already-moved
    /// transport.
    pub drop_next_sends: usize,
}

/// Build a connected pair: whatever `a` sends, `b` receives, and vice
/// versa.
#[must_use]
pub fn channel() -> (MockTransport, MockTransport) {
    let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
    let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
    (
        MockTransport {
            inbox: b_to_a.clone(),
            outbox: a_to_b.clone(),
            drop_sends: false,
            drop_next_sends: 0,
        },
        MockTransport {
            inbox: a_to_b,
            outbox: b_to_a,
            drop_sends: false,
            drop_next_sends: 0,
        },
    )
}

impl Transport for MockTransport {
    fn send(&mut self, port_data: u8, bytes: &[u8]) -> bool {
        if self.drop_next_sends > 0 {
            self.drop_next_sends -= 1;
            return false;
        }
        if self.drop_sends {
            return false;
        }
        self.outbox.lock().push_back((port_data, bytes.to_vec()));
        true
    }

    fn try_recv(&mut self) -> Option<(u8, Vec<u8>)> {
        self.inbox.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_cross_from_a_to_b() {
        let (mut a, mut b) = channel();
        assert!(a.send(4, &[1, 2, 3]));
        assert_eq!(b.try_recv(), Some((4, vec![1, 2, 3])));
        assert_eq!(b.try_recv(), None);
    }

    #[test]
    fn messages_cross_both_ways_independently() {
        let (mut a, mut b) = channel();
        a.send(1, &[9]);
        b.send(2, &[8]);
        assert_eq!(b.try_recv(), Some((1, vec![9])));
        assert_eq!(a.try_recv(), Some((2, vec![8])));
    }

    #[test]
    fn drop_sends_reports_failure_without_delivering() {
        let (mut a, mut b) = channel();
        a.drop_sends = true;
        assert!(!a.send(4, &[1]));
        assert_eq!(b.try_recv(), None);
    }

    #[test]
    fn drop_next_sends_recovers_after_the_count_runs_out() {
        let (mut a, mut b) = channel();
        a.drop_next_sends = 1;
        assert!(!a.send(4, &[1]));
        assert!(a.send(4, &[2]));
        assert_eq!(b.try_recv(), Some((4, vec![2])));
    }
}
