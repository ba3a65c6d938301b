//! The transport abstraction the port sends and receives framed messages
//! through. External collaborator per the spec's scope — only the
//! interface matters here; `fbp-test-support` supplies an in-memory
//! implementation for tests.

/// A single-port byte-message transport. Delivers whole `port_data`+payload
/// units; framing, CRC, and retransmit live below this interface.
pub trait Transport {
    /// Attempt to send one message. Returns `false` if the transport is
    /// momentarily full (caller arms a retry `Tick` per the protocol's
    /// timeout/tick rules) rather than blocking.
    fn send(&mut self, port_data: u8, bytes: &[u8]) -> bool;

    /// Non-blocking receive of the next queued message, if any.
    fn try_recv(&mut self) -> Option<(u8, Vec<u8>)>;
}
