//! Read-only port telemetry, mirroring a forwarder's stream-counter struct.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnects: u64,
    pub last_resolution_was_client: Option<bool>,
}
