//! Caller-visible error kinds shared by every layer of the fabric.
//!
//! Invariant breaches (ring overflow, arena desync) are not modeled here —
//! they are fatal by design and surface as a panic, not a `Result`.

use thiserror::Error;

/// Errors returned to callers of the pubsub engine, topic tree, and port.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FbpError {
    /// API validation failed; no state was changed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Payload or topic path exceeds a configured bound.
    #[error("too big: {0}")]
    TooBig(String),

    /// The payload arena has no room; caller may retry after `process()`.
    #[error("not enough memory: {0}")]
    NotEnoughMemory(String),

    /// `unsubscribe`/`query` referenced a topic or subscriber that doesn't exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A malformed wire message was dropped; the FSM state is unchanged.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A handshake timer expired; the port FSM returns to negotiation.
    #[error("peer timeout: {0}")]
    PeerTimeout(String),
}

pub type Result<T> = std::result::Result<T, FbpError>;
