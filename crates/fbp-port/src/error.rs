use thiserror::Error;

use crate::wire::WireError;

/// Caller-visible errors from the port layer. Malformed wire messages are
/// not represented here — they are logged and dropped (§7), never returned.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("wire codec error: {0}")]
    Codec(#[from] WireError),
    #[error(transparent)]
    Fbp(#[from] fbp_value::FbpError),
    #[error("port is not connected")]
    NotConnected,
}
