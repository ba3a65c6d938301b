//! Wire protocol and connection state machine for linking two
//! [`fbp_pubsub::PubsubEngine`]s across a byte transport.

mod ctx;
mod error;
mod fsm_def;
mod port;
mod stats;
mod transport;
mod wire;

pub use error::PortError;
pub use port::{Port, Role};
pub use stats::PortStats;
pub use transport::Transport;
pub use wire::{Connected, Message, Negotiate, Resolution, WireError};
