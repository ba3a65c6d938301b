//! Shared test scaffolding: an in-memory transport pair for wiring two
//! ports together without a socket.

pub mod mock_transport;

pub use mock_transport::{channel, MockTransport};
