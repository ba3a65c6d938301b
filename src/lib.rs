//! Fitterbap: an embedded-style pub/sub messaging fabric with a wire
//! protocol for synchronizing two engines across a transport.
//!
//! This crate re-exports the workspace members that do the actual work —
//! [`fbp_value`], [`fbp_topic`], [`fbp_pubsub`], [`fbp_fsm`], and
//! [`fbp_port`] — plus the demo binary's config loader.

pub mod config;

pub use fbp_fsm::{EventId, Fsm, FsmError, HandlerOutcome, StateId};
pub use fbp_port::{Port, PortError, PortStats, Role, Transport};
pub use fbp_pubsub::{PubsubEngine, Sink};
pub use fbp_topic::{SubscriberId, TopicId};
pub use fbp_value::{FbpError, SubscriberFlags, Value, ValueData, ValueFlags};
