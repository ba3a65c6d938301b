//! fbp-pubsub: the hierarchical retained-value publish/subscribe engine.
//!
//! Builds on `fbp-topic`'s arena-backed tree to add dedup, metadata/error
//! dispatch, topic ownership, and the deferred publish queue + payload
//! arena described in the engine's design.

mod arena;
mod engine;
mod topic_list;

pub use engine::{PubsubEngine, Sink};
pub use topic_list::{decode as decode_topic_list, encode as encode_topic_list};
