//! fbp-topic: the hierarchical topic tree.
//!
//! Arena-backed (stable [`TopicId`] handles, not intrusive pointers), this
//! crate owns tree structure, retained values, metadata, and subscriber
//! bookkeeping. It knows nothing about dispatch semantics, dedup, or wire
//! framing — that's fbp-pubsub and fbp-port.

mod path;
mod tree;

pub use path::{classify, segments, Suffix, MAX_PATH_LEN, MAX_SEGMENT_LEN, RESERVED_CHARS};
pub use tree::{SubscriberId, TopicId, Tree};
