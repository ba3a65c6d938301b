// fbp-value: the tagged-union value type and shared error kinds for the
// fitterbap messaging fabric.
//
// Every other crate in the workspace (fbp-topic, fbp-pubsub, fbp-fsm,
// fbp-port) depends on this one for `Value`, `ValueFlags`/`SubscriberFlags`,
// and the shared `FbpError` enum.

mod error;
mod flags;
mod value;

pub use error::{FbpError, Result};
pub use flags::{SubscriberFlags, ValueFlags};
pub use value::{Bytes, Value, ValueData};
