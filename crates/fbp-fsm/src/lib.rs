//! fbp-fsm: a generic priority-ordered transition-table executor.
//!
//! `Fsm<C>` drives a caller-supplied context `C` through a state table and a
//! transition table, dispatching events through a bounded re-entrant queue.
//! It has no knowledge of topics, values, or wire framing — those live in
//! fbp-topic, fbp-pubsub, and fbp-port, which build on top of this.

mod error;
mod fsm;
mod ids;
mod ring;
mod table;

pub use error::FsmError;
pub use fsm::Fsm;
pub use ids::{EventId, StateId};
pub use table::{HandlerOutcome, StateHandler, StateNode, Transition, TransitionHandler};
