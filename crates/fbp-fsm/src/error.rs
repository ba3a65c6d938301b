use thiserror::Error;

/// Errors raised while building an [`crate::Fsm`].
///
/// Runtime invariant breaches (ring overflow, a handler overriding to an
/// out-of-range state) are not represented here — they panic, per the
/// embedded assert-and-halt convention.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FsmError {
    #[error("invalid transition table: {0}")]
    InvalidTable(String),
}
