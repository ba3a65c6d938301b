//! State and event identifiers used by the transition table.

/// The executor's current state.
///
/// `Null` is the state before the first [`crate::Fsm::reset`]; `Any` is only
/// meaningful inside a transition's `current` field, where it matches every
/// state (including `Null`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Null,
    Any,
    Id(u16),
}

impl StateId {
    #[must_use]
    pub fn matches(self, current: StateId) -> bool {
        self == StateId::Any || self == current
    }
}

/// An event delivered to the executor.
///
/// `Enter`/`Exit`/`Reset` are synthesized by the executor itself; `Any` is
/// only meaningful inside a transition's `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    Any,
    Enter,
    Exit,
    Reset,
    User(u16),
}

impl EventId {
    #[must_use]
    pub fn matches(self, fired: EventId) -> bool {
        self == EventId::Any || self == fired
    }
}
