//! Transition table and state table types.

use crate::ids::{EventId, StateId};

/// What a transition handler decides once called.
///
/// Mirrors the legacy table's overloaded `StateId` return values
/// (`Null`/`Any`/`Skip`/other) as a proper enum rather than reusing
/// sentinel `StateId`s for double duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Matched; remain in the current state. No `on_enter`/`on_exit` runs.
    Remain,
    /// Take the transition exactly as declared (to `next`).
    Take,
    /// Do not take this transition; keep scanning for the next match.
    Skip,
    /// Override: transition to this state instead of the declared `next`.
    GoTo(StateId),
}

/// A handler invoked on a transition or a state's enter/exit.
///
/// Boxed so the table can mix closures and plain function pointers; `C` is
/// the caller-supplied context threaded through every call (the port's FSM
/// context, for instance).
pub type TransitionHandler<C> = Box<dyn FnMut(&mut C, EventId) -> HandlerOutcome>;
pub type StateHandler<C> = Box<dyn FnMut(&mut C, EventId)>;

/// One row of the priority-ordered transition table.
pub struct Transition<C> {
    pub current: StateId,
    pub next: StateId,
    pub event: EventId,
    pub handler: Option<TransitionHandler<C>>,
}

impl<C> Transition<C> {
    #[must_use]
    pub fn new(current: StateId, next: StateId, event: EventId) -> Transition<C> {
        Transition {
            current,
            next,
            event,
            handler: None,
        }
    }

    #[must_use]
    pub fn with_handler(
        current: StateId,
        next: StateId,
        event: EventId,
        handler: TransitionHandler<C>,
    ) -> Transition<C> {
        Transition {
            current,
            next,
            event,
            handler: Some(handler),
        }
    }
}

/// One entry of the state table, addressed by its position: the entry at
/// index `i` describes `StateId::Id(i as u16)`.
#[derive(Default)]
pub struct StateNode<C> {
    pub on_enter: Option<StateHandler<C>>,
    pub on_exit: Option<StateHandler<C>>,
}

impl<C> StateNode<C> {
    #[must_use]
    pub fn new() -> StateNode<C> {
        StateNode {
            on_enter: None,
            on_exit: None,
        }
    }

    #[must_use]
    pub fn on_enter(mut self, h: StateHandler<C>) -> StateNode<C> {
        self.on_enter = Some(h);
        self
    }

    #[must_use]
    pub fn on_exit(mut self, h: StateHandler<C>) -> StateNode<C> {
        self.on_exit = Some(h);
        self
    }
}

/// Validate that every concrete `StateId::Id` referenced by the transition
/// table's `next` field (and `current`, when concrete) indexes within
/// `states`. Run once at construction, per the spec's Design Notes.
pub(crate) fn validate<C>(
    transitions: &[Transition<C>],
    states: &[StateNode<C>],
) -> Result<(), crate::FsmError> {
    if states.is_empty() {
        return Err(crate::FsmError::InvalidTable(
            "state table must have at least one state".into(),
        ));
    }
    if transitions.is_empty() {
        return Err(crate::FsmError::InvalidTable(
            "transition table must have at least one transition".into(),
        ));
    }
    for (i, t) in transitions.iter().enumerate() {
        if let StateId::Id(id) = t.current {
            if id as usize >= states.len() {
                return Err(crate::FsmError::InvalidTable(format!(
                    "transition[{i}].current references out-of-range state {id}"
                )));
            }
        }
        match t.next {
            StateId::Id(id) if (id as usize) < states.len() => {}
            StateId::Id(id) => {
                return Err(crate::FsmError::InvalidTable(format!(
                    "transition[{i}].next references out-of-range state {id}"
                )));
            }
            StateId::Any | StateId::Null => {
                return Err(crate::FsmError::InvalidTable(format!(
                    "transition[{i}].next must be a concrete state, not Any/Null"
                )));
            }
        }
    }
    Ok(())
}
