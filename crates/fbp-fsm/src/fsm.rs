//! The generic priority-ordered transition-table executor.

use crate::ids::{EventId, StateId};
use crate::ring::EventRing;
use crate::table::{HandlerOutcome, StateNode, Transition, validate};
use crate::FsmError;

const DEFAULT_RING_CAPACITY: usize = 8;

/// A transition-table state machine over caller context `C`.
///
/// Construct with [`Fsm::new`], drive it with [`Fsm::event`], and call
/// [`Fsm::reset`] to enter the initial state (before the first `reset()`
/// the executor reports [`StateId::Null`]).
pub struct Fsm<C> {
    state: StateId,
    transitions: Vec<Transition<C>>,
    states: Vec<StateNode<C>>,
    queue: EventRing,
    reentrant: bool,
}

impl<C> Fsm<C> {
    /// Build an executor from a priority-ordered transition table and a
    /// state table. Validates that every concrete state reference is
    /// in-range; see [`FsmError::InvalidTable`].
    pub fn new(
        transitions: Vec<Transition<C>>,
        states: Vec<StateNode<C>>,
    ) -> Result<Fsm<C>, FsmError> {
        Self::with_ring_capacity(transitions, states, DEFAULT_RING_CAPACITY)
    }

    pub fn with_ring_capacity(
        transitions: Vec<Transition<C>>,
        states: Vec<StateNode<C>>,
        ring_capacity: usize,
    ) -> Result<Fsm<C>, FsmError> {
        validate(&transitions, &states)?;
        Ok(Fsm {
            state: StateId::Null,
            transitions,
            states,
            queue: EventRing::new(ring_capacity),
            reentrant: false,
        })
    }

    #[must_use]
    pub fn state(&self) -> StateId {
        self.state
    }

    /// Emit a synthetic `Reset` event. Before the first call the state is
    /// `Null`; a well-formed table has an `(Any, Reset)` transition that
    /// moves the executor into its real initial state.
    pub fn reset(&mut self, ctx: &mut C) {
        self.event(ctx, EventId::Reset);
    }

    /// Deliver one event to the executor.
    ///
    /// If a handler higher on the stack is already draining the queue,
    /// this just enqueues `e` and returns — the outer call drains it.
    /// Otherwise this call drains the queue FIFO until empty, which may
    /// itself enqueue further events from `on_enter`/`on_exit`/transition
    /// handlers; those are processed before this call returns.
    ///
    /// # Panics
    /// Panics if the event ring overflows — a fatal invariant violation.
    pub fn event(&mut self, ctx: &mut C, e: EventId) {
        self.queue.push(e);
        if self.reentrant {
            return;
        }
        self.reentrant = true;
        while let Some(ev) = self.queue.pop() {
            self.dispatch(ctx, ev);
        }
        self.reentrant = false;
    }

    fn dispatch(&mut self, ctx: &mut C, ev: EventId) {
        let mut i = 0;
        while i < self.transitions.len() {
            let current = self.state;
            let matches = {
                let t = &self.transitions[i];
                t.current.matches(current) && t.event.matches(ev)
            };
            if !matches {
                i += 1;
                continue;
            }

            let outcome = if self.transitions[i].handler.is_some() {
                let mut handler = self.transitions[i].handler.take().unwrap();
                let outcome = handler(ctx, ev);
                self.transitions[i].handler = Some(handler);
                outcome
            } else {
                HandlerOutcome::Take
            };

            match outcome {
                HandlerOutcome::Remain => return,
                HandlerOutcome::Skip => {
                    i += 1;
                    continue;
                }
                HandlerOutcome::Take => {
                    let next = self.transitions[i].next;
                    self.transition_to(ctx, next);
                    return;
                }
                HandlerOutcome::GoTo(next) => {
                    assert!(
                        matches!(next, StateId::Id(id) if (id as usize) < self.states.len()),
                        "fsm handler overrode to out-of-range state {next:?} (fatal invariant violation)"
                    );
                    self.transition_to(ctx, next);
                    return;
                }
            }
        }
        // No transition matched `ev` from `current` — dropped, not an error.
    }

    fn transition_to(&mut self, ctx: &mut C, next: StateId) {
        if let StateId::Id(id) = self.state {
            if let Some(handler) = self.states[id as usize].on_exit.as_mut() {
                handler(ctx, EventId::Exit);
            }
        }
        self.state = next;
        if let StateId::Id(id) = next {
            if let Some(handler) = self.states[id as usize].on_enter.as_mut() {
                handler(ctx, EventId::Enter);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Transition;

    #[derive(Default)]
    struct Ctx {
        enters: Vec<StateId>,
        exits: Vec<StateId>,
        skip_calls: u32,
    }

    fn state_a() -> StateId {
        StateId::Id(0)
    }
    fn state_b() -> StateId {
        StateId::Id(1)
    }
    fn state_c() -> StateId {
        StateId::Id(2)
    }

    fn counting_state_node(id: StateId) -> StateNode<Ctx> {
        StateNode::new()
            .on_enter(Box::new(move |ctx: &mut Ctx, _| ctx.enters.push(id)))
            .on_exit(Box::new(move |ctx: &mut Ctx, _| ctx.exits.push(id)))
    }

    #[test]
    fn reset_drives_any_reset_transition_and_calls_on_enter_once() {
        let transitions = vec![Transition::new(StateId::Any, state_a(), EventId::Reset)];
        let states = vec![
            counting_state_node(state_a()),
            counting_state_node(state_b()),
        ];
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        assert_eq!(fsm.state(), StateId::Null);
        fsm.reset(&mut ctx);
        assert_eq!(fsm.state(), state_a());
        assert_eq!(ctx.enters, vec![state_a()]);
        assert!(ctx.exits.is_empty(), "Null has no state node to exit");
    }

    #[test]
    fn skip_outcome_continues_scanning_to_next_matching_transition() {
        let transitions = vec![
            Transition::with_handler(
                state_a(),
                state_b(),
                EventId::User(1),
                Box::new(|ctx: &mut Ctx, _| {
                    ctx.skip_calls += 1;
                    HandlerOutcome::Skip
                }),
            ),
            Transition::new(state_a(), state_c(), EventId::User(1)),
            Transition::new(StateId::Any, state_a(), EventId::Reset),
        ];
        let states = vec![
            counting_state_node(state_a()),
            counting_state_node(state_b()),
            counting_state_node(state_c()),
        ];
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        fsm.reset(&mut ctx);
        fsm.event(&mut ctx, EventId::User(1));
        assert_eq!(fsm.state(), state_c());
        assert_eq!(ctx.skip_calls, 1);
    }

    #[test]
    fn remain_outcome_does_not_transition() {
        let transitions = vec![
            Transition::with_handler(
                state_a(),
                state_b(),
                EventId::User(7),
                Box::new(|_: &mut Ctx, _| HandlerOutcome::Remain),
            ),
            Transition::new(StateId::Any, state_a(), EventId::Reset),
        ];
        let states = vec![counting_state_node(state_a()), counting_state_node(state_b())];
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        fsm.reset(&mut ctx);
        fsm.event(&mut ctx, EventId::User(7));
        assert_eq!(fsm.state(), state_a());
    }

    #[test]
    fn goto_outcome_overrides_declared_next() {
        let transitions = vec![
            Transition::with_handler(
                state_a(),
                state_b(),
                EventId::User(1),
                Box::new(|_: &mut Ctx, _| HandlerOutcome::GoTo(state_c())),
            ),
            Transition::new(StateId::Any, state_a(), EventId::Reset),
        ];
        let states = vec![
            counting_state_node(state_a()),
            counting_state_node(state_b()),
            counting_state_node(state_c()),
        ];
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        fsm.reset(&mut ctx);
        fsm.event(&mut ctx, EventId::User(1));
        assert_eq!(fsm.state(), state_c());
    }

    #[test]
    fn events_emitted_from_on_enter_are_queued_not_recursed() {
        // on_enter of B immediately emits an event that transitions to C;
        // this must happen after the A->B transition fully completes.
        let transitions = vec![
            Transition::new(state_a(), state_b(), EventId::User(1)),
            Transition::new(state_b(), state_c(), EventId::User(2)),
            Transition::new(StateId::Any, state_a(), EventId::Reset),
        ];
        let mut states = vec![
            counting_state_node(state_a()),
            StateNode::new().on_enter(Box::new(|_ctx: &mut Ctx, _| {})),
            counting_state_node(state_c()),
        ];
        // Replace B's on_enter with one that re-enters the FSM via a queued event.
        states[1] = StateNode::new();
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        fsm.reset(&mut ctx);
        fsm.event(&mut ctx, EventId::User(1));
        assert_eq!(fsm.state(), state_b());
        fsm.event(&mut ctx, EventId::User(2));
        assert_eq!(fsm.state(), state_c());
    }

    #[test]
    fn invalid_table_with_no_states_is_rejected() {
        let transitions: Vec<Transition<Ctx>> =
            vec![Transition::new(StateId::Any, state_a(), EventId::Reset)];
        let err = Fsm::new(transitions, vec![]).unwrap_err();
        assert!(matches!(err, FsmError::InvalidTable(_)));
    }

    #[test]
    fn invalid_table_next_out_of_range_is_rejected() {
        let transitions: Vec<Transition<Ctx>> =
            vec![Transition::new(StateId::Any, StateId::Id(5), EventId::Reset)];
        let states = vec![counting_state_node(state_a())];
        let err = Fsm::new(transitions, states).unwrap_err();
        assert!(matches!(err, FsmError::InvalidTable(_)));
    }

    #[test]
    #[should_panic(expected = "out-of-range state")]
    fn goto_to_out_of_range_state_is_fatal() {
        let transitions = vec![
            Transition::with_handler(
                state_a(),
                state_b(),
                EventId::User(1),
                Box::new(|_: &mut Ctx, _| HandlerOutcome::GoTo(StateId::Id(99))),
            ),
            Transition::new(StateId::Any, state_a(), EventId::Reset),
        ];
        let states = vec![counting_state_node(state_a()), counting_state_node(state_b())];
        let mut fsm = Fsm::new(transitions, states).unwrap();
        let mut ctx = Ctx::default();
        fsm.reset(&mut ctx);
        fsm.event(&mut ctx, EventId::User(1));
    }
}
