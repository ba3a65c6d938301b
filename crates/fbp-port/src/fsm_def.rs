//! The port's connection/negotiation state machine, built on
//! [`fbp_fsm::Fsm`]. Six states instead of the asymmetric nine-state,
//! eight-event table a literal per-role port protocol would need — the
//! asymmetry (client sends first, server replies) lives in the handlers'
//! `match ctx.role` branches instead of in separate states per role.
//!
//! States, in table order (the state table is addressed by index):
//! `Disconnected, Negotiating, TopicList, UpdateExchange, ConnHandshake,
//! Connected`. Events: `Disconnect, TransportConnect, Recv, EndTopic, Tick,
//! Timeout`.

use fbp_fsm::{EventId, Fsm, FsmError, HandlerOutcome, StateId, StateNode, Transition};

use crate::ctx::{PortCtx, Role};
use crate::error::PortError;
use crate::transport::Transport;
use crate::wire::{Connected, Message, Resolution};

/// Log a failed inbound-forward publish rather than silently dropping it —
/// the only way this fails is a malformed topic path or value from the
/// peer, neither of which should take the port itself down.
fn log_forward_err(topic: &str, err: fbp_value::FbpError) {
    tracing::warn!(topic, error = %PortError::from(err), "dropping inbound forwarded publish");
}

pub(crate) const DISCONNECTED: u16 = 0;
pub(crate) const NEGOTIATING: u16 = 1;
pub(crate) const TOPIC_LIST: u16 = 2;
pub(crate) const UPDATE_EXCHANGE: u16 = 3;
pub(crate) const CONN_HANDSHAKE: u16 = 4;
pub(crate) const CONNECTED: u16 = 5;

pub(crate) const EV_DISCONNECT: u16 = 0;
pub(crate) const EV_TRANSPORT_CONNECT: u16 = 1;
pub(crate) const EV_RECV: u16 = 2;
pub(crate) const EV_END_TOPIC: u16 = 3;
pub(crate) const EV_TICK: u16 = 4;
pub(crate) const EV_TIMEOUT: u16 = 5;

fn sid(n: u16) -> StateId {
    StateId::Id(n)
}

fn eid(n: u16) -> EventId {
    EventId::User(n)
}

pub(crate) fn build_fsm<T: Transport + 'static>() -> Fsm<PortCtx<T>> {
    let mut states: Vec<StateNode<PortCtx<T>>> = Vec::new();

    states.push(StateNode::new().on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
        ctx.clear_timeout();
        ctx.tick_at = None;
        ctx.replay_queue.clear();
        ctx.pending_send = None;
        if let Some(sub) = ctx.forward_sub.take() {
            ctx.engine.unsubscribe_from_all(sub);
        }
    }))); // DISCONNECTED

    states.push(
        StateNode::new()
            .on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
                if ctx.role == Role::Upstream {
                    ctx.own_conn_count += 1;
                    ctx.send_negotiate(0);
                }
                ctx.arm_timeout();
            }))
            .on_exit(Box::new(|ctx: &mut PortCtx<T>, _e| ctx.clear_timeout())),
    ); // NEGOTIATING

    states.push(
        StateNode::new()
            .on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
                let prefix = ctx.engine.topic_prefix().to_string();
                ctx.send(&Message::TopicList(vec![prefix]));
                ctx.arm_timeout();
            }))
            .on_exit(Box::new(|ctx: &mut PortCtx<T>, _e| ctx.clear_timeout())),
    ); // TOPIC_LIST

    states.push(
        StateNode::new()
            .on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
                ctx.start_replay();
                ctx.pump_replay();
                ctx.arm_timeout();
            }))
            .on_exit(Box::new(|ctx: &mut PortCtx<T>, _e| ctx.clear_timeout())),
    ); // UPDATE_EXCHANGE

    states.push(
        StateNode::new()
            .on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
                if ctx.i_am_winner() {
                    ctx.send(&Message::Connected(Connected { status: 0, phase: 0 }));
                }
                ctx.arm_timeout();
            }))
            .on_exit(Box::new(|ctx: &mut PortCtx<T>, _e| ctx.clear_timeout())),
    ); // CONN_HANDSHAKE

    states.push(StateNode::new().on_enter(Box::new(|ctx: &mut PortCtx<T>, _e| {
        ctx.stats.reconnects = ctx.stats.reconnects.saturating_add(1);
        ctx.clear_timeout();
    }))); // CONNECTED

    let retry_tick: fn(&mut PortCtx<T>, EventId) -> HandlerOutcome = |ctx, _e| {
        ctx.retry_pending_send();
        HandlerOutcome::Remain
    };

    let transitions = vec![
        // Entering the table for the first time: Null -> Disconnected.
        Transition::new(StateId::Any, sid(DISCONNECTED), EventId::Reset),
        // Disconnect always wins, from any state.
        Transition::new(StateId::Any, sid(DISCONNECTED), eid(EV_DISCONNECT)),
        // Transport connect kicks negotiation off.
        Transition::new(sid(DISCONNECTED), sid(NEGOTIATING), eid(EV_TRANSPORT_CONNECT)),
        // Negotiating: waits for the peer's Negotiate message.
        Transition::with_handler(
            sid(NEGOTIATING),
            sid(NEGOTIATING),
            eid(EV_RECV),
            Box::new(recv_negotiate::<T>),
        ),
        // TopicList: waits for the peer's topic list.
        Transition::with_handler(
            sid(TOPIC_LIST),
            sid(TOPIC_LIST),
            eid(EV_RECV),
            Box::new(recv_topic_list::<T>),
        ),
        // UpdateExchange: applies inbound retained publishes as they arrive.
        Transition::with_handler(
            sid(UPDATE_EXCHANGE),
            sid(UPDATE_EXCHANGE),
            eid(EV_RECV),
            Box::new(recv_update::<T>),
        ),
        Transition::new(sid(UPDATE_EXCHANGE), sid(CONN_HANDSHAKE), eid(EV_END_TOPIC)),
        // ConnHandshake: winner already sent Connected on entry; loser waits
        // for it, then echoes its own.
        Transition::with_handler(
            sid(CONN_HANDSHAKE),
            sid(CONN_HANDSHAKE),
            eid(EV_RECV),
            Box::new(recv_handshake::<T>),
        ),
        // Connected: steady state, forwards inbound publishes into the
        // local engine.
        Transition::with_handler(sid(CONNECTED), sid(CONNECTED), eid(EV_RECV), Box::new(recv_connected::<T>)),
        // Tick retries a stalled send in whichever state stalled it.
        Transition::with_handler(sid(NEGOTIATING), sid(NEGOTIATING), eid(EV_TICK), Box::new(retry_tick)),
        Transition::with_handler(sid(TOPIC_LIST), sid(TOPIC_LIST), eid(EV_TICK), Box::new(retry_tick)),
        Transition::with_handler(
            sid(UPDATE_EXCHANGE),
            sid(UPDATE_EXCHANGE),
            eid(EV_TICK),
            Box::new(|ctx: &mut PortCtx<T>, _e| {
                ctx.retry_pending_send();
                ctx.pump_replay();
                HandlerOutcome::Remain
            }),
        ),
        Transition::with_handler(sid(CONN_HANDSHAKE), sid(CONN_HANDSHAKE), eid(EV_TICK), Box::new(retry_tick)),
        Transition::with_handler(sid(CONNECTED), sid(CONNECTED), eid(EV_TICK), Box::new(retry_tick)),
        // Timeout anywhere mid-handshake restarts negotiation from scratch.
        Transition::with_handler(
            sid(NEGOTIATING),
            sid(NEGOTIATING),
            eid(EV_TIMEOUT),
            Box::new(restart_negotiation::<T>),
        ),
        Transition::new(sid(TOPIC_LIST), sid(NEGOTIATING), eid(EV_TIMEOUT)),
        Transition::new(sid(UPDATE_EXCHANGE), sid(NEGOTIATING), eid(EV_TIMEOUT)),
        Transition::new(sid(CONN_HANDSHAKE), sid(NEGOTIATING), eid(EV_TIMEOUT)),
    ];

    build(transitions, states)
}

fn build<T: Transport + 'static>(
    transitions: Vec<Transition<PortCtx<T>>>,
    states: Vec<StateNode<PortCtx<T>>>,
) -> Fsm<PortCtx<T>> {
    match Fsm::new(transitions, states) {
        Ok(fsm) => fsm,
        Err(FsmError::InvalidTable(msg)) => panic!("port fsm table is malformed: {msg}"),
    }
}

fn recv_negotiate<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    let Some(msg) = ctx.inbound.take() else {
        return HandlerOutcome::Remain;
    };
    let Message::Negotiate(n) = msg else {
        ctx.inbound = Some(msg);
        return HandlerOutcome::Remain;
    };
    ctx.stats.messages_received += 1;
    match ctx.role {
        Role::Downstream if n.msg_type == 0 => {
            ctx.peer_conn_count = n.client_conn_count;
            ctx.own_conn_count += 1;
            ctx.resolve(n.client_conn_count, ctx.own_conn_count);
            ctx.send_negotiate(1);
            HandlerOutcome::GoTo(sid(TOPIC_LIST))
        }
        Role::Upstream if n.msg_type == 1 => {
            ctx.peer_conn_count = n.server_conn_count;
            ctx.resolution = Some(n.resolution);
            ctx.stats.last_resolution_was_client = Some(n.resolution == Resolution::Client);
            HandlerOutcome::GoTo(sid(TOPIC_LIST))
        }
        _ => HandlerOutcome::Remain,
    }
}

fn recv_topic_list<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    let Some(msg) = ctx.inbound.take() else {
        return HandlerOutcome::Remain;
    };
    match msg {
        Message::TopicList(_peer_prefixes) => {
            ctx.stats.messages_received += 1;
            HandlerOutcome::GoTo(sid(UPDATE_EXCHANGE))
        }
        other => {
            ctx.inbound = Some(other);
            HandlerOutcome::Remain
        }
    }
}

fn recv_update<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    let Some(msg) = ctx.inbound.take() else {
        return HandlerOutcome::Remain;
    };
    match msg {
        Message::Publish { topic, value } => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(&topic, value, ctx.forward_sub) {
                log_forward_err(&topic, err);
            }
        }
        Message::TopicAdd(prefix) => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(
                "_/topic/add",
                fbp_value::Value::str_const(prefix.clone(), fbp_value::ValueFlags::NONE),
                ctx.forward_sub,
            ) {
                log_forward_err("_/topic/add", err);
            }
        }
        Message::TopicRemove(prefix) => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(
                "_/topic/remove",
                fbp_value::Value::str_const(prefix.clone(), fbp_value::ValueFlags::NONE),
                ctx.forward_sub,
            ) {
                log_forward_err("_/topic/remove", err);
            }
        }
        other => {
            ctx.inbound = Some(other);
        }
    }
    HandlerOutcome::Remain
}

fn recv_handshake<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    let Some(msg) = ctx.inbound.take() else {
        return HandlerOutcome::Remain;
    };
    match msg {
        Message::Connected(_c) => {
            ctx.stats.messages_received += 1;
            if !ctx.i_am_winner() {
                ctx.send(&Message::Connected(Connected { status: 0, phase: 1 }));
            }
            HandlerOutcome::GoTo(sid(CONNECTED))
        }
        other => {
            ctx.inbound = Some(other);
            HandlerOutcome::Remain
        }
    }
}

fn recv_connected<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    let Some(msg) = ctx.inbound.take() else {
        return HandlerOutcome::Remain;
    };
    match msg {
        Message::Publish { topic, value } => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(&topic, value, ctx.forward_sub) {
                log_forward_err(&topic, err);
            }
        }
        Message::TopicAdd(prefix) => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(
                "_/topic/add",
                fbp_value::Value::str_const(prefix.clone(), fbp_value::ValueFlags::NONE),
                ctx.forward_sub,
            ) {
                log_forward_err("_/topic/add", err);
            }
        }
        Message::TopicRemove(prefix) => {
            ctx.stats.messages_received += 1;
            if let Err(err) = ctx.engine.publish(
                "_/topic/remove",
                fbp_value::Value::str_const(prefix.clone(), fbp_value::ValueFlags::NONE),
                ctx.forward_sub,
            ) {
                log_forward_err("_/topic/remove", err);
            }
        }
        Message::Connected(_) | Message::Negotiate(_) | Message::TopicList(_) => {
            ctx.stats.messages_received += 1;
        }
    }
    HandlerOutcome::Remain
}

fn restart_negotiation<T: Transport>(ctx: &mut PortCtx<T>, _e: EventId) -> HandlerOutcome {
    ctx.reset_reason = Some("negotiation timed out".to_string());
    ctx.resolution = None;
    HandlerOutcome::GoTo(sid(NEGOTIATING))
}
