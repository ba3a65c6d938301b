//! The public port type: owns the negotiation FSM, drives it off a
//! transport and a caller-supplied clock, and forwards publishes between
//! the local engine and the wire.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fbp_fsm::{EventId, Fsm, StateId};
use fbp_pubsub::PubsubEngine;
use fbp_value::SubscriberFlags;
use parking_lot::Mutex;

pub use crate::ctx::Role;
use crate::ctx::PortCtx;
use crate::fsm_def::{self, build_fsm};
use crate::stats::PortStats;
use crate::transport::Transport;
use crate::wire::{self, Message};

static NEXT_PORT_INDEX: AtomicU64 = AtomicU64::new(0);

/// Topics the port forwards raw, unconditionally, even though they start
/// with the reserved `_` prefix — the two ops that keep each side's
/// `owned_prefixes` list in sync (§4.4.6).
fn is_topology_topic(topic: &str) -> bool {
    topic == "_/topic/add" || topic == "_/topic/remove"
}

/// One end of a negotiated link between two [`PubsubEngine`]s. Construct
/// one per transport, then call [`Port::pump`] on every reactor tick with a
/// monotonically increasing millisecond clock.
pub struct Port<T: Transport + 'static> {
    fsm: Fsm<PortCtx<T>>,
    ctx: PortCtx<T>,
}

impl<T: Transport + 'static> Port<T> {
    #[must_use]
    pub fn new(role: Role, transport: T, engine: Arc<PubsubEngine>) -> Port<T> {
        let index = NEXT_PORT_INDEX.fetch_add(1, Ordering::Relaxed);
        let feedback_topic = format!("_/fb/{index:x}");
        let outbound = Arc::new(Mutex::new(VecDeque::new()));

        let forward_sub = {
            let outbound = outbound.clone();
            engine
                .subscribe(
                    "",
                    SubscriberFlags::PUB,
                    Box::new(move |topic, value| {
                        if topic.starts_with('_') && !is_topology_topic(topic) {
                            return 0;
                        }
                        outbound.lock().push_back((topic.to_string(), value.clone()));
                        0
                    }),
                )
                .expect("subscribing at the root is always well-formed")
        };

        let mut ctx = PortCtx {
            role,
            transport,
            engine,
            own_conn_count: 0,
            peer_conn_count: 0,
            resolution: None,
            feedback_topic,
            forward_sub: Some(forward_sub),
            outbound,
            replay_queue: VecDeque::new(),
            inbound: None,
            pending_send: None,
            pending_events: VecDeque::new(),
            now_ms: 0,
            timeout_at: None,
            tick_at: None,
            stats: PortStats::default(),
            reset_reason: None,
        };

        let mut fsm = build_fsm::<T>();
        drive(&mut fsm, &mut ctx, EventId::Reset);
        drive(&mut fsm, &mut ctx, EventId::User(fsm_def::EV_TRANSPORT_CONNECT));

        Port { fsm, ctx }
    }

    /// Drain the transport, fire any due timers, and — once `Connected` —
    /// flush publishes the local engine has queued for the peer.
    pub fn pump(&mut self, now_ms: u64) {
        self.ctx.now_ms = now_ms;

        while let Some((port_data, bytes)) = self.ctx.transport.try_recv() {
            match wire::decode(port_data, &bytes) {
                Ok(msg) => {
                    self.ctx.inbound = Some(msg);
                    self.fire(EventId::User(fsm_def::EV_RECV));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed wire message");
                }
            }
        }

        if self.ctx.timeout_at.is_some_and(|at| now_ms >= at) {
            self.ctx.timeout_at = None;
            self.fire(EventId::User(fsm_def::EV_TIMEOUT));
        }
        if self.ctx.tick_at.is_some_and(|at| now_ms >= at) {
            self.ctx.tick_at = None;
            self.fire(EventId::User(fsm_def::EV_TICK));
        }

        // `engine.publish` only enqueues; draining here is this port's half
        // of the host-loop contract `PubsubEngine::set_work_pending_callback`
        // documents — it applies whatever this pump cycle queued (replayed
        // or peer-forwarded values inbound, the local app's own publishes
        // outbound) so the forward subscriber below sees a settled tree.
        self.ctx.engine.process();

        if self.is_connected() {
            let pending: Vec<_> = self.ctx.outbound.lock().drain(..).collect();
            for (topic, value) in pending {
                let msg = match (topic.as_str(), &value.data) {
                    ("_/topic/add", fbp_value::ValueData::Str(s)) => Message::TopicAdd(s.to_string()),
                    ("_/topic/remove", fbp_value::ValueData::Str(s)) => Message::TopicRemove(s.to_string()),
                    _ => Message::Publish { topic, value },
                };
                self.ctx.send(&msg);
            }
        }
    }

    fn fire(&mut self, event: EventId) {
        drive(&mut self.fsm, &mut self.ctx, event);
    }

    #[must_use]
    pub fn stats(&self) -> PortStats {
        self.ctx.stats
    }

    #[must_use]
    pub fn reset_reason(&self) -> Option<&str> {
        self.ctx.reset_reason.as_deref()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.fsm.state() == StateId::Id(fsm_def::CONNECTED)
    }

    pub fn disconnect(&mut self) {
        self.fire(EventId::User(fsm_def::EV_DISCONNECT));
    }
}

impl<T: Transport + 'static> Drop for Port<T> {
    fn drop(&mut self) {
        if let Some(sub) = self.ctx.forward_sub.take() {
            self.ctx.engine.unsubscribe_from_all(sub);
        }
    }
}

/// Fire one event, then drain whatever `on_enter`/handlers queued for
/// themselves via `ctx.pending_events` (see [`PortCtx::pump_replay`]).
fn drive<T: Transport>(fsm: &mut Fsm<PortCtx<T>>, ctx: &mut PortCtx<T>, event: EventId) {
    fsm.event(ctx, event);
    while let Some(ev) = ctx.pending_events.pop_front() {
        fsm.event(ctx, ev);
    }
}
