//! The context threaded through the port's FSM: everything a transition or
//! state handler needs to act on negotiation, replay, and forwarding.

use std::collections::VecDeque;
use std::sync::Arc;

use fbp_fsm::EventId;
use fbp_pubsub::PubsubEngine;
use fbp_topic::SubscriberId;
use fbp_value::Value;
use parking_lot::Mutex;

use crate::stats::PortStats;
use crate::transport::Transport;
use crate::wire::{self, Message, Negotiate, Resolution};

/// Which side of the two-peer handshake this port plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Upstream,
    Downstream,
}

const TIMEOUT_MS: u64 = 1000;
const RETRY_TICK_MS: u64 = 2;

pub(crate) struct PortCtx<T> {
    pub(crate) role: Role,
    pub(crate) transport: T,
    pub(crate) engine: Arc<PubsubEngine>,

    pub(crate) own_conn_count: u64,
    pub(crate) peer_conn_count: u64,
    pub(crate) resolution: Option<Resolution>,

    pub(crate) feedback_topic: String,
    pub(crate) forward_sub: Option<SubscriberId>,
    pub(crate) outbound: Arc<Mutex<VecDeque<(String, Value)>>>,
    pub(crate) replay_queue: VecDeque<(String, Value)>,

    pub(crate) inbound: Option<Message>,
    pub(crate) pending_send: Option<(u8, Vec<u8>)>,

    /// Events a handler or `on_enter`/`on_exit` wants dispatched next.
    /// `Fsm::event` only has `&mut C`, not `&mut Fsm`, so self-triggered
    /// transitions are requested here and drained by the driving loop
    /// (`Port::pump`) after the current `event()` call returns.
    pub(crate) pending_events: VecDeque<EventId>,

    pub(crate) now_ms: u64,
    pub(crate) timeout_at: Option<u64>,
    pub(crate) tick_at: Option<u64>,

    pub(crate) stats: PortStats,
    pub(crate) reset_reason: Option<String>,
}

impl<T: Transport> PortCtx<T> {
    pub(crate) fn arm_timeout(&mut self) {
        self.timeout_at = Some(self.now_ms + TIMEOUT_MS);
    }

    pub(crate) fn clear_timeout(&mut self) {
        self.timeout_at = None;
    }

    pub(crate) fn arm_retry_tick(&mut self) {
        self.tick_at = Some(self.now_ms + RETRY_TICK_MS);
    }

    /// Send now; if the transport is full, stash the bytes and arm a retry
    /// tick rather than blocking.
    pub(crate) fn send(&mut self, msg: &Message) {
        let (port_data, bytes) = wire::encode(msg);
        if self.transport.send(port_data, &bytes) {
            self.stats.messages_sent += 1;
        } else {
            self.pending_send = Some((port_data, bytes));
            self.arm_retry_tick();
        }
    }

    pub(crate) fn retry_pending_send(&mut self) {
        if let Some((port_data, bytes)) = self.pending_send.take() {
            if self.transport.send(port_data, &bytes) {
                self.stats.messages_sent += 1;
            } else {
                self.pending_send = Some((port_data, bytes));
                self.arm_retry_tick();
            }
        }
    }

    pub(crate) fn send_negotiate(&mut self, msg_type: u8) {
        self.send(&Message::Negotiate(Negotiate {
            version: 1,
            status: 0,
            resolution: self.resolution.unwrap_or(Resolution::Server),
            msg_type,
            client_conn_count: if self.role == Role::Upstream {
                self.own_conn_count
            } else {
                self.peer_conn_count
            },
            server_conn_count: if self.role == Role::Downstream {
                self.own_conn_count
            } else {
                self.peer_conn_count
            },
        }));
    }

    /// Apply the negotiation resolution rule (§4.4.3): the client wins if
    /// the server has seen at most one connection, or the client has
    /// connected more times than the server has.
    pub(crate) fn resolve(&mut self, client_conn_count: u64, server_conn_count: u64) -> Resolution {
        let resolution = if server_conn_count <= 1 || client_conn_count > server_conn_count {
            Resolution::Client
        } else {
            Resolution::Server
        };
        self.resolution = Some(resolution);
        self.stats.last_resolution_was_client = Some(resolution == Resolution::Client);
        resolution
    }

    pub(crate) fn i_am_winner(&self) -> bool {
        match (self.role, self.resolution) {
            (Role::Upstream, Some(Resolution::Client)) => true,
            (Role::Downstream, Some(Resolution::Server)) => true,
            _ => false,
        }
    }

    /// Snapshot every retained topic this engine owns and queue it for
    /// replay, with a trailing sentinel publish on `feedback_topic`.
    ///
    /// The sentinel is a plain `Publish` like any other — the peer just
    /// stores it under `_/fb/<id>` and otherwise ignores it. What it's
    /// really for is ordering: because `replay_queue` is drained strictly
    /// FIFO and the sentinel is queued last, seeing the queue empty after
    /// sending it proves every retained value was hashed onto the wire
    /// first, in order. No subscribe/round-trip back to the peer needed.
    pub(crate) fn start_replay(&mut self) {
        self.replay_queue.clear();
        let prefix = self.engine.topic_prefix().to_string();
        for (topic, value) in self.engine.retained_under(&prefix) {
            self.replay_queue.push_back((topic, value));
        }
        self.replay_queue
            .push_back((self.feedback_topic.clone(), Value::u32(1, fbp_value::ValueFlags::NONE)));
    }

    /// Send replay entries until the transport pushes back or the queue
    /// drains. Queues `EndTopic` once the sentinel has gone out.
    pub(crate) fn pump_replay(&mut self) {
        while self.pending_send.is_none() {
            match self.replay_queue.pop_front() {
                Some((topic, value)) => self.send(&Message::Publish { topic, value }),
                None => {
                    self.pending_events.push_back(EventId::User(crate::fsm_def::EV_END_TOPIC));
                    break;
                }
            }
        }
    }
}
