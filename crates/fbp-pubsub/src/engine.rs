//! The hierarchical retained-value publish/subscribe engine.

use std::collections::VecDeque;
use std::sync::Arc;

use fbp_topic::{SubscriberId, TopicId, Tree};
use fbp_value::{FbpError, Result, SubscriberFlags, Value, ValueData, ValueFlags};
use parking_lot::Mutex;

use crate::arena::Arena;
use crate::topic_list;

/// A subscriber callback: given the topic path it fired on and the value,
/// returns a status code (`0` = ok; anything else triggers a synthesized
/// error publish on `topic#`).
pub type Sink = Box<dyn FnMut(&str, &Value) -> i32 + Send>;

const TOPIC_PREFIX: &str = "_/topic/prefix";
const TOPIC_LIST: &str = "_/topic/list";
const TOPIC_ADD: &str = "_/topic/add";
const TOPIC_REMOVE: &str = "_/topic/remove";

struct QueuedPublish {
    topic: String,
    value: Value,
    source: Option<SubscriberId>,
    arena_id: Option<u64>,
}

enum MetaKind<'a> {
    RequestAll,
    RequestSubtree(&'a str),
    Publish(&'a str),
}

fn meta_kind(topic_with_dollar: &str) -> MetaKind<'_> {
    let without_dollar = &topic_with_dollar[..topic_with_dollar.len() - 1];
    if without_dollar.is_empty() || without_dollar.ends_with('/') {
        let prefix = without_dollar.trim_end_matches('/');
        if prefix.is_empty() {
            MetaKind::RequestAll
        } else {
            MetaKind::RequestSubtree(prefix)
        }
    } else {
        MetaKind::Publish(without_dollar)
    }
}

struct EngineState {
    tree: Tree<Sink>,
    arena: Arena,
    queue: VecDeque<QueuedPublish>,
    owned_prefixes: Vec<String>,
}

/// A single PubSub engine instance: one topic tree, one payload arena, one
/// deferred message queue, guarded by a single mutex (the spec's "one
/// optional mutex per engine" — here always present, since the cost of an
/// uncontended `parking_lot::Mutex` lock is negligible next to the clarity
/// of always having one).
pub struct PubsubEngine {
    state: Mutex<EngineState>,
    topic_prefix: String,
    work_pending: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl PubsubEngine {
    #[must_use]
    pub fn new(topic_prefix: impl Into<String>, arena_capacity: usize) -> PubsubEngine {
        let topic_prefix = topic_prefix.into();
        let mut tree = Tree::new();
        let prefix_id = tree
            .find(TOPIC_PREFIX)
            .expect("reserved topic paths are always well-formed");
        tree.set_value(
            prefix_id,
            Value::str_const(topic_prefix.clone(), ValueFlags::RETAIN),
        );
        let list_id = tree
            .find(TOPIC_LIST)
            .expect("reserved topic paths are always well-formed");
        tree.set_value(
            list_id,
            Value::str_const(
                topic_list::encode(std::slice::from_ref(&topic_prefix)),
                ValueFlags::RETAIN,
            ),
        );
        PubsubEngine {
            state: Mutex::new(EngineState {
                tree,
                arena: Arena::new(arena_capacity),
                queue: VecDeque::new(),
                owned_prefixes: vec![topic_prefix.clone()],
            }),
            topic_prefix,
            work_pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Register the callback invoked whenever a message is enqueued, so a
    /// host event loop knows to call [`PubsubEngine::process`].
    pub fn set_work_pending_callback(&self, cb: impl Fn() + Send + 'static) {
        *self.work_pending.lock() = Some(Box::new(cb));
    }

    /// Enqueue a publish. Validated and (for non-const variable-length
    /// payloads) arena-reserved synchronously; dispatch itself happens
    /// later, in [`PubsubEngine::process`].
    pub fn publish(&self, topic: &str, value: Value, source: Option<SubscriberId>) -> Result<()> {
        value.validate_retain_const()?;
        let needs_arena = value.data.is_variable_length() && !value.flags.is_const();
        {
            let mut state = self.state.lock();
            let arena_id = if needs_arena {
                Some(state.arena.reserve(value.data.size())?)
            } else {
                None
            };
            state.queue.push_back(QueuedPublish {
                topic: topic.to_string(),
                value,
                source,
                arena_id,
            });
        }
        if let Some(cb) = self.work_pending.lock().as_ref() {
            cb();
        }
        Ok(())
    }

    /// Subscribe, installing the subscriber and (if `Retain` is set)
    /// synchronously replaying every retained value at or below `topic` —
    /// before this call returns, per the spec's invariant, not deferred to
    /// a later `process()`.
    ///
    /// `Req`/`Rsp` are only legal when `topic` is the root (`""`).
    pub fn subscribe(
        &self,
        topic: &str,
        flags: SubscriberFlags,
        sink: Sink,
    ) -> Result<SubscriberId> {
        if (flags.contains(SubscriberFlags::REQ) || flags.contains(SubscriberFlags::RSP))
            && !topic.is_empty()
        {
            return Err(FbpError::InvalidParameter(
                "Req/Rsp subscriptions are only legal on the root topic".into(),
            ));
        }
        let mut state = self.state.lock();
        let id = state.tree.find(topic)?;
        let sub_id = state.tree.add_subscriber(id, flags, sink);
        if flags.contains(SubscriberFlags::RETAIN) {
            let snapshot = state.tree.retained_subtree(id);
            for t in snapshot {
                let path = state.tree.path_of(t);
                let value = state.tree.value(t).clone();
                if let Some(s) = state.tree.subscriber_sink_mut(id, sub_id) {
                    s(&path, &value);
                }
            }
        }
        Ok(sub_id)
    }

    pub fn unsubscribe(&self, topic: &str, sub: SubscriberId) -> Result<()> {
        let mut state = self.state.lock();
        let id = state
            .tree
            .find_existing(topic)
            .ok_or_else(|| FbpError::NotFound(topic.to_string()))?;
        if state.tree.remove_subscriber(id, sub) {
            Ok(())
        } else {
            Err(FbpError::NotFound(format!(
                "no such subscriber on {topic}"
            )))
        }
    }

    pub fn unsubscribe_from_all(&self, sub: SubscriberId) {
        self.state.lock().tree.remove_subscriber_everywhere(sub);
    }

    /// Copy the retained value of `topic`. Fails if the topic doesn't exist
    /// or has no retained value.
    pub fn query(&self, topic: &str) -> Result<Value> {
        let state = self.state.lock();
        let id = state
            .tree
            .find_existing(topic)
            .ok_or_else(|| FbpError::NotFound(topic.to_string()))?;
        let value = state.tree.value(id);
        if value.flags.retain() {
            Ok(value.clone())
        } else {
            Err(FbpError::NotFound(format!(
                "{topic} has no retained value"
            )))
        }
    }

    /// Snapshot `(path, value)` for every retained topic at or below
    /// `prefix`, in stable order — used by the port to replay its owned
    /// retained values to a peer.
    #[must_use]
    pub fn retained_under(&self, prefix: &str) -> Vec<(String, Value)> {
        let state = self.state.lock();
        let Some(id) = state.tree.find_existing(prefix) else {
            return Vec::new();
        };
        state
            .tree
            .retained_subtree(id)
            .into_iter()
            .map(|t| (state.tree.path_of(t), state.tree.value(t).clone()))
            .collect()
    }

    /// Convenience wrapper: publish JSON metadata for `topic` (`topic$`,
    /// `Json | Const | Retain`).
    pub fn publish_meta(&self, topic: &str, json: impl Into<Arc<str>>) -> Result<()> {
        self.publish(
            &format!("{topic}$"),
            Value::json_const(json, ValueFlags::RETAIN),
            None,
        )
    }

    /// Drain and dispatch every queued publish. Returns the number of
    /// top-level publishes processed (synthesized error publishes do not
    /// count separately against the caller's enqueue count, but are
    /// processed within the same call).
    pub fn process(&self) -> usize {
        let mut state = self.state.lock();
        let mut local: VecDeque<QueuedPublish> = std::mem::take(&mut state.queue);
        let mut processed = 0;
        while let Some(msg) = local.pop_front() {
            processed += 1;
            self.process_one(&mut state, msg, &mut local);
        }
        processed
    }

    fn process_one(
        &self,
        state: &mut EngineState,
        msg: QueuedPublish,
        local: &mut VecDeque<QueuedPublish>,
    ) {
        let QueuedPublish {
            topic,
            value,
            source,
            arena_id,
        } = msg;
        let (base, suffix) = fbp_topic::classify(&topic);
        match suffix {
            fbp_topic::Suffix::Meta => self.process_meta(state, &topic, value, source, local),
            fbp_topic::Suffix::Error => self.process_error(state, base, &value, source),
            fbp_topic::Suffix::Query => {
                tracing::trace!(topic = %topic, "reserved query suffix: no-op");
            }
            fbp_topic::Suffix::Normal => self.process_normal(state, &topic, value, source, local),
        }
        if let Some(id) = arena_id {
            state.arena.retire(id);
        }
    }

    fn process_normal(
        &self,
        state: &mut EngineState,
        topic: &str,
        value: Value,
        source: Option<SubscriberId>,
        local: &mut VecDeque<QueuedPublish>,
    ) {
        // Topic add/remove mutate the owned-prefix bookkeeping first, then
        // fall through to the normal dispatch below — a port's root `Pub`
        // subscriber needs to see these go by like any other publish to
        // forward them on to its peer (§4.4.6). Only fall through when the
        // prefix set actually changed, or a peer echoing back a prefix it
        // just learned about would ping-pong forever.
        if topic == TOPIC_ADD {
            let changed = matches!(&value.data, ValueData::Str(prefix) if self.add_prefix(state, prefix.to_string()));
            if !changed {
                return;
            }
        } else if topic == TOPIC_REMOVE {
            let changed = matches!(&value.data, ValueData::Str(prefix) if self.remove_prefix(state, prefix.as_ref()));
            if !changed {
                return;
            }
        }

        let id = match state.tree.find(topic) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(topic = %topic, error = %err, "dropping publish to malformed topic");
                return;
            }
        };
        let existing = state.tree.value(id).clone();
        if existing.flags.retain() && existing.dedup_eq(&value) {
            tracing::debug!(topic = %topic, "dropping duplicate retained publish");
            return;
        }
        state.tree.set_value(id, value.clone());
        let status = dispatch_normal(&mut state.tree, id, topic, &value, source);
        if status != 0 {
            local.push_back(QueuedPublish {
                topic: format!("{topic}#"),
                value: Value::u32(status.unsigned_abs(), ValueFlags::NONE),
                source: None,
                arena_id: None,
            });
        }
    }

    fn process_error(
        &self,
        state: &mut EngineState,
        base: &str,
        value: &Value,
        source: Option<SubscriberId>,
    ) {
        let base_id = state.tree.find_existing_base(base);
        let path = format!("{base}#");
        for anc in state.tree.ancestors_inclusive(base_id) {
            let snapshot = state.tree.subscriber_snapshot(anc);
            for (sid, flags) in snapshot {
                if Some(sid) == source || !flags.contains(SubscriberFlags::RSP) {
                    continue;
                }
                call_sink(&mut state.tree, anc, sid, &path, value);
            }
        }
    }

    fn process_meta(
        &self,
        state: &mut EngineState,
        topic: &str,
        value: Value,
        source: Option<SubscriberId>,
        local: &mut VecDeque<QueuedPublish>,
    ) {
        match meta_kind(topic) {
            MetaKind::RequestAll => {
                let root = state.tree.root();
                let mut metas = Vec::new();
                collect_meta(&state.tree, root, &mut metas);
                for (path, json) in metas {
                    deliver_root(
                        &mut state.tree,
                        SubscriberFlags::RSP,
                        &format!("{path}$"),
                        &Value::json_const(json, ValueFlags::RETAIN),
                        source,
                    );
                }
                deliver_root(&mut state.tree, SubscriberFlags::REQ, "$", &value, source);
                let _ = local;
            }
            MetaKind::RequestSubtree(prefix) => {
                if prefix.starts_with(self.topic_prefix.as_str()) {
                    if let Some(id) = state.tree.find_existing(prefix) {
                        let mut metas = Vec::new();
                        collect_meta(&state.tree, id, &mut metas);
                        for (path, json) in metas {
                            deliver_root(
                                &mut state.tree,
                                SubscriberFlags::RSP,
                                &format!("{path}$"),
                                &Value::json_const(json, ValueFlags::RETAIN),
                                source,
                            );
                        }
                    }
                } else {
                    deliver_root(
                        &mut state.tree,
                        SubscriberFlags::REQ,
                        &format!("{prefix}/$"),
                        &value,
                        source,
                    );
                }
            }
            MetaKind::Publish(topic_only) => {
                if topic_only.starts_with(self.topic_prefix.as_str()) {
                    let is_meta_shaped = matches!(value.data, ValueData::Json(_))
                        && value.flags.is_const()
                        && value.flags.retain();
                    if !is_meta_shaped {
                        tracing::warn!(
                            topic = %topic,
                            "metadata publish must be Json|Const|Retain; dropping"
                        );
                        return;
                    }
                    let ValueData::Json(json) = value.data.clone() else {
                        unreachable!("checked above");
                    };
                    if let Ok(id) = state.tree.find(topic_only) {
                        state.tree.set_meta(id, json);
                        for anc in state.tree.ancestors_inclusive(id) {
                            let snapshot = state.tree.subscriber_snapshot(anc);
                            for (sid, flags) in snapshot {
                                if Some(sid) == source || !flags.contains(SubscriberFlags::RSP) {
                                    continue;
                                }
                                call_sink(&mut state.tree, anc, sid, topic, &value);
                            }
                        }
                    }
                } else {
                    deliver_root(&mut state.tree, SubscriberFlags::RSP, topic, &value, source);
                }
            }
        }
    }

    /// Returns `true` if `prefix` was newly added.
    fn add_prefix(&self, state: &mut EngineState, prefix: String) -> bool {
        if state.owned_prefixes.contains(&prefix) {
            return false;
        }
        state.owned_prefixes.push(prefix);
        self.refresh_topic_list(state);
        true
    }

    /// Returns `true` if `prefix` was present and removed.
    fn remove_prefix(&self, state: &mut EngineState, prefix: &str) -> bool {
        let before = state.owned_prefixes.len();
        state.owned_prefixes.retain(|p| p != prefix);
        let changed = state.owned_prefixes.len() != before;
        if changed {
            self.refresh_topic_list(state);
        }
        changed
    }

    fn refresh_topic_list(&self, state: &mut EngineState) {
        if let Ok(id) = state.tree.find(TOPIC_LIST) {
            state.tree.set_value(
                id,
                Value::str_const(topic_list::encode(&state.owned_prefixes), ValueFlags::RETAIN),
            );
        }
    }
}

fn dispatch_normal(
    tree: &mut Tree<Sink>,
    id: TopicId,
    topic_path: &str,
    value: &Value,
    source: Option<SubscriberId>,
) -> i32 {
    let mut first_status = 0;
    for anc in tree.ancestors_inclusive(id) {
        let snapshot = tree.subscriber_snapshot(anc);
        for (sid, flags) in snapshot {
            if Some(sid) == source {
                continue;
            }
            if !flags.contains(SubscriberFlags::PUB) || flags.contains(SubscriberFlags::NO_PUB) {
                continue;
            }
            if let Some(status) = call_sink(tree, anc, sid, topic_path, value) {
                if status != 0 && first_status == 0 {
                    first_status = status;
                }
            }
        }
    }
    first_status
}

fn deliver_root(
    tree: &mut Tree<Sink>,
    flag: SubscriberFlags,
    topic_str: &str,
    value: &Value,
    source: Option<SubscriberId>,
) {
    let root = tree.root();
    let snapshot = tree.subscriber_snapshot(root);
    for (sid, flags) in snapshot {
        if Some(sid) == source || !flags.contains(flag) {
            continue;
        }
        call_sink(tree, root, sid, topic_str, value);
    }
}

fn call_sink(
    tree: &mut Tree<Sink>,
    topic: TopicId,
    sub: SubscriberId,
    path: &str,
    value: &Value,
) -> Option<i32> {
    tree.subscriber_sink_mut(topic, sub).map(|s| s(path, value))
}

fn collect_meta(tree: &Tree<Sink>, id: TopicId, out: &mut Vec<(String, Arc<str>)>) {
    if let Some(m) = tree.meta(id) {
        out.push((tree.path_of(id), m.clone()));
    }
    for &c in tree.children_of(id) {
        collect_meta(tree, c, out);
    }
}
