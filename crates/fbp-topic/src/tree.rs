//! Arena-backed topic tree: stable integer handles instead of intrusive
//! parent/child/sibling pointers.

use std::sync::atomic::{AtomicU64, Ordering};

use fbp_value::{FbpError, Result, SubscriberFlags, Value};

use crate::path::{self, MAX_PATH_LEN};

/// A stable handle to a node in a [`Tree`]. Never reused across the
/// lifetime of the tree that issued it, even if the underlying tree grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId(u32);

impl TopicId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A handle identifying one subscriber registration, unique within a
/// [`Tree`] for its lifetime. Stands in for the legacy "(callback, context)
/// pointer pair" identity: unsubscribe addresses a registration by this id
/// rather than by re-supplying the original callback pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber<S> {
    id: SubscriberId,
    flags: SubscriberFlags,
    sink: S,
}

struct TopicNode<S> {
    name: String,
    parent: Option<TopicId>,
    children: Vec<TopicId>,
    value: Value,
    meta: Option<std::sync::Arc<str>>,
    subscribers: Vec<Subscriber<S>>,
}

impl<S> TopicNode<S> {
    fn new(name: String, parent: Option<TopicId>) -> TopicNode<S> {
        TopicNode {
            name,
            parent,
            children: Vec::new(),
            value: Value::null(),
            meta: None,
            subscribers: Vec::new(),
        }
    }
}

/// A hierarchical topic store. `S` is the subscriber "sink" payload type —
/// the tree knows nothing about how a sink is invoked; that's the PubSub
/// engine's job. The tree owns structure, retained values, metadata, and
/// subscriber bookkeeping only.
pub struct Tree<S> {
    nodes: Vec<TopicNode<S>>,
    next_subscriber: AtomicU64,
}

impl<S> Default for Tree<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Tree<S> {
    #[must_use]
    pub fn new() -> Tree<S> {
        Tree {
            nodes: vec![TopicNode::new(String::new(), None)],
            next_subscriber: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn root(&self) -> TopicId {
        TopicId(0)
    }

    fn node(&self, id: TopicId) -> &TopicNode<S> {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: TopicId) -> &mut TopicNode<S> {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn parent_of(&self, id: TopicId) -> Option<TopicId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn children_of(&self, id: TopicId) -> &[TopicId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn name_of(&self, id: TopicId) -> &str {
        &self.node(id).name
    }

    /// Reconstruct the full `/`-joined path of `id` by walking parents.
    #[must_use]
    pub fn path_of(&self, id: TopicId) -> String {
        let mut segs = Vec::new();
        let mut cur = id;
        loop {
            let node = self.node(cur);
            if node.parent.is_none() {
                break;
            }
            segs.push(node.name.as_str());
            cur = node.parent.unwrap();
        }
        segs.reverse();
        segs.join("/")
    }

    /// Find `path`, creating any missing intermediate or leaf topics.
    pub fn find(&mut self, path: &str) -> Result<TopicId> {
        let segs = path::segments(path)?;
        let mut cur = self.root();
        for seg in segs {
            cur = match self.child_named(cur, seg) {
                Some(id) => id,
                None => self.create_child(cur, seg)?,
            };
        }
        Ok(cur)
    }

    /// Find `path` without creating anything; `None` if any segment is
    /// missing.
    #[must_use]
    pub fn find_existing(&self, path: &str) -> Option<TopicId> {
        let segs = path::segments(path).ok()?;
        let mut cur = self.root();
        for seg in segs {
            cur = self.child_named(cur, seg)?;
        }
        Some(cur)
    }

    /// Strip any reserved trailing character, then pop segments from the
    /// right until the remaining prefix exists. Always returns at least
    /// the root.
    #[must_use]
    pub fn find_existing_base(&self, path: &str) -> TopicId {
        let (base, _) = path::classify(path);
        let Ok(segs) = path::segments(base) else {
            return self.root();
        };
        for end in (0..=segs.len()).rev() {
            if let Some(id) = self.find_existing(&segs[..end].join("/")) {
                return id;
            }
        }
        self.root()
    }

    fn child_named(&self, parent: TopicId, name: &str) -> Option<TopicId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    fn create_child(&mut self, parent: TopicId, name: &str) -> Result<TopicId> {
        if self.path_of(parent).len() + 1 + name.len() > MAX_PATH_LEN {
            return Err(FbpError::InvalidParameter(format!(
                "topic path under {:?} would exceed max length",
                self.path_of(parent)
            )));
        }
        let id = TopicId(u32::try_from(self.nodes.len()).map_err(|_| {
            FbpError::NotEnoughMemory("topic arena exhausted its u32 index space".into())
        })?);
        self.nodes.push(TopicNode::new(name.to_string(), Some(parent)));
        self.node_mut(parent).children.push(id);
        Ok(id)
    }

    #[must_use]
    pub fn value(&self, id: TopicId) -> &Value {
        &self.node(id).value
    }

    pub fn set_value(&mut self, id: TopicId, value: Value) {
        self.node_mut(id).value = value;
    }

    #[must_use]
    pub fn meta(&self, id: TopicId) -> Option<&std::sync::Arc<str>> {
        self.node(id).meta.as_ref()
    }

    pub fn set_meta(&mut self, id: TopicId, meta: std::sync::Arc<str>) {
        self.node_mut(id).meta = Some(meta);
    }

    /// Snapshot, in stable (insertion) order, the ids of every descendant of
    /// `id` (including `id` itself) that carries a non-null retained value.
    /// This is a point-in-time copy, so it is unaffected by tree mutation
    /// that happens while the caller iterates the result.
    #[must_use]
    pub fn retained_subtree(&self, id: TopicId) -> Vec<TopicId> {
        let mut out = Vec::new();
        self.collect_retained(id, &mut out);
        out
    }

    fn collect_retained(&self, id: TopicId, out: &mut Vec<TopicId>) {
        let node = self.node(id);
        if !node.value.is_null() {
            out.push(id);
        }
        for &child in &node.children {
            self.collect_retained(child, out);
        }
    }

    /// Ids from `id` up to and including the root, nearest first — the
    /// order error/metadata dispatch walks.
    #[must_use]
    pub fn ancestors_inclusive(&self, id: TopicId) -> Vec<TopicId> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            out.push(c);
            cur = self.node(c).parent;
        }
        out
    }

    pub fn add_subscriber(&mut self, id: TopicId, flags: SubscriberFlags, sink: S) -> SubscriberId {
        let sid = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        self.node_mut(id).subscribers.push(Subscriber {
            id: sid,
            flags,
            sink,
        });
        sid
    }

    /// Remove one subscriber registration from `id`. Returns whether it was
    /// present.
    pub fn remove_subscriber(&mut self, id: TopicId, sub: SubscriberId) -> bool {
        let subs = &mut self.node_mut(id).subscribers;
        let before = subs.len();
        subs.retain(|s| s.id != sub);
        subs.len() != before
    }

    /// Remove `sub` from every topic in the tree. Returns the number of
    /// topics it was removed from.
    pub fn remove_subscriber_everywhere(&mut self, sub: SubscriberId) -> usize {
        let mut count = 0;
        for node in &mut self.nodes {
            let before = node.subscribers.len();
            node.subscribers.retain(|s| s.id != sub);
            count += usize::from(node.subscribers.len() != before);
        }
        count
    }

    /// Snapshot of `(id, flags)` for every subscriber on `id`, in
    /// registration order. Taking a snapshot before dispatch, rather than
    /// iterating the live list, is what makes removal-during-dispatch safe:
    /// a subscriber that unsubscribes itself (or another) mid-dispatch
    /// simply becomes a dangling id that [`Tree::subscriber_sink_mut`]
    /// reports as absent.
    #[must_use]
    pub fn subscriber_snapshot(&self, id: TopicId) -> Vec<(SubscriberId, SubscriberFlags)> {
        self.node(id)
            .subscribers
            .iter()
            .map(|s| (s.id, s.flags))
            .collect()
    }

    pub fn subscriber_sink_mut(&mut self, id: TopicId, sub: SubscriberId) -> Option<&mut S> {
        self.node_mut(id)
            .subscribers
            .iter_mut()
            .find(|s| s.id == sub)
            .map(|s| &mut s.sink)
    }
}
