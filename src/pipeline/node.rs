//! The chain: an arena of nodes linked by index, bounded by Head and Tail.
//!
//! Every node carries its routing table. Lifecycle routes (first node after
//! this one implementing the capability) are computed eagerly on rebuild.
//! Payload routes are computed lazily per exact payload type and cached until
//! the next structural change, which clears every cache in the chain.

use slab::Slab;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

use crate::error::{PipelineError, Result};
use crate::pipeline::handler::Handler;
use crate::pipeline::message::TypeMatcher;

pub(crate) type NodeId = usize;

/// Where an event goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Node(NodeId),
    /// Off the end of the chain, to the pipeline's edge listener.
    Edge,
}

pub(crate) enum NodeKind<S> {
    Head,
    Tail,
    Handler {
        name: Arc<str>,
        handler: Arc<dyn Handler<S>>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Capabilities {
    opened: bool,
    closed: bool,
    exception: bool,
}

pub(crate) struct Routes {
    pub(crate) opened: Target,
    pub(crate) closed: Target,
    pub(crate) exception: Target,
    received: RwLock<HashMap<TypeId, Target>>,
    sending: RwLock<HashMap<TypeId, Target>>,
}

impl Routes {
    fn new() -> Self {
        Self {
            opened: Target::Edge,
            closed: Target::Edge,
            exception: Target::Edge,
            received: RwLock::new(HashMap::new()),
            sending: RwLock::new(HashMap::new()),
        }
    }

    fn clear_payload_routes(&mut self) {
        self.received
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.sending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

pub(crate) struct Node<S> {
    pub(crate) kind: NodeKind<S>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) routes: Routes,
    receives: Option<TypeMatcher>,
    sends: Option<TypeMatcher>,
    caps: Capabilities,
}

impl<S: 'static> Node<S> {
    fn sentinel(kind: NodeKind<S>) -> Self {
        Self {
            kind,
            prev: None,
            next: None,
            routes: Routes::new(),
            receives: None,
            sends: None,
            caps: Capabilities::default(),
        }
    }

    /// Wrap a handler, reading its capabilities once.
    pub(crate) fn handler(name: Arc<str>, handler: Arc<dyn Handler<S>>) -> Self {
        let caps = Capabilities {
            opened: handler.as_opened().is_some(),
            closed: handler.as_closed().is_some(),
            exception: handler.as_exception().is_some(),
        };
        let receives = handler.as_received().map(|l| l.receives());
        let sends = handler.as_sending().map(|l| l.sends());
        Self {
            kind: NodeKind::Handler { name, handler },
            prev: None,
            next: None,
            routes: Routes::new(),
            receives,
            sends,
            caps,
        }
    }

    pub(crate) fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Head => "head",
            NodeKind::Tail => "tail",
            NodeKind::Handler { name, .. } => name,
        }
    }

    pub(crate) fn handler_ref(&self) -> Option<&Arc<dyn Handler<S>>> {
        match &self.kind {
            NodeKind::Handler { handler, .. } => Some(handler),
            _ => None,
        }
    }

    fn is_named(&self, wanted: &str) -> bool {
        matches!(&self.kind, NodeKind::Handler { name, .. } if &**name == wanted)
    }

    fn can_receive(&self, id: TypeId) -> bool {
        self.receives.as_ref().is_some_and(|m| m.matches(id))
    }

    fn can_send(&self, id: TypeId) -> bool {
        self.sends.as_ref().is_some_and(|m| m.matches(id))
    }
}

/// A named handler, as linked into or unlinked from the chain.
pub(crate) struct Entry<S> {
    pub(crate) name: Arc<str>,
    pub(crate) handler: Arc<dyn Handler<S>>,
}

pub(crate) struct Chain<S> {
    nodes: Slab<Node<S>>,
    pub(crate) head: NodeId,
    pub(crate) tail: NodeId,
}

impl<S: 'static> Chain<S> {
    pub(crate) fn new() -> Self {
        let mut nodes = Slab::with_capacity(8);
        let head = nodes.insert(Node::sentinel(NodeKind::Head));
        let tail = nodes.insert(Node::sentinel(NodeKind::Tail));
        nodes[head].next = Some(tail);
        nodes[tail].prev = Some(head);
        let mut chain = Self { nodes, head, tail };
        chain.rebuild();
        chain
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<S> {
        &self.nodes[id]
    }

    /// Number of handler nodes, sentinels excluded.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - 2
    }

    /// Handler node ids from Head to Tail.
    pub(crate) fn forward_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.len());
        let mut cursor = self.nodes[self.head].next;
        while let Some(id) = cursor {
            if id == self.tail {
                break;
            }
            ids.push(id);
            cursor = self.nodes[id].next;
        }
        ids
    }

    /// Handler node ids from Tail to Head.
    pub(crate) fn backward_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.len());
        let mut cursor = self.nodes[self.tail].prev;
        while let Some(id) = cursor {
            if id == self.head {
                break;
            }
            ids.push(id);
            cursor = self.nodes[id].prev;
        }
        ids
    }

    pub(crate) fn find(&self, name: &str) -> Option<NodeId> {
        self.forward_ids()
            .into_iter()
            .find(|&id| self.nodes[id].is_named(name))
    }

    pub(crate) fn insert_after_head(
        &mut self,
        name: Arc<str>,
        handler: Arc<dyn Handler<S>>,
    ) -> Result<()> {
        self.ensure_absent(&name)?;
        let head = self.head;
        self.link_after(head, Node::handler(name, handler));
        self.rebuild();
        Ok(())
    }

    pub(crate) fn insert_before_tail(
        &mut self,
        name: Arc<str>,
        handler: Arc<dyn Handler<S>>,
    ) -> Result<()> {
        self.ensure_absent(&name)?;
        let before = self.nodes[self.tail].prev.unwrap_or(self.head);
        self.link_after(before, Node::handler(name, handler));
        self.rebuild();
        Ok(())
    }

    /// Swap the handler in place; the node keeps its position and links.
    pub(crate) fn replace(
        &mut self,
        name: &str,
        handler: Arc<dyn Handler<S>>,
    ) -> Result<Entry<S>> {
        let id = self
            .find(name)
            .ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))?;
        let slot = &mut self.nodes[id];
        let mut fresh = Node::handler(Arc::from(name), handler);
        fresh.prev = slot.prev;
        fresh.next = slot.next;
        let old = std::mem::replace(slot, fresh);
        self.rebuild();
        Self::detach(old).ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))
    }

    pub(crate) fn remove(&mut self, name: &str) -> Result<Entry<S>> {
        let id = self
            .find(name)
            .ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))?;
        let node = self.nodes.remove(id);
        if let Some(prev) = node.prev {
            self.nodes[prev].next = node.next;
        }
        if let Some(next) = node.next {
            self.nodes[next].prev = node.prev;
        }
        self.rebuild();
        Self::detach(node).ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))
    }

    /// Unlink every handler, leaving only Head and Tail.
    pub(crate) fn clear(&mut self) -> Vec<Entry<S>> {
        let ids = self.forward_ids();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            removed.extend(Self::detach(self.nodes.remove(id)));
        }
        let (head, tail) = (self.head, self.tail);
        self.nodes[head].next = Some(tail);
        self.nodes[tail].prev = Some(head);
        self.rebuild();
        removed
    }

    fn detach(node: Node<S>) -> Option<Entry<S>> {
        match node.kind {
            NodeKind::Handler { name, handler } => Some(Entry { name, handler }),
            NodeKind::Head | NodeKind::Tail => None,
        }
    }

    fn ensure_absent(&self, name: &str) -> Result<()> {
        match self.find(name) {
            Some(_) => Err(PipelineError::DuplicateName(name.to_string())),
            None => Ok(()),
        }
    }

    fn link_after(&mut self, at: NodeId, mut node: Node<S>) -> NodeId {
        let next = self.nodes[at].next;
        node.prev = Some(at);
        node.next = next;
        let id = self.nodes.insert(node);
        self.nodes[at].next = Some(id);
        if let Some(next) = next {
            self.nodes[next].prev = Some(id);
        }
        id
    }

    /// Recompute lifecycle routes and drop every payload route cache.
    ///
    /// Walks Tail to Head carrying the nearest capable node seen so far, which
    /// yields for each node the first capable node after it.
    pub(crate) fn rebuild(&mut self) {
        let mut opened = Target::Edge;
        let mut closed = Target::Edge;
        let mut exception = Target::Edge;

        let mut cursor = Some(self.tail);
        while let Some(id) = cursor {
            let node = &mut self.nodes[id];
            node.routes.opened = opened;
            node.routes.closed = closed;
            node.routes.exception = exception;
            node.routes.clear_payload_routes();

            if node.caps.opened {
                opened = Target::Node(id);
            }
            if node.caps.closed {
                closed = Target::Node(id);
            }
            if node.caps.exception {
                exception = Target::Node(id);
            }
            cursor = node.prev;
        }
        trace!(handlers = self.len(), "Rebuilt pipeline routes");
    }

    /// Next node after `from` accepting inbound payloads of type `id`.
    /// Returns the target and whether it came from the cache.
    pub(crate) fn route_received(&self, from: NodeId, id: TypeId) -> (Target, bool) {
        let cache = &self.nodes[from].routes.received;
        if let Some(target) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return (*target, true);
        }
        let target = self.scan_received(from, id);
        cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, target);
        (target, false)
    }

    /// Next node before `from` accepting outbound payloads of type `id`.
    pub(crate) fn route_sending(&self, from: NodeId, id: TypeId) -> (Target, bool) {
        let cache = &self.nodes[from].routes.sending;
        if let Some(target) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return (*target, true);
        }
        let target = self.scan_sending(from, id);
        cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, target);
        (target, false)
    }

    /// Uncached forward scan toward Tail.
    pub(crate) fn scan_received(&self, from: NodeId, id: TypeId) -> Target {
        let mut cursor = self.nodes[from].next;
        while let Some(current) = cursor {
            if current == self.tail {
                break;
            }
            let node = &self.nodes[current];
            if node.can_receive(id) {
                return Target::Node(current);
            }
            cursor = node.next;
        }
        Target::Edge
    }

    /// Uncached backward scan toward Head.
    pub(crate) fn scan_sending(&self, from: NodeId, id: TypeId) -> Target {
        let mut cursor = self.nodes[from].prev;
        while let Some(current) = cursor {
            if current == self.head {
                break;
            }
            let node = &self.nodes[current];
            if node.can_send(id) {
                return Target::Node(current);
            }
            cursor = node.prev;
        }
        Target::Edge
    }

    #[cfg(test)]
    pub(crate) fn cached_received(&self, from: NodeId, id: TypeId) -> Option<Target> {
        self.nodes[from]
            .routes
            .received
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }
}
