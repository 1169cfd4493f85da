//! The continuation handed to every handler callback.

use std::cell::RefCell;
use std::fmt;
use tracing::{trace, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::handler::Handler;
use crate::pipeline::message::Message;
use crate::pipeline::node::{Chain, NodeId, Target};
use crate::pipeline::pipeline::{Mutation, Pipeline};

/// A handler's position in the chain during one `fire_*` call.
///
/// The `fire_*` methods continue the current event past this node: inbound
/// and lifecycle events toward Tail, outbound messages toward Head. A handler
/// that does not call one of them ends the event at its node.
///
/// The chain is read-locked for as long as a context exists, so structural
/// changes requested from inside a handler go through [`Context::schedule`].
pub struct Context<'a, S> {
    pipeline: &'a Pipeline<S>,
    chain: &'a Chain<S>,
    node: NodeId,
    deferred: &'a RefCell<Vec<Mutation<S>>>,
}

impl<'a, S: 'static> Context<'a, S> {
    pub(crate) fn new(
        pipeline: &'a Pipeline<S>,
        chain: &'a Chain<S>,
        node: NodeId,
        deferred: &'a RefCell<Vec<Mutation<S>>>,
    ) -> Self {
        Self {
            pipeline,
            chain,
            node,
            deferred,
        }
    }

    fn at(&self, node: NodeId) -> Context<'a, S> {
        Context { node, ..*self }
    }

    fn handler(&self) -> Option<&'a dyn Handler<S>> {
        self.chain.node(self.node).handler_ref().map(|h| h.as_ref())
    }

    /// Name of the node this context belongs to.
    pub fn name(&self) -> &'a str {
        self.chain.node(self.node).name()
    }

    /// Queue a structural change. It is applied once the outermost `fire_*`
    /// call has finished dispatching and released the chain.
    pub fn schedule(&self, mutation: Mutation<S>) {
        trace!(node = self.name(), mutation = ?mutation, "Deferred chain mutation");
        self.deferred.borrow_mut().push(mutation);
    }

    /// Start a new outbound message at Tail, as if the application sent it.
    pub fn send(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        self.at(self.chain.tail).fire_message_sent(session, msg, channel)
    }

    pub fn fire_session_opened(&self, session: &S) -> Result<()> {
        match self.chain.node(self.node).routes.opened {
            Target::Node(id) => {
                let next = self.at(id);
                match next.handler().and_then(|h| h.as_opened()) {
                    Some(listener) => next.guard(session, listener.session_opened(session, &next)),
                    None => next.fire_session_opened(session),
                }
            }
            Target::Edge => self.pipeline.edge().session_opened(session),
        }
    }

    pub fn fire_session_closed(&self, session: &S) -> Result<()> {
        match self.chain.node(self.node).routes.closed {
            Target::Node(id) => {
                let next = self.at(id);
                match next.handler().and_then(|h| h.as_closed()) {
                    Some(listener) => next.guard(session, listener.session_closed(session, &next)),
                    None => next.fire_session_closed(session),
                }
            }
            Target::Edge => self.pipeline.edge().session_closed(session),
        }
    }

    pub fn fire_exception_caught(&self, session: &S, error: PipelineError) -> Result<()> {
        match self.chain.node(self.node).routes.exception {
            Target::Node(id) => {
                let next = self.at(id);
                match next.handler().and_then(|h| h.as_exception()) {
                    Some(listener) => {
                        next.guard(session, listener.exception_caught(session, error, &next))
                    }
                    None => next.fire_exception_caught(session, error),
                }
            }
            Target::Edge => self.pipeline.edge().exception_caught(session, error),
        }
    }

    pub fn fire_message_received(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        let (target, cached) = self.chain.route_received(self.node, msg.type_id());
        self.pipeline.metrics().route_lookup(cached);
        trace!(
            from = self.name(),
            message_type = msg.type_name(),
            channel,
            cached,
            "Routing received message"
        );
        match target {
            Target::Node(id) => {
                let next = self.at(id);
                match next.handler().and_then(|h| h.as_received()) {
                    Some(listener) => next.guard(
                        session,
                        listener.message_received(session, msg, channel, &next),
                    ),
                    None => next.fire_message_received(session, msg, channel),
                }
            }
            Target::Edge => {
                self.pipeline.metrics().unclaimed_received();
                self.pipeline.edge().message_received(session, msg, channel)
            }
        }
    }

    /// Continue an outbound message toward Head.
    pub fn fire_message_sent(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        let (target, cached) = self.chain.route_sending(self.node, msg.type_id());
        self.pipeline.metrics().route_lookup(cached);
        trace!(
            from = self.name(),
            message_type = msg.type_name(),
            channel,
            cached,
            "Routing outbound message"
        );
        match target {
            Target::Node(id) => {
                let next = self.at(id);
                match next.handler().and_then(|h| h.as_sending()) {
                    Some(listener) => next.guard(
                        session,
                        listener.message_sending(session, msg, channel, &next),
                    ),
                    None => next.fire_message_sent(session, msg, channel),
                }
            }
            Target::Edge => {
                self.pipeline.metrics().outbound_at_edge();
                self.pipeline.edge().message_sent(session, msg, channel)
            }
        }
    }

    /// Turn a handler failure at this node into an exception event for the
    /// rest of the chain. Failures that were already routed pass through.
    fn guard(&self, session: &S, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(error) if error.is_dispatched() => Err(error),
            Err(error) => {
                warn!(node = self.name(), error = %error, "Handler failed");
                self.pipeline.metrics().handler_failure();
                let error = PipelineError::HandlerDispatch {
                    node: self.name().to_string(),
                    source: Box::new(error),
                };
                self.fire_exception_caught(session, error)
            }
        }
    }
}

impl<S> fmt::Debug for Context<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("node", &self.node).finish()
    }
}
