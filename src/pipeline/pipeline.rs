//! # Pipeline
//!
//! The ordered handler chain of one connection, bounded by Head and Tail.
//!
//! ## Locking
//! Structural mutation holds the chain's write lock; firing holds the read
//! lock. Firings on one pipeline may overlap each other but never a mutation.
//! Every successful mutation recomputes all routes before the lock is
//! released, so no firing ever observes a stale route.
//!
//! ## Entry points
//! Inbound and lifecycle events enter at Head and travel toward Tail.
//! Outbound messages enter at Tail and travel toward Head.

use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument, warn};

use crate::error::constants::{ERR_CHAIN_READ_LOCK, ERR_CHAIN_WRITE_LOCK};
use crate::error::{PipelineError, Result};
use crate::pipeline::context::Context;
use crate::pipeline::edge::{EdgeListener, LoggingEdgeListener};
use crate::pipeline::handler::Handler;
use crate::pipeline::message::Message;
use crate::pipeline::node::{Chain, Entry, NodeId, Target};
use crate::utils::metrics::{EventKind, Metrics, Timer};

/// A structural change to a pipeline, applied all-or-nothing.
pub enum Mutation<S> {
    AddFirst {
        name: String,
        handler: Arc<dyn Handler<S>>,
    },
    AddLast {
        name: String,
        handler: Arc<dyn Handler<S>>,
    },
    Replace {
        name: String,
        handler: Arc<dyn Handler<S>>,
    },
    Remove {
        name: String,
    },
}

impl<S: 'static> Mutation<S> {
    pub fn add_first(name: impl Into<String>, handler: impl Handler<S>) -> Self {
        Mutation::AddFirst {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn add_last(name: impl Into<String>, handler: impl Handler<S>) -> Self {
        Mutation::AddLast {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn replace(name: impl Into<String>, handler: impl Handler<S>) -> Self {
        Mutation::Replace {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Mutation::Remove { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Mutation::AddFirst { name, .. }
            | Mutation::AddLast { name, .. }
            | Mutation::Replace { name, .. }
            | Mutation::Remove { name } => name,
        }
    }
}

impl<S> fmt::Debug for Mutation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, name) = match self {
            Mutation::AddFirst { name, .. } => ("AddFirst", name),
            Mutation::AddLast { name, .. } => ("AddLast", name),
            Mutation::Replace { name, .. } => ("Replace", name),
            Mutation::Remove { name } => ("Remove", name),
        };
        f.debug_tuple(op).field(name).finish()
    }
}

/// Handler names in both traversal directions, read under one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    /// Head to Tail.
    pub forward: Vec<String>,
    /// Tail to Head.
    pub backward: Vec<String>,
}

/// What a committed mutation linked and unlinked. Hooks run after the chain
/// lock is released so they may touch the pipeline themselves.
struct Applied<S> {
    added: Option<Entry<S>>,
    removed: Option<Entry<S>>,
}

impl<S: 'static> Applied<S> {
    fn notify(&self) {
        if let Some(entry) = &self.removed {
            entry.handler.handler_removed(&entry.name);
        }
        if let Some(entry) = &self.added {
            entry.handler.handler_added(&entry.name);
        }
    }
}

/// Per-connection chain of handlers.
pub struct Pipeline<S> {
    chain: RwLock<Chain<S>>,
    edge: Box<dyn EdgeListener<S>>,
    metrics: Metrics,
    anonymous: AtomicU64,
}

impl<S: 'static> Default for Pipeline<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> Pipeline<S> {
    /// An empty pipeline with the logging edge listener.
    pub fn new() -> Self {
        Self::with_edge(LoggingEdgeListener)
    }

    /// An empty pipeline whose boundary events go to `edge`.
    pub fn with_edge(edge: impl EdgeListener<S> + 'static) -> Self {
        Self {
            chain: RwLock::new(Chain::new()),
            edge: Box::new(edge),
            metrics: Metrics::new(),
            anonymous: AtomicU64::new(0),
        }
    }

    pub(crate) fn edge(&self) -> &dyn EdgeListener<S> {
        self.edge.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn read_chain(&self) -> Result<RwLockReadGuard<'_, Chain<S>>> {
        self.chain
            .read()
            .map_err(|_| PipelineError::LockPoisoned(ERR_CHAIN_READ_LOCK))
    }

    fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Chain<S>>> {
        self.chain
            .write()
            .map_err(|_| PipelineError::LockPoisoned(ERR_CHAIN_WRITE_LOCK))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert `handler` directly after Head.
    #[instrument(level = "debug", skip(self, handler))]
    pub fn add_first(&self, name: &str, handler: impl Handler<S>) -> Result<()> {
        self.commit(Mutation::AddFirst {
            name: name.to_string(),
            handler: Arc::new(handler),
        })
        .map(|_| ())
    }

    /// Insert `handler` directly before Tail.
    #[instrument(level = "debug", skip(self, handler))]
    pub fn add_last(&self, name: &str, handler: impl Handler<S>) -> Result<()> {
        self.commit(Mutation::AddLast {
            name: name.to_string(),
            handler: Arc::new(handler),
        })
        .map(|_| ())
    }

    /// Insert after Head under a generated name, which is returned.
    pub fn add_first_anonymous(&self, handler: impl Handler<S>) -> Result<String> {
        let name = self.next_anonymous_name();
        self.add_first(&name, handler)?;
        Ok(name)
    }

    /// Insert before Tail under a generated name, which is returned.
    pub fn add_last_anonymous(&self, handler: impl Handler<S>) -> Result<String> {
        let name = self.next_anonymous_name();
        self.add_last(&name, handler)?;
        Ok(name)
    }

    /// Swap the handler named `name` in place, returning the old one.
    #[instrument(level = "debug", skip(self, handler))]
    pub fn replace(&self, name: &str, handler: impl Handler<S>) -> Result<Arc<dyn Handler<S>>> {
        self.commit(Mutation::Replace {
            name: name.to_string(),
            handler: Arc::new(handler),
        })?
        .ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))
    }

    /// Unlink the handler named `name`, returning it.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, name: &str) -> Result<Arc<dyn Handler<S>>> {
        self.commit(Mutation::Remove {
            name: name.to_string(),
        })?
        .ok_or_else(|| PipelineError::NodeNotFound(name.to_string()))
    }

    /// Apply one mutation. Returns the unlinked handler for replace/remove.
    pub fn apply(&self, mutation: Mutation<S>) -> Result<Option<Arc<dyn Handler<S>>>> {
        self.commit(mutation)
    }

    fn next_anonymous_name(&self) -> String {
        format!("{:x}", self.anonymous.fetch_add(1, Ordering::Relaxed))
    }

    fn commit(&self, mutation: Mutation<S>) -> Result<Option<Arc<dyn Handler<S>>>> {
        let _timer = Timer::start("pipeline.mutation");
        let applied = {
            let mut chain = self.write_chain()?;
            Self::apply_to(&mut chain, mutation)?
        };
        self.metrics.mutation();
        applied.notify();
        Ok(applied.removed.map(|entry| entry.handler))
    }

    fn apply_to(chain: &mut Chain<S>, mutation: Mutation<S>) -> Result<Applied<S>> {
        match mutation {
            Mutation::AddFirst { name, handler } => {
                let name: Arc<str> = Arc::from(name);
                chain.insert_after_head(name.clone(), handler.clone())?;
                debug!(node = &*name, "Handler added first");
                Ok(Applied {
                    added: Some(Entry { name, handler }),
                    removed: None,
                })
            }
            Mutation::AddLast { name, handler } => {
                let name: Arc<str> = Arc::from(name);
                chain.insert_before_tail(name.clone(), handler.clone())?;
                debug!(node = &*name, "Handler added last");
                Ok(Applied {
                    added: Some(Entry { name, handler }),
                    removed: None,
                })
            }
            Mutation::Replace { name, handler } => {
                let old = chain.replace(&name, handler.clone())?;
                debug!(node = name.as_str(), "Handler replaced");
                Ok(Applied {
                    added: Some(Entry {
                        name: old.name.clone(),
                        handler,
                    }),
                    removed: Some(old),
                })
            }
            Mutation::Remove { name } => {
                let old = chain.remove(&name)?;
                debug!(node = name.as_str(), "Handler removed");
                Ok(Applied {
                    added: None,
                    removed: Some(old),
                })
            }
        }
    }

    /// Apply mutations queued by handlers during a firing, in order. Every
    /// mutation is attempted; the first failure is returned.
    fn apply_deferred(&self, queued: Vec<Mutation<S>>) -> Result<()> {
        let mut first_error = None;
        let mut committed = Vec::with_capacity(queued.len());
        {
            let mut chain = self.write_chain()?;
            for mutation in queued {
                let name = mutation.name().to_string();
                match Self::apply_to(&mut chain, mutation) {
                    Ok(applied) => committed.push(applied),
                    Err(error) => {
                        warn!(node = %name, error = %error, "Deferred mutation failed");
                        first_error.get_or_insert(error);
                    }
                }
            }
        }
        for applied in &committed {
            self.metrics.mutation();
            applied.notify();
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.read_chain()?.find(name).is_some())
    }

    /// Number of handlers, excluding Head and Tail.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_chain()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Handler names from Head to Tail.
    pub fn names(&self) -> Result<Vec<String>> {
        let chain = self.read_chain()?;
        Ok(Self::names_of(&chain, chain.forward_ids()))
    }

    pub fn snapshot(&self) -> Result<ChainSnapshot> {
        let chain = self.read_chain()?;
        Ok(ChainSnapshot {
            forward: Self::names_of(&chain, chain.forward_ids()),
            backward: Self::names_of(&chain, chain.backward_ids()),
        })
    }

    fn names_of(chain: &Chain<S>, ids: Vec<NodeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| chain.node(id).name().to_string())
            .collect()
    }

    /// Name of the handler an inbound `T` fired now would reach first, or
    /// `None` if it would go straight to the edge.
    pub fn resolve_received<T: 'static>(&self) -> Result<Option<String>> {
        let chain = self.read_chain()?;
        let (target, _) = chain.route_received(chain.head, TypeId::of::<T>());
        Ok(Self::target_name(&chain, target))
    }

    /// Name of the handler an outbound `T` sent now would reach first.
    pub fn resolve_sending<T: 'static>(&self) -> Result<Option<String>> {
        let chain = self.read_chain()?;
        let (target, _) = chain.route_sending(chain.tail, TypeId::of::<T>());
        Ok(Self::target_name(&chain, target))
    }

    fn target_name(chain: &Chain<S>, target: Target) -> Option<String> {
        match target {
            Target::Node(id) => Some(chain.node(id).name().to_string()),
            Target::Edge => None,
        }
    }

    // ------------------------------------------------------------------
    // Firing
    // ------------------------------------------------------------------

    /// Run `dispatch` under the read lock with a context positioned at Head
    /// or Tail, then apply whatever the handlers scheduled.
    fn fire<F>(&self, from_tail: bool, dispatch: F) -> Result<()>
    where
        F: FnOnce(&Context<'_, S>) -> Result<()>,
    {
        let deferred = RefCell::new(Vec::new());
        let result = {
            let chain = self.read_chain()?;
            let start = if from_tail { chain.tail } else { chain.head };
            let ctx = Context::new(self, &chain, start, &deferred);
            dispatch(&ctx)
        };
        let queued = deferred.into_inner();
        if queued.is_empty() {
            return result;
        }
        let applied = self.apply_deferred(queued);
        result.and(applied)
    }

    pub fn fire_session_opened(&self, session: &S) -> Result<()> {
        self.metrics.event_fired(EventKind::Opened);
        self.fire(false, |ctx| ctx.fire_session_opened(session))
    }

    /// Fire the closed event, then unlink every handler. The pipeline is
    /// empty afterwards and each handler sees `handler_removed`.
    pub fn fire_session_closed(&self, session: &S) -> Result<()> {
        self.metrics.event_fired(EventKind::Closed);
        let result = self.fire(false, |ctx| ctx.fire_session_closed(session));
        let removed = self.write_chain()?.clear();
        debug!(handlers = removed.len(), "Pipeline cleared after close");
        for entry in &removed {
            entry.handler.handler_removed(&entry.name);
        }
        result
    }

    pub fn fire_exception_caught(&self, session: &S, error: PipelineError) -> Result<()> {
        self.metrics.event_fired(EventKind::Exception);
        self.fire(false, |ctx| ctx.fire_exception_caught(session, error))
    }

    pub fn fire_message_received(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        self.metrics.event_fired(EventKind::Received);
        self.fire(false, |ctx| ctx.fire_message_received(session, msg, channel))
    }

    /// Send an outbound message. It enters at Tail and travels toward Head.
    pub fn fire_message_sent(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        self.metrics.event_fired(EventKind::Sent);
        self.fire(true, |ctx| ctx.fire_message_sent(session, msg, channel))
    }
}

impl<S> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<S: 'static> Pipeline<S> {
    /// Run `check` against the locked chain.
    pub(crate) fn with_chain<R>(&self, check: impl FnOnce(&Chain<S>) -> R) -> R {
        let chain = self.chain.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        check(&chain)
    }
}
