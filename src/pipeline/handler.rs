//! Handler capabilities.
//!
//! A handler implements any subset of the five capability traits and exposes
//! them through [`Handler`]. Capabilities are queried once, when the handler
//! is inserted into a pipeline, so the answers must not change afterwards.
//!
//! Every callback receives the [`Context`] of its node. Nothing is forwarded
//! implicitly: a handler that wants the event to continue down the chain must
//! call the matching `fire_*` method on the context.

use std::any::Any;

use crate::error::{PipelineError, Result};
use crate::pipeline::context::Context;
use crate::pipeline::message::{Message, TypeMatcher};

pub trait OpenedListener<S>: Send + Sync {
    fn session_opened(&self, session: &S, ctx: &Context<'_, S>) -> Result<()>;
}

pub trait ClosedListener<S>: Send + Sync {
    fn session_closed(&self, session: &S, ctx: &Context<'_, S>) -> Result<()>;
}

pub trait ExceptionListener<S>: Send + Sync {
    fn exception_caught(&self, session: &S, error: PipelineError, ctx: &Context<'_, S>)
        -> Result<()>;
}

/// Inbound payload capability.
pub trait ReceivedListener<S>: Send + Sync {
    /// Payload types this handler wants to see.
    fn receives(&self) -> TypeMatcher;

    fn message_received(
        &self,
        session: &S,
        msg: Message,
        channel: u32,
        ctx: &Context<'_, S>,
    ) -> Result<()>;
}

/// Outbound payload capability.
pub trait SendingListener<S>: Send + Sync {
    /// Payload types this handler wants to see.
    fn sends(&self) -> TypeMatcher;

    fn message_sending(
        &self,
        session: &S,
        msg: Message,
        channel: u32,
        ctx: &Context<'_, S>,
    ) -> Result<()>;
}

/// A pipeline element. Each capability accessor returns `Some(self)` for the
/// capabilities the handler implements.
///
/// ```rust
/// use network_pipeline::pipeline::{Context, Handler, Message, ReceivedListener, TypeMatcher};
/// use network_pipeline::error::Result;
///
/// struct Uppercase;
///
/// impl ReceivedListener<()> for Uppercase {
///     fn receives(&self) -> TypeMatcher {
///         TypeMatcher::of::<String>()
///     }
///
///     fn message_received(&self, session: &(), msg: Message, channel: u32, ctx: &Context<'_, ()>) -> Result<()> {
///         let text = msg.downcast::<String>().unwrap_or_default();
///         ctx.fire_message_received(session, Message::new(text.to_uppercase()), channel)
///     }
/// }
///
/// impl Handler<()> for Uppercase {
///     fn as_received(&self) -> Option<&dyn ReceivedListener<()>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Handler<S>: Send + Sync + 'static {
    fn as_opened(&self) -> Option<&dyn OpenedListener<S>> {
        None
    }

    fn as_closed(&self) -> Option<&dyn ClosedListener<S>> {
        None
    }

    fn as_exception(&self) -> Option<&dyn ExceptionListener<S>> {
        None
    }

    fn as_received(&self) -> Option<&dyn ReceivedListener<S>> {
        None
    }

    fn as_sending(&self) -> Option<&dyn SendingListener<S>> {
        None
    }

    /// Called after the handler has been linked into a pipeline.
    fn handler_added(&self, _name: &str) {}

    /// Called after the handler has been unlinked or replaced.
    fn handler_removed(&self, _name: &str) {}
}

type LifecycleFn<S> = dyn Fn(&S, &Context<'_, S>) -> Result<()> + Send + Sync;
type ExceptionFn<S> = dyn Fn(&S, PipelineError, &Context<'_, S>) -> Result<()> + Send + Sync;
type MessageFn<S> = dyn Fn(&S, Message, u32, &Context<'_, S>) -> Result<()> + Send + Sync;

/// A handler assembled from closures, one per capability.
///
/// Capabilities without a closure are not advertised, so events of that kind
/// skip the node entirely.
pub struct FnHandler<S> {
    opened: Option<Box<LifecycleFn<S>>>,
    closed: Option<Box<LifecycleFn<S>>>,
    exception: Option<Box<ExceptionFn<S>>>,
    received: Option<(TypeMatcher, Box<MessageFn<S>>)>,
    sending: Option<(TypeMatcher, Box<MessageFn<S>>)>,
}

impl<S: 'static> Default for FnHandler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> FnHandler<S> {
    pub fn new() -> Self {
        Self {
            opened: None,
            closed: None,
            exception: None,
            received: None,
            sending: None,
        }
    }

    pub fn on_opened<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.opened = Some(Box::new(f));
        self
    }

    pub fn on_closed<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.closed = Some(Box::new(f));
        self
    }

    pub fn on_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, PipelineError, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.exception = Some(Box::new(f));
        self
    }

    /// Handle inbound payloads of exactly type `T`.
    pub fn on_received<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send,
        F: Fn(&S, T, u32, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        let typed = move |session: &S, msg: Message, channel: u32, ctx: &Context<'_, S>| {
            match msg.downcast::<T>() {
                Ok(value) => f(session, value, channel, ctx),
                Err(msg) => ctx.fire_message_received(session, msg, channel),
            }
        };
        self.received = Some((TypeMatcher::of::<T>(), Box::new(typed)));
        self
    }

    /// Handle inbound payloads matched by `matcher`, still type-erased.
    pub fn on_received_any<F>(mut self, matcher: TypeMatcher, f: F) -> Self
    where
        F: Fn(&S, Message, u32, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.received = Some((matcher, Box::new(f)));
        self
    }

    /// Handle outbound payloads of exactly type `T`.
    pub fn on_sending<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send,
        F: Fn(&S, T, u32, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        let typed = move |session: &S, msg: Message, channel: u32, ctx: &Context<'_, S>| {
            match msg.downcast::<T>() {
                Ok(value) => f(session, value, channel, ctx),
                Err(msg) => ctx.fire_message_sent(session, msg, channel),
            }
        };
        self.sending = Some((TypeMatcher::of::<T>(), Box::new(typed)));
        self
    }

    /// Handle outbound payloads matched by `matcher`, still type-erased.
    pub fn on_sending_any<F>(mut self, matcher: TypeMatcher, f: F) -> Self
    where
        F: Fn(&S, Message, u32, &Context<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.sending = Some((matcher, Box::new(f)));
        self
    }
}

impl<S: 'static> OpenedListener<S> for FnHandler<S> {
    fn session_opened(&self, session: &S, ctx: &Context<'_, S>) -> Result<()> {
        match &self.opened {
            Some(f) => f(session, ctx),
            None => ctx.fire_session_opened(session),
        }
    }
}

impl<S: 'static> ClosedListener<S> for FnHandler<S> {
    fn session_closed(&self, session: &S, ctx: &Context<'_, S>) -> Result<()> {
        match &self.closed {
            Some(f) => f(session, ctx),
            None => ctx.fire_session_closed(session),
        }
    }
}

impl<S: 'static> ExceptionListener<S> for FnHandler<S> {
    fn exception_caught(
        &self,
        session: &S,
        error: PipelineError,
        ctx: &Context<'_, S>,
    ) -> Result<()> {
        match &self.exception {
            Some(f) => f(session, error, ctx),
            None => ctx.fire_exception_caught(session, error),
        }
    }
}

impl<S: 'static> ReceivedListener<S> for FnHandler<S> {
    fn receives(&self) -> TypeMatcher {
        self.received
            .as_ref()
            .map(|(matcher, _)| matcher.clone())
            .unwrap_or(TypeMatcher::OneOf(Vec::new()))
    }

    fn message_received(
        &self,
        session: &S,
        msg: Message,
        channel: u32,
        ctx: &Context<'_, S>,
    ) -> Result<()> {
        match &self.received {
            Some((_, f)) => f(session, msg, channel, ctx),
            None => ctx.fire_message_received(session, msg, channel),
        }
    }
}

impl<S: 'static> SendingListener<S> for FnHandler<S> {
    fn sends(&self) -> TypeMatcher {
        self.sending
            .as_ref()
            .map(|(matcher, _)| matcher.clone())
            .unwrap_or(TypeMatcher::OneOf(Vec::new()))
    }

    fn message_sending(
        &self,
        session: &S,
        msg: Message,
        channel: u32,
        ctx: &Context<'_, S>,
    ) -> Result<()> {
        match &self.sending {
            Some((_, f)) => f(session, msg, channel, ctx),
            None => ctx.fire_message_sent(session, msg, channel),
        }
    }
}

impl<S: 'static> Handler<S> for FnHandler<S> {
    fn as_opened(&self) -> Option<&dyn OpenedListener<S>> {
        self.opened.as_ref().map(|_| self as &dyn OpenedListener<S>)
    }

    fn as_closed(&self) -> Option<&dyn ClosedListener<S>> {
        self.closed.as_ref().map(|_| self as &dyn ClosedListener<S>)
    }

    fn as_exception(&self) -> Option<&dyn ExceptionListener<S>> {
        self.exception.as_ref().map(|_| self as &dyn ExceptionListener<S>)
    }

    fn as_received(&self) -> Option<&dyn ReceivedListener<S>> {
        self.received.as_ref().map(|_| self as &dyn ReceivedListener<S>)
    }

    fn as_sending(&self) -> Option<&dyn SendingListener<S>> {
        self.sending.as_ref().map(|_| self as &dyn SendingListener<S>)
    }
}
