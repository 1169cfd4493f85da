//! # Event Pipeline
//!
//! A per-connection chain of handlers between a Head and a Tail sentinel.
//!
//! ## Components
//! - **Message**: owned, type-erased payloads tagged with their exact type
//! - **Handler**: capability traits a handler implements any subset of
//! - **Context**: explicit continuation passed to every callback
//! - **Pipeline**: chain ownership, mutation and event entry points
//! - **EdgeListener**: terminal behavior past Head and Tail
//!
//! ## Routing
//! Lifecycle events go to the next node implementing the capability.
//! Payload events go to the next node whose [`TypeMatcher`] accepts the
//! payload's exact runtime type; that lookup is cached per node and per type
//! until the chain changes.

pub mod context;
pub mod edge;
pub mod handler;
pub mod message;
mod node;
#[allow(clippy::module_inception)]
pub mod pipeline;


pub use context::Context;
pub use edge::{EdgeListener, LoggingEdgeListener};
pub use handler::{
    ClosedListener, ExceptionListener, FnHandler, Handler, OpenedListener, ReceivedListener,
    SendingListener,
};
pub use message::{Message, TypeKey, TypeMatcher};
pub use pipeline::{ChainSnapshot, Mutation, Pipeline};
