//! # Error Types
//!
//! Error handling for the event pipeline, the framers and the transport glue.
//!
//! ## Error Categories
//! - **Chain mutation**: duplicate or missing handler names. These are
//!   synchronous and all-or-nothing: the chain is untouched when they occur.
//! - **Dispatch**: a handler failed while processing an event, or a message
//!   reached a chain boundary that cannot deliver it.
//! - **Framing**: declared frame lengths over the configured limit, malformed
//!   protocol framing.
//! - **Transport**: unsupported reliability, closed connections, I/O.
//!
//! ## Example Usage
//! ```rust
//! use network_pipeline::error::{PipelineError, Result};
//!
//! fn check_name(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(PipelineError::Custom("empty handler name".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_name("codec").is_ok());
//! ```

use crate::core::reliability::Reliability;
use std::io;
use thiserror::Error;

/// Error message constants to avoid allocating on hot error paths.
pub mod constants {
    /// Lock errors
    pub const ERR_CHAIN_WRITE_LOCK: &str = "Failed to acquire write lock on pipeline chain";
    pub const ERR_CHAIN_READ_LOCK: &str = "Failed to acquire read lock on pipeline chain";
    pub const ERR_BUFFER_LOCK: &str = "Failed to acquire connection buffer lock";

    /// Dispatch errors
    pub const ERR_UNDELIVERABLE: &str = "Message reached a chain boundary unclaimed";
}

/// Primary error type for pipeline, framing and transport operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Handler with name \"{0}\" already present")]
    DuplicateName(String),

    #[error("No handler with name \"{0}\"")]
    NodeNotFound(String),

    /// A handler failed while processing an event. Raised once, at the node
    /// that failed; it is passed through unchanged by every upstream node.
    #[error("Handler \"{node}\" failed: {source}")]
    HandlerDispatch {
        node: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Undeliverable message of type {type_name} on channel {channel}")]
    Undeliverable {
        type_name: &'static str,
        channel: u32,
    },

    #[error("Unsupported reliability: {0:?}")]
    UnsupportedReliability(Reliability),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synchronization primitive poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Custom error: {0}")]
    Custom(String),
}

impl PipelineError {
    /// Whether this error has already been routed through the exception
    /// chain, and must be propagated as-is.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, PipelineError::HandlerDispatch { .. })
    }

    /// The innermost cause, looking through any `HandlerDispatch` wrapper.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::HandlerDispatch { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
