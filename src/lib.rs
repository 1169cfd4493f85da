//! # Network Pipeline
//!
//! An ordered, per-connection chain of pluggable handlers for network
//! protocols, and the framers that turn byte streams into channel-tagged
//! frames and back.
//!
//! ## Architecture
//! - **core**: frames, the framer contract, the default length-prefixed wire
//!   format, a header/body framer and a Tokio codec
//! - **pipeline**: handlers, the dispatch engine and its routing caches
//! - **transport**: the transport-engine seam, per-connection glue and an
//!   async stream driver
//! - **config**: TOML/env configuration with validation
//! - **utils**: logging setup and metrics
//!
//! ## Event flow
//! ```text
//! bytes -> Framer::unpack -> Frame -> Head -> ... handlers ... -> Tail -> edge
//! edge <- Head <- ... handlers ... <- Tail <- Connection::send
//!   \-> Framer::pack -> bytes
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use network_pipeline::core::frame::Frame;
//! use network_pipeline::core::framer::LengthPrefixedFramer;
//! use network_pipeline::pipeline::{Context, FnHandler};
//! use network_pipeline::transport::{Connection, StaticTransport};
//!
//! // Echo every inbound frame back on the same channel.
//! let conn = Connection::new((), Arc::new(LengthPrefixedFramer::new()), Arc::new(StaticTransport::tcp()));
//! conn.pipeline()
//!     .add_last(
//!         "echo",
//!         FnHandler::new().on_received::<Frame, _>(|s: &(), frame: Frame, ch: u32, ctx: &Context<'_, ()>| {
//!             ctx.send(s, network_pipeline::pipeline::Message::new(frame), ch)
//!         }),
//!     )
//!     .unwrap();
//!
//! conn.send_default(Bytes::from_static(b"ping"), 1).unwrap();
//! let wire = conn.take_outbound().unwrap();
//! assert_eq!(conn.receive(&wire).unwrap(), 1);
//! assert_eq!(conn.take_outbound().unwrap(), wire);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod transport;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Context, FnHandler, Handler, Message, Pipeline};
pub use transport::{Connection, StaticTransport, TransportEngine};
