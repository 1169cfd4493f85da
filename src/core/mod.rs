//! # Core Framing Components
//!
//! Channel-tagged frames, the framer contract and the default wire format.
//!
//! A transport engine reads bytes from the network, hands them to a
//! [`Framer`](framer::Framer) which splits them into [`Frame`](frame::Frame)s,
//! and fires each frame into the connection's pipeline. Outbound frames travel
//! the other way and are serialized by the same framer.
//!
//! ## Components
//! - **Frame**: a payload tagged with a channel id
//! - **Framer**: converts a byte stream into frames and back
//! - **Codec**: Tokio codec over the default framer for use with `Framed`
//! - **Reliability**: delivery requirements attached to outbound sends
//!
//! ## Wire Format
//! ```text
//! [Length(4, BE)] [Channel(4, BE)] [Payload(Length)]
//! ```
//! Frames are concatenated with no delimiter between them.

pub mod codec;
pub mod frame;
pub mod framer;
pub mod header_body;
pub mod reliability;
