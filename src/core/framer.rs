//! # Framers
//!
//! A [`Framer`] turns a continuous byte stream into discrete [`Frame`]s and
//! back. One framer instance commonly decodes many connections' streams, so
//! framers are shared (`Send + Sync`) and take `&self`: any per-connection
//! decoding state must live in the session object.
//!
//! ## Default framer
//! [`LengthPrefixedFramer`] is stateless. Each call only looks at the bytes
//! currently in the buffer:
//!
//! ```text
//! AwaitingLength --(8 header bytes)--> AwaitingPayload --(Length bytes)--> Complete
//! ```
//!
//! There is no abort transition: a short buffer stays where it is until more
//! bytes arrive, and partial data is never consumed.

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::config::{FramerConfig, DEFAULT_MAX_FRAME_LENGTH, DEFAULT_READ_BUFFER_CAPACITY};
use crate::core::frame::Frame;
use crate::error::{PipelineError, Result};

/// Converts a byte stream into frames and back.
pub trait Framer<S: ?Sized>: Send + Sync {
    /// Called once per connection, before the first `unpack`.
    fn init(&self, _session: &S) {}

    /// Consume as many complete frames as `buf` currently holds, pushing them
    /// onto `frames` in stream order. Trailing partial data stays in `buf`.
    fn unpack(&self, buf: &mut BytesMut, session: &S, frames: &mut Vec<Frame>) -> Result<()>;

    /// Serialize exactly one frame onto `out`.
    fn pack(&self, frame: &Frame, session: &S, out: &mut BytesMut) -> Result<()>;
}

/// Decoding progress of the frame at the front of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Fewer than [`LengthPrefixedFramer::HEADER_LEN`] bytes are available.
    AwaitingLength,
    /// The header is present but the payload is not. `needed` more bytes.
    AwaitingPayload { declared: usize, needed: usize },
    /// A whole frame is available.
    Complete { declared: usize },
}

/// The default wire format: `[len: u32 BE][channel: u32 BE][payload]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefixedFramer {
    max_frame_length: usize,
}

impl Default for LengthPrefixedFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LengthPrefixedFramer {
    /// Bytes of header in front of every payload.
    pub const HEADER_LEN: usize = 8;

    /// A framer rejecting payloads over [`DEFAULT_MAX_FRAME_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    /// A framer accepting any payload whose length fits in 32 bits. Only for
    /// trusted peers: the limit is what bounds buffering on a hostile stream.
    pub fn unbounded() -> Self {
        Self {
            max_frame_length: u32::MAX as usize,
        }
    }

    /// A framer rejecting frames that declare more than `max` payload bytes.
    pub fn with_max_frame_length(max: usize) -> Self {
        Self {
            max_frame_length: max.min(u32::MAX as usize),
        }
    }

    pub fn from_config(config: &FramerConfig) -> Self {
        Self::with_max_frame_length(config.max_frame_length)
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// Report the state of the frame at the front of `buf` without consuming.
    pub fn state(&self, buf: &[u8]) -> FrameState {
        if buf.len() < Self::HEADER_LEN {
            return FrameState::AwaitingLength;
        }
        let declared = (&buf[..4]).get_u32() as usize;
        let available = buf.len() - Self::HEADER_LEN;
        if available < declared {
            FrameState::AwaitingPayload {
                declared,
                needed: declared - available,
            }
        } else {
            FrameState::Complete { declared }
        }
    }

    /// Split one complete frame off the front of `buf`, if there is one.
    pub fn decode_one(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.state(buf) {
            FrameState::AwaitingLength => Ok(None),
            FrameState::AwaitingPayload { declared, needed } => {
                if declared > self.max_frame_length {
                    return Err(PipelineError::OversizedFrame(declared));
                }
                // grow by at most one read; the declared length is untrusted
                buf.reserve(needed.min(DEFAULT_READ_BUFFER_CAPACITY));
                Ok(None)
            }
            FrameState::Complete { declared } => {
                if declared > self.max_frame_length {
                    return Err(PipelineError::OversizedFrame(declared));
                }
                let mut header = buf.split_to(Self::HEADER_LEN);
                header.advance(4);
                let channel = header.get_u32();
                let payload = buf.split_to(declared).freeze();
                Ok(Some(Frame { channel, payload }))
            }
        }
    }

    /// Append one frame to `out` in the default wire format.
    pub fn encode_one(&self, frame: &Frame, out: &mut BytesMut) -> Result<()> {
        let len = frame.payload.len();
        if len > self.max_frame_length {
            return Err(PipelineError::OversizedFrame(len));
        }
        out.reserve(Self::HEADER_LEN + len);
        out.put_u32(len as u32);
        out.put_u32(frame.channel);
        out.put_slice(&frame.payload);
        Ok(())
    }
}

impl<S: ?Sized> Framer<S> for LengthPrefixedFramer {
    fn unpack(&self, buf: &mut BytesMut, _session: &S, frames: &mut Vec<Frame>) -> Result<()> {
        while let Some(frame) = self.decode_one(buf)? {
            trace!(channel = frame.channel, len = frame.len(), "Unpacked frame");
            frames.push(frame);
        }
        Ok(())
    }

    fn pack(&self, frame: &Frame, _session: &S, out: &mut BytesMut) -> Result<()> {
        self.encode_one(frame, out)
    }
}
