//! A stateful framer for header/body protocols (HTTP/1-style).
//!
//! Channel [`HEADER_CHANNEL`] carries the header block, up to but excluding
//! the blank line that terminates it. Everything after the blank line is body
//! and is emitted on [`BODY_CHANNEL`] as it arrives. Whether the header block
//! has been seen is per-connection state, so it lives in the session through
//! [`HeaderBodySession`] and the framer itself stays shareable.

use bytes::{Buf, BytesMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::config::{FramerConfig, DEFAULT_MAX_HEADER_LENGTH};
use crate::core::frame::Frame;
use crate::core::framer::Framer;
use crate::error::{PipelineError, Result};

pub const HEADER_CHANNEL: u32 = 0;
pub const BODY_CHANNEL: u32 = 1;

const DELIMITER: &[u8] = b"\r\n\r\n";

/// Per-connection decoding state for [`HeaderBodyFramer`].
#[derive(Debug, Default)]
pub struct HeaderBodyState {
    headers_complete: AtomicBool,
    // buffer offset where the delimiter search resumes
    scanned: AtomicUsize,
}

impl HeaderBodyState {
    pub fn headers_complete(&self) -> bool {
        self.headers_complete.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.headers_complete.store(false, Ordering::Release);
        self.scanned.store(0, Ordering::Release);
    }

    fn mark_headers_complete(&self) {
        self.headers_complete.store(true, Ordering::Release);
        self.scanned.store(0, Ordering::Release);
    }

    fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Acquire)
    }

    fn set_scanned(&self, offset: usize) {
        self.scanned.store(offset, Ordering::Release);
    }
}

/// Sessions decoded by a [`HeaderBodyFramer`] expose their state through this.
pub trait HeaderBodySession {
    fn header_body_state(&self) -> &HeaderBodyState;
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderBodyFramer {
    max_header_length: usize,
}

impl Default for HeaderBodyFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_LENGTH)
    }
}

impl HeaderBodyFramer {
    pub fn new(max_header_length: usize) -> Self {
        Self { max_header_length }
    }

    pub fn from_config(config: &FramerConfig) -> Self {
        Self::new(config.max_header_length)
    }
}

impl<S: HeaderBodySession + ?Sized> Framer<S> for HeaderBodyFramer {
    fn init(&self, session: &S) {
        session.header_body_state().reset();
    }

    fn unpack(&self, buf: &mut BytesMut, session: &S, frames: &mut Vec<Frame>) -> Result<()> {
        let state = session.header_body_state();
        if !state.headers_complete() {
            let start = state.scanned().min(buf.len());
            let found = buf[start..]
                .windows(DELIMITER.len())
                .position(|w| w == DELIMITER)
                .map(|pos| start + pos);
            match found {
                Some(pos) => {
                    if pos > self.max_header_length {
                        return Err(PipelineError::OversizedFrame(pos));
                    }
                    let header = buf.split_to(pos).freeze();
                    buf.advance(DELIMITER.len());
                    debug!(len = header.len(), "Header block complete");
                    frames.push(Frame::new(HEADER_CHANNEL, header));
                    state.mark_headers_complete();
                }
                None => {
                    if buf.len() > self.max_header_length + DELIMITER.len() {
                        return Err(PipelineError::OversizedFrame(buf.len()));
                    }
                    // a delimiter may straddle the end of what has arrived
                    state.set_scanned(buf.len().saturating_sub(DELIMITER.len() - 1));
                    return Ok(());
                }
            }
        }

        if !buf.is_empty() {
            frames.push(Frame::new(BODY_CHANNEL, buf.split().freeze()));
        }
        Ok(())
    }

    fn pack(&self, frame: &Frame, _session: &S, out: &mut BytesMut) -> Result<()> {
        out.extend_from_slice(&frame.payload);
        if frame.channel == HEADER_CHANNEL {
            out.extend_from_slice(DELIMITER);
        }
        Ok(())
    }
}
