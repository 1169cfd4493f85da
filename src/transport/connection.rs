//! One connection's session, pipeline and byte buffers.

use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument, trace, warn};

use crate::core::frame::Frame;
use crate::core::framer::Framer;
use crate::core::reliability::Reliability;
use crate::error::constants::ERR_BUFFER_LOCK;
use crate::error::{PipelineError, Result};
use crate::pipeline::{EdgeListener, LoggingEdgeListener, Message, Pipeline};
use crate::transport::TransportEngine;

fn lock_buffer(buffer: &Mutex<BytesMut>) -> Result<MutexGuard<'_, BytesMut>> {
    buffer
        .lock()
        .map_err(|_| PipelineError::LockPoisoned(ERR_BUFFER_LOCK))
}

/// Edge listener of a connection's pipeline. Outbound [`Frame`]s and raw
/// [`Bytes`] that reach Head are packed into the outbound buffer; everything
/// else goes to the wrapped listener.
struct FramingEdge<S> {
    framer: Arc<dyn Framer<S>>,
    outbound: Arc<Mutex<BytesMut>>,
    packed: Arc<AtomicU64>,
    inner: Box<dyn EdgeListener<S>>,
}

impl<S> EdgeListener<S> for FramingEdge<S> {
    fn session_opened(&self, session: &S) -> Result<()> {
        self.inner.session_opened(session)
    }

    fn session_closed(&self, session: &S) -> Result<()> {
        self.inner.session_closed(session)
    }

    fn exception_caught(&self, session: &S, error: PipelineError) -> Result<()> {
        self.inner.exception_caught(session, error)
    }

    fn message_received(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        self.inner.message_received(session, msg, channel)
    }

    fn message_sent(&self, session: &S, msg: Message, channel: u32) -> Result<()> {
        let frame = match msg.downcast::<Frame>() {
            Ok(frame) => frame,
            Err(msg) => match msg.downcast::<Bytes>() {
                Ok(payload) => Frame::new(channel, payload),
                Err(msg) => return self.inner.message_sent(session, msg, channel),
            },
        };
        let mut out = lock_buffer(&self.outbound)?;
        self.framer.pack(&frame, session, &mut out)?;
        self.packed.fetch_add(1, Ordering::Relaxed);
        trace!(channel = frame.channel, len = frame.len(), "Packed outbound frame");
        Ok(())
    }
}

/// Glue between a transport engine and one connection's pipeline.
///
/// Inbound bytes are unpacked and fired one frame at a time, in stream order,
/// as [`Frame`] messages on the frame's channel. Outbound messages that reach
/// Head as a `Frame` (or as raw `Bytes`, framed on the send channel) are
/// packed into a buffer the engine drains with [`take_outbound`].
///
/// [`take_outbound`]: Connection::take_outbound
pub struct Connection<S> {
    session: S,
    pipeline: Pipeline<S>,
    framer: Arc<dyn Framer<S>>,
    engine: Arc<dyn TransportEngine>,
    inbound: Mutex<BytesMut>,
    outbound: Arc<Mutex<BytesMut>>,
    packed: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl<S: 'static> Connection<S> {
    pub fn new(session: S, framer: Arc<dyn Framer<S>>, engine: Arc<dyn TransportEngine>) -> Self {
        Self::with_edge(session, framer, engine, LoggingEdgeListener)
    }

    /// Like [`Connection::new`], with `edge` handling boundary events that
    /// are not outbound frames.
    pub fn with_edge(
        session: S,
        framer: Arc<dyn Framer<S>>,
        engine: Arc<dyn TransportEngine>,
        edge: impl EdgeListener<S> + 'static,
    ) -> Self {
        let outbound = Arc::new(Mutex::new(BytesMut::new()));
        let packed = Arc::new(AtomicU64::new(0));
        let pipeline = Pipeline::with_edge(FramingEdge {
            framer: framer.clone(),
            outbound: outbound.clone(),
            packed: packed.clone(),
            inner: Box::new(edge),
        });
        framer.init(&session);
        Self {
            session,
            pipeline,
            framer,
            engine,
            inbound: Mutex::new(BytesMut::new()),
            outbound,
            packed,
            closed: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    pub fn engine(&self) -> &dyn TransportEngine {
        self.engine.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(PipelineError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Fire the session-opened event.
    pub fn open(&self) -> Result<()> {
        self.ensure_open()?;
        debug!("Connection opened");
        self.pipeline.fire_session_opened(&self.session)
    }

    /// Feed bytes read from the network. Returns how many frames were fired.
    ///
    /// Every decoded frame is dispatched even if an earlier one fails; the
    /// first failure is returned afterwards. A framing failure is shown to the
    /// pipeline's exception handlers and then returned, since the stream
    /// cannot be resynchronized.
    pub fn receive(&self, bytes: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut inbound = lock_buffer(&self.inbound)?;
        inbound.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let unpacked = self.framer.unpack(&mut inbound, &self.session, &mut frames);
        let count = frames.len();
        self.pipeline.metrics().frames_unpacked(count as u64);

        // inbound stays locked so frames from concurrent reads cannot interleave
        let mut dispatched = Ok(());
        for frame in frames {
            let channel = frame.channel;
            let fired = self
                .pipeline
                .fire_message_received(&self.session, Message::new(frame), channel);
            if let Err(error) = fired {
                warn!(error = %error, channel, "Inbound frame failed");
                if dispatched.is_ok() {
                    dispatched = Err(error);
                }
            }
        }

        if let Err(error) = unpacked {
            warn!(error = %error, buffered = inbound.len(), "Framing failed");
            let description = error.to_string();
            let reported = self.pipeline.fire_exception_caught(&self.session, error);
            dispatched?;
            reported?;
            return Err(PipelineError::InvalidFrame(description));
        }
        dispatched.map(|()| count)
    }

    /// Send `msg` on `channel`. Fails without touching the pipeline if the
    /// transport cannot honor `reliability`.
    #[instrument(level = "trace", skip(self, msg))]
    pub fn send<T: Any + Send>(&self, msg: T, channel: u32, reliability: Reliability) -> Result<()> {
        self.ensure_open()?;
        if !self.engine.is_reliability_supported(reliability) {
            warn!(%reliability, "Transport does not support requested reliability");
            return Err(PipelineError::UnsupportedReliability(reliability));
        }
        self.pipeline
            .fire_message_sent(&self.session, Message::new(msg), channel)
    }

    /// Send with the transport's fallback reliability.
    pub fn send_default<T: Any + Send>(&self, msg: T, channel: u32) -> Result<()> {
        self.send(msg, channel, self.engine.fallback_reliability())
    }

    /// Bytes packed so far and not yet taken.
    pub fn pending_outbound(&self) -> Result<usize> {
        Ok(lock_buffer(&self.outbound)?.len())
    }

    /// Drain the packed outbound bytes, ready to write to the network.
    pub fn take_outbound(&self) -> Result<Bytes> {
        let bytes = lock_buffer(&self.outbound)?.split().freeze();
        let packed = self.packed.swap(0, Ordering::Relaxed);
        self.pipeline.metrics().frames_packed(packed);
        Ok(bytes)
    }

    /// Fire the session-closed event once. The pipeline is emptied and later
    /// calls to `open`, `receive` and `send` fail with `ConnectionClosed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Connection closed");
        self.pipeline.fire_session_closed(&self.session)
    }
}
