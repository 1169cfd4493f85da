//! Running a [`Connection`] over a Tokio byte stream.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

use crate::config::{FramerConfig, PipelineConfig};
use crate::core::codec::FrameCodec;
use crate::core::framer::LengthPrefixedFramer;
use crate::error::{PipelineError, Result};
use crate::transport::connection::Connection;

/// Read-loop settings for [`drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveOptions {
    pub read_buffer_capacity: usize,
    pub idle_timeout: Duration,
}

impl DriveOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            read_buffer_capacity: config.framer.read_buffer_capacity,
            idle_timeout: config.transport.idle_timeout,
        }
    }
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

async fn flush<S, IO>(connection: &Connection<S>, io: &mut IO) -> Result<()>
where
    S: 'static,
    IO: AsyncWrite + Unpin,
{
    let pending = connection.take_outbound()?;
    if !pending.is_empty() {
        io.write_all(&pending).await?;
        io.flush().await?;
    }
    Ok(())
}

async fn pump<S, IO>(connection: &Connection<S>, io: &mut IO, options: DriveOptions) -> Result<()>
where
    S: 'static,
    IO: AsyncRead + AsyncWrite + Unpin,
{
    connection.open()?;
    flush(connection, io).await?;

    let mut buf = vec![0u8; options.read_buffer_capacity.max(1)];
    loop {
        let n = match timeout(options.idle_timeout, io.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => {
                warn!(idle_timeout_ms = options.idle_timeout.as_millis() as u64, "Connection idle");
                return Err(PipelineError::Timeout);
            }
        };
        if n == 0 {
            debug!("Peer closed the stream");
            return Ok(());
        }
        connection.receive(&buf[..n])?;
        flush(connection, io).await?;
    }
}

/// Run `connection` over `io` until the peer closes the stream, an error
/// occurs, or nothing arrives for `idle_timeout`.
///
/// The connection is opened first and always closed at the end; anything
/// handlers send while closing is flushed before the stream is shut down.
/// The first error encountered is returned.
#[instrument(level = "debug", skip_all)]
pub async fn drive<S, IO>(connection: &Connection<S>, mut io: IO, options: DriveOptions) -> Result<()>
where
    S: 'static,
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let pumped = pump(connection, &mut io, options).await;
    let closed = connection.close();
    let flushed = flush(connection, &mut io).await;
    if let Err(e) = io.shutdown().await {
        debug!(error = %e, "Stream shutdown failed");
    }
    connection.pipeline().metrics().log_snapshot();
    pumped.and(closed).and(flushed)
}

/// Wrap `io` in a [`Framed`] speaking the default wire format with the
/// configured frame limit.
pub fn framed<IO>(io: IO, config: &FramerConfig) -> Framed<IO, FrameCodec>
where
    IO: AsyncRead + AsyncWrite,
{
    Framed::with_capacity(
        io,
        FrameCodec::new(LengthPrefixedFramer::from_config(config)),
        config.read_buffer_capacity,
    )
}
