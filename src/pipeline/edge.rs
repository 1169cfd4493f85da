//! Terminal behavior for events that run off either end of the chain.

use tracing::{debug, error, warn};

use crate::error::constants::ERR_UNDELIVERABLE;
use crate::error::{PipelineError, Result};
use crate::pipeline::message::Message;

/// Receives every event that reaches Head or Tail without being claimed.
///
/// The defaults ignore lifecycle events, warn about unclaimed inbound
/// messages, and hand uncaught exceptions and outbound messages back to the
/// caller of the `fire_*` method as errors.
pub trait EdgeListener<S>: Send + Sync {
    fn session_opened(&self, _session: &S) -> Result<()> {
        debug!("Session opened event reached the end of the pipeline");
        Ok(())
    }

    fn session_closed(&self, _session: &S) -> Result<()> {
        debug!("Session closed event reached the end of the pipeline");
        Ok(())
    }

    fn exception_caught(&self, _session: &S, error: PipelineError) -> Result<()> {
        error!(error = %error, "Uncaught exception in pipeline");
        Err(error)
    }

    fn message_received(&self, _session: &S, msg: Message, channel: u32) -> Result<()> {
        warn!(
            message_type = msg.type_name(),
            channel, "Received message was not handled by any handler"
        );
        Ok(())
    }

    /// An outbound message reached Head. Nothing in the chain can put it on
    /// the wire, so this is a pipeline misconfiguration.
    fn message_sent(&self, _session: &S, msg: Message, channel: u32) -> Result<()> {
        error!(
            message_type = msg.type_name(),
            channel, "{}", ERR_UNDELIVERABLE
        );
        Err(PipelineError::Undeliverable {
            type_name: msg.type_name(),
            channel,
        })
    }
}

/// Edge listener with the default behavior for every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEdgeListener;

impl<S> EdgeListener<S> for LoggingEdgeListener {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_edge_behavior() {
        let edge = LoggingEdgeListener;
        assert!(EdgeListener::<()>::session_opened(&edge, &()).is_ok());
        assert!(EdgeListener::<()>::session_closed(&edge, &()).is_ok());
        assert!(EdgeListener::<()>::message_received(&edge, &(), Message::new(1u8), 3).is_ok());

        let err = EdgeListener::<()>::message_sent(&edge, &(), Message::new(1u8), 3)
            .expect_err("outbound at the edge must fail");
        assert!(matches!(
            err,
            PipelineError::Undeliverable { type_name: "u8", channel: 3 }
        ));

        let err = EdgeListener::<()>::exception_caught(
            &edge,
            &(),
            PipelineError::Custom("boom".into()),
        )
        .expect_err("uncaught exception must surface");
        assert!(matches!(err, PipelineError::Custom(msg) if msg == "boom"));
    }
}
