//! # Transport Glue
//!
//! The seam between a transport engine and the pipeline core.
//!
//! A transport engine owns sockets and sessions. For each connection it
//! feeds received bytes through a [`Framer`](crate::core::framer::Framer)
//! into the pipeline, and writes out whatever the pipeline packs on the way
//! back. [`Connection`](connection::Connection) does that bookkeeping for one
//! connection; [`stream::drive`] runs it over any Tokio byte stream.
//!
//! ## Reliability
//! Every transport advertises the delivery guarantees it can honor. A send
//! requesting anything else is rejected before the pipeline sees it.

pub mod connection;
pub mod stream;

use crate::config::TransportConfig;
use crate::core::reliability::Reliability;
use crate::error::{PipelineError, Result};

pub use connection::Connection;

/// Capabilities of a transport engine.
pub trait TransportEngine: Send + Sync {
    fn supported_reliabilities(&self) -> &[Reliability];

    fn is_reliability_supported(&self, reliability: Reliability) -> bool {
        self.supported_reliabilities().contains(&reliability)
    }

    /// Reliability used when the caller does not choose one.
    fn fallback_reliability(&self) -> Reliability;
}

/// A transport with a fixed capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTransport {
    supported: Vec<Reliability>,
    fallback: Reliability,
}

impl StaticTransport {
    /// Fails unless `fallback` is one of `supported`.
    pub fn new(supported: Vec<Reliability>, fallback: Reliability) -> Result<Self> {
        if !supported.contains(&fallback) {
            return Err(PipelineError::ConfigError(format!(
                "Fallback reliability '{fallback}' is not in the supported set"
            )));
        }
        Ok(Self {
            supported,
            fallback,
        })
    }

    /// A byte-stream transport such as TCP: every guarantee holds.
    pub fn tcp() -> Self {
        Self {
            supported: Reliability::ALL.to_vec(),
            fallback: Reliability::ReliableOrdered,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        Self::new(
            config.supported_reliabilities.clone(),
            config.fallback_reliability,
        )
    }
}

impl TransportEngine for StaticTransport {
    fn supported_reliabilities(&self) -> &[Reliability] {
        &self.supported
    }

    fn fallback_reliability(&self) -> Reliability {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_must_be_supported() {
        let err = StaticTransport::new(vec![Reliability::Unreliable], Reliability::Reliable)
            .expect_err("should reject");
        assert!(matches!(err, PipelineError::ConfigError(_)));

        let udp = StaticTransport::new(
            vec![Reliability::Unreliable, Reliability::UnreliableSequenced],
            Reliability::Unreliable,
        )
        .expect("valid transport");
        assert!(!udp.is_reliability_supported(Reliability::ReliableOrdered));
        assert!(udp.is_reliability_supported(Reliability::UnreliableSequenced));
    }

    #[test]
    fn test_tcp_supports_everything() {
        let tcp = StaticTransport::tcp();
        assert!(Reliability::ALL
            .iter()
            .all(|r| tcp.is_reliability_supported(*r)));
        assert_eq!(tcp.fallback_reliability(), Reliability::ReliableOrdered);
        assert_eq!(
            StaticTransport::from_config(&TransportConfig::default()).expect("default config"),
            tcp
        );
    }
}
