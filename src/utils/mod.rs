//! # Utility Modules
//!
//! Supporting utilities for logging and metrics.
//!
//! ## Components
//! - **Logging**: structured `tracing` subscriber setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: per-pipeline atomic counters

pub mod logging;
pub mod metrics;
