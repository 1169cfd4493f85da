//! Configuration loading and validation tests

#![allow(clippy::expect_used, clippy::unwrap_used)]

use network_pipeline::config::{
    PipelineConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_FRAME_LENGTH, DEFAULT_MAX_HEADER_LENGTH,
};
use network_pipeline::core::framer::LengthPrefixedFramer;
use network_pipeline::core::reliability::Reliability;
use network_pipeline::error::PipelineError;
use network_pipeline::transport::{StaticTransport, TransportEngine};
use std::time::Duration;
use tempfile::tempdir;
use tracing::Level;

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_default_config_is_valid() {
    let config = PipelineConfig::default();
    assert!(config.validate().is_empty());
    assert!(config.validate_strict().is_ok());

    assert_eq!(config.framer.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    assert_eq!(config.framer.max_header_length, DEFAULT_MAX_HEADER_LENGTH);
    assert_eq!(config.transport.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    assert_eq!(config.transport.fallback_reliability, Reliability::ReliableOrdered);
    assert_eq!(config.logging.app_name, "network-pipeline");
}

#[test]
fn test_framer_from_config_uses_limit() {
    let config = PipelineConfig::default_with_overrides(|c| c.framer.max_frame_length = 1024);
    let framer = LengthPrefixedFramer::from_config(&config.framer);
    assert_eq!(framer.max_frame_length(), 1024);
    assert_eq!(LengthPrefixedFramer::new().max_frame_length(), DEFAULT_MAX_FRAME_LENGTH);
    assert_eq!(LengthPrefixedFramer::unbounded().max_frame_length(), u32::MAX as usize);
}

// ============================================================================
// Invalid values
// ============================================================================

#[test]
fn test_framer_limits_are_checked() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.framer.max_frame_length = 0;
        c.framer.read_buffer_capacity = 0;
        c.framer.max_header_length = 0;
    });
    let errors = config.validate();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains(&"Max frame length cannot be 0".to_string()));
    assert!(errors.contains(&"Read buffer capacity must be greater than 0".to_string()));
    assert!(errors.contains(&"Max header length cannot be 0".to_string()));
}

#[test]
fn test_oversized_frame_limit_rejected() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.framer.max_frame_length = u32::MAX as usize + 1;
    });
    let errors = config.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Max frame length too large"));
}

#[test]
fn test_fallback_must_be_supported() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.transport.supported_reliabilities = vec![Reliability::Unreliable];
        c.transport.fallback_reliability = Reliability::Reliable;
    });
    assert_eq!(
        config.validate(),
        vec!["Fallback reliability 'reliable' is not in the supported set".to_string()]
    );
    assert!(matches!(
        StaticTransport::from_config(&config.transport),
        Err(PipelineError::ConfigError(_))
    ));

    let empty = PipelineConfig::default_with_overrides(|c| c.transport.supported_reliabilities.clear());
    assert_eq!(
        empty.validate(),
        vec!["At least one supported reliability must be listed".to_string()]
    );
}

#[test]
fn test_short_idle_timeout_rejected() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.transport.idle_timeout = Duration::from_millis(50);
    });
    assert_eq!(config.validate(), vec!["Idle timeout too short (minimum: 100ms)".to_string()]);
}

#[test]
fn test_logging_outputs() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.logging.log_to_console = false;
        c.logging.app_name.clear();
    });
    let errors = config.validate();
    assert!(errors.contains(&"Application name cannot be empty".to_string()));
    assert!(errors.contains(&"At least one logging output (console or file) must be enabled".to_string()));

    let config = PipelineConfig::default_with_overrides(|c| c.logging.log_to_file = true);
    assert_eq!(
        config.validate(),
        vec!["log_file_path must be specified when log_to_file is true".to_string()]
    );
}

#[test]
fn test_validate_strict_lists_every_error() {
    let config = PipelineConfig::default_with_overrides(|c| {
        c.framer.max_frame_length = 0;
        c.transport.idle_timeout = Duration::ZERO;
    });
    let err = config.validate_strict().unwrap_err();
    let PipelineError::ConfigError(message) = err else {
        panic!("expected ConfigError, got {err:?}");
    };
    assert!(message.starts_with("Configuration validation failed:\n  - "));
    assert!(message.contains("Max frame length cannot be 0"));
    assert!(message.contains("Idle timeout too short"));
}

#[test]
fn test_env_overrides() {
    std::env::set_var("NETWORK_PIPELINE_MAX_FRAME_LENGTH", "2048");
    std::env::set_var("NETWORK_PIPELINE_FALLBACK_RELIABILITY", "Reliable");
    std::env::set_var("NETWORK_PIPELINE_LOG_LEVEL", "debug");
    let config = PipelineConfig::from_env().unwrap();
    assert_eq!(config.framer.max_frame_length, 2048);
    assert_eq!(config.transport.fallback_reliability, Reliability::Reliable);
    assert_eq!(config.logging.log_level, Level::DEBUG);

    std::env::set_var("NETWORK_PIPELINE_MAX_FRAME_LENGTH", "lots");
    let err = PipelineConfig::from_env().unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(ref m) if m.contains("NETWORK_PIPELINE_MAX_FRAME_LENGTH")));

    for key in [
        "NETWORK_PIPELINE_MAX_FRAME_LENGTH",
        "NETWORK_PIPELINE_FALLBACK_RELIABILITY",
        "NETWORK_PIPELINE_LOG_LEVEL",
    ] {
        std::env::remove_var(key);
    }
}

// ============================================================================
// TOML
// ============================================================================

#[test]
fn test_toml_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");

    let config = PipelineConfig::default_with_overrides(|c| {
        c.framer.max_frame_length = 4096;
        c.transport.supported_reliabilities = vec![Reliability::Unreliable, Reliability::Reliable];
        c.transport.fallback_reliability = Reliability::Reliable;
        c.transport.idle_timeout = Duration::from_millis(1500);
        c.logging.log_level = Level::DEBUG;
        c.logging.json_format = true;
    });
    config.save_to_file(&path).unwrap();

    let loaded = PipelineConfig::from_file(&path).unwrap();
    assert_eq!(loaded.framer.max_frame_length, 4096);
    assert_eq!(
        loaded.transport.supported_reliabilities,
        vec![Reliability::Unreliable, Reliability::Reliable]
    );
    assert_eq!(loaded.transport.fallback_reliability, Reliability::Reliable);
    assert_eq!(loaded.transport.idle_timeout, Duration::from_millis(1500));
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);

    let transport = StaticTransport::from_config(&loaded.transport).unwrap();
    assert!(!transport.is_reliability_supported(Reliability::ReliableOrdered));
}

#[test]
fn test_missing_sections_use_defaults() {
    let config = PipelineConfig::from_toml(
        r#"
        [transport]
        supported_reliabilities = ["unreliable", "unreliable_sequenced"]
        fallback_reliability = "unreliable"
        idle_timeout = 30000
        "#,
    )
    .unwrap();
    assert_eq!(config.framer.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    assert_eq!(config.transport.idle_timeout, Duration::from_secs(30));
    assert!(config.validate().is_empty());
}

#[test]
fn test_example_config_parses() {
    let example = PipelineConfig::example_config();
    assert!(example.contains("[framer]"));
    let parsed = PipelineConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_bad_toml_is_config_error() {
    for content in [
        "[transport]\nsupported_reliabilities = [\"carrier_pigeon\"]\nfallback_reliability = \"reliable\"\nidle_timeout = 1000",
        "[logging]\napp_name = \"x\"\nlog_level = \"loud\"\nlog_to_console = true\nlog_to_file = false\njson_format = false",
        "not toml at all [",
    ] {
        let err = PipelineConfig::from_toml(content).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(ref m) if m.starts_with("Failed to parse TOML")));
    }

    let missing = PipelineConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(missing, PipelineError::ConfigError(ref m) if m.starts_with("Failed to open config file")));
}
