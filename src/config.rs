//! # Configuration Management
//!
//! Centralized configuration for pipelines, framers and the transport glue.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Limits
//! - Default maximum frame length (16 MB) caps what a peer can make us buffer
//! - Header blocks for header/body framing are capped separately (64 KB)

use crate::core::reliability::Reliability;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default maximum payload length of a single frame (16 MB)
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Default size of each socket read
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Default maximum header block for header/body framing (64 KB)
pub const DEFAULT_MAX_HEADER_LENGTH: usize = 64 * 1024;

/// Default idle timeout for stream-driven connections
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PipelineConfig {
    /// Framing limits
    #[serde(default)]
    pub framer: FramerConfig,

    /// Transport capabilities
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Unparseable values are rejected rather than ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("NETWORK_PIPELINE_MAX_FRAME_LENGTH") {
            config.framer.max_frame_length = value.parse::<usize>().map_err(|e| {
                PipelineError::ConfigError(format!(
                    "Invalid NETWORK_PIPELINE_MAX_FRAME_LENGTH '{value}': {e}"
                ))
            })?;
        }

        if let Ok(value) = std::env::var("NETWORK_PIPELINE_FALLBACK_RELIABILITY") {
            config.transport.fallback_reliability = value
                .parse::<Reliability>()
                .map_err(PipelineError::ConfigError)?;
        }

        if let Ok(value) = std::env::var("NETWORK_PIPELINE_LOG_LEVEL") {
            config.logging.log_level = value.parse::<Level>().map_err(|_| {
                PipelineError::ConfigError(format!("Invalid NETWORK_PIPELINE_LOG_LEVEL '{value}'"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.framer.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Framing limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramerConfig {
    /// Largest payload a length-prefixed frame may declare
    pub max_frame_length: usize,

    /// Bytes requested from the socket per read
    pub read_buffer_capacity: usize,

    /// Largest header block accepted by header/body framing
    pub max_header_length: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
        }
    }
}

impl FramerConfig {
    /// Validate framer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_length == 0 {
            errors.push("Max frame length cannot be 0".to_string());
        } else if self.max_frame_length > u32::MAX as usize {
            errors.push(format!(
                "Max frame length too large: {} bytes (length prefix is 32 bits)",
                self.max_frame_length
            ));
        }

        if self.read_buffer_capacity == 0 {
            errors.push("Read buffer capacity must be greater than 0".to_string());
        }

        if self.max_header_length == 0 {
            errors.push("Max header length cannot be 0".to_string());
        }

        errors
    }
}

/// Transport capabilities
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Delivery guarantees the transport can honor
    pub supported_reliabilities: Vec<Reliability>,

    /// Reliability used when a send does not name one
    pub fallback_reliability: Reliability,

    /// Close a stream-driven connection after this long without input
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    /// A stream transport: everything arrives, in order.
    fn default() -> Self {
        Self {
            supported_reliabilities: Reliability::ALL.to_vec(),
            fallback_reliability: Reliability::ReliableOrdered,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.supported_reliabilities.is_empty() {
            errors.push("At least one supported reliability must be listed".to_string());
        } else if !self
            .supported_reliabilities
            .contains(&self.fallback_reliability)
        {
            errors.push(format!(
                "Fallback reliability '{}' is not in the supported set",
                self.fallback_reliability
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("network-pipeline"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
