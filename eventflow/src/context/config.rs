//! Configuration types for an eventflow context.

use crate::errors::EventflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`Context`](super::Context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Name used in logs and telemetry.
    #[serde(default = "default_name")]
    pub name: String,
    /// Whether an event that requires a catch but was not caught logs a warning.
    #[serde(default = "default_warn_on_uncaught")]
    pub warn_on_uncaught: bool,
    /// Whether threads and events forward lifecycle records to the event sink.
    #[serde(default = "default_emit_telemetry")]
    pub emit_telemetry: bool,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "eventflow".to_string()
}

fn default_warn_on_uncaught() -> bool {
    true
}

fn default_emit_telemetry() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            warn_on_uncaught: default_warn_on_uncaught(),
            emit_telemetry: default_emit_telemetry(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the context name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables the uncaught-event warning.
    #[must_use]
    pub fn with_warn_on_uncaught(mut self, warn: bool) -> Self {
        self.warn_on_uncaught = warn;
        self
    }

    /// Enables or disables telemetry forwarding.
    #[must_use]
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.emit_telemetry = enabled;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, EventflowError> {
        serde_json::from_str(raw).map_err(|e| EventflowError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EventflowError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Logging configuration consumed by [`init_tracing`](crate::observability::init_tracing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "eventflow=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}
