//! Telemetry sink trait and implementations.
//!
//! Threads and events report lifecycle records (`executor.started`,
//! `executor.evicted`, `thread.completed`, `event.dispatched`, ...) to a
//! sink. Records are informational; nothing waits for a response.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, trace, Level};

/// A telemetry record: its type and optional JSON payload.
pub type TelemetryRecord = (String, Option<serde_json::Value>);

/// Trait for sinks that receive telemetry records.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits a record asynchronously.
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits a record without blocking.
    ///
    /// Must never fail; sinks log and drop whatever they cannot handle.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A sink that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// A sink that writes records to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn log_record(&self, event_type: &str, data: Option<&serde_json::Value>) {
        match self.level {
            Level::TRACE => trace!(event_type = %event_type, data = ?data, "telemetry"),
            Level::DEBUG => debug!(event_type = %event_type, data = ?data, "telemetry"),
            _ => info!(event_type = %event_type, data = ?data, "telemetry"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_record(event_type, data.as_ref());
    }
}

/// A sink that keeps every record in memory, for tests and inspectors.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    records: RwLock<Vec<TelemetryRecord>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryRecord> {
        self.records.read().clone()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Returns the records of exactly `event_type`.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<TelemetryRecord> {
        self.records
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.records.write().push((event_type.to_string(), data));
    }
}
