//! Events, their delivery, and telemetry.
//!
//! This module provides:
//! - [`Event`], the dispatch handle that aggregates controller completions
//! - Notifications and listeners
//! - The [`Bus`] transport with an in-process [`LocalBus`]
//! - The [`EventSink`] telemetry trait

mod bus;
mod event;
mod notification;
mod sink;

#[cfg(test)]
pub use bus::MockBus;
pub use bus::{Bus, LocalBus, NullBus};
pub use event::Event;
pub use notification::{Listener, Notification};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, TelemetryRecord};
