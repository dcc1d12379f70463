//! Recording doubles for tests.

use crate::context::Context;
use crate::controller::Controller;
use crate::errors::CommandError;
use crate::events::{Bus, Event};
use crate::executors::{FunctionSpec, Spec};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// An ordered, shareable record of calls.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: &str) {
        self.entries.lock().push(entry.to_string());
    }

    /// Returns every entry, in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns how many times `entry` was recorded.
    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// A function spec that records `name` and succeeds.
    #[must_use]
    pub fn recorder(&self, name: &str) -> Spec {
        let log = self.clone();
        let entry = name.to_string();
        FunctionSpec::new(name, &[], move |_| {
            log.record(&entry);
            Ok(())
        })
        .into()
    }

    /// A function spec that records `name` and fails with it.
    #[must_use]
    pub fn failer(&self, name: &str) -> Spec {
        let log = self.clone();
        let entry = name.to_string();
        FunctionSpec::new(name, &[], move |_| {
            log.record(&entry);
            Err(CommandError::new(entry.clone()))
        })
        .into()
    }
}

/// A bus that records deliveries and marks a fixed set of controllers
/// caught, without running anything.
///
/// Tests then drive the event by calling `report_done`/`report_failure`.
#[derive(Debug, Default)]
pub struct ManualBus {
    controllers: Vec<Arc<Controller>>,
    delivered: Mutex<Vec<Arc<Event>>>,
}

impl ManualBus {
    /// A bus that catches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that marks `controllers` caught on every delivery.
    #[must_use]
    pub fn catching(controllers: Vec<Arc<Controller>>) -> Self {
        Self {
            controllers,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Returns the delivered events, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Arc<Event>> {
        self.delivered.lock().clone()
    }

    /// Returns the delivered event types, in order.
    #[must_use]
    pub fn delivered_types(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }
}

impl Bus for ManualBus {
    fn deliver(&self, _ctx: &Arc<Context>, event: &Arc<Event>) {
        self.delivered.lock().push(event.clone());
        for controller in &self.controllers {
            if let Err(err) = event.mark_caught(controller) {
                warn!(error = %err, "Manual bus could not mark controller caught");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullBus;

    #[test]
    fn test_call_log_shares_entries() {
        let log = CallLog::new();
        let other = log.clone();
        log.record("a");
        other.record("a");
        other.record("b");

        assert_eq!(log.count("a"), 2);
        assert_eq!(log.entries(), vec!["a", "a", "b"]);
        log.clear();
        assert!(other.entries().is_empty());
    }

    #[test]
    fn test_manual_bus_records_and_catches() {
        let controller = Arc::new(Controller::new(1, "form"));
        let bus = Arc::new(ManualBus::catching(vec![controller.clone()]));
        let ctx = Arc::new(Context::new(bus.clone()));

        let event = ctx.dispatch(ctx.event("save")).unwrap();

        assert_eq!(bus.delivered_types(), vec!["save"]);
        assert_eq!(event.in_flight(), vec![1]);
        assert!(!event.is_settled());

        let quiet = Arc::new(Context::new(Arc::new(NullBus)));
        assert!(quiet.dispatch(quiet.event("save")).unwrap().is_settled());
    }
}
