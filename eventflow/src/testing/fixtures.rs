//! A wired-up context for end-to-end tests.

use crate::context::{Context, ContextConfig};
use crate::controller::Controller;
use crate::errors::{CommandError, EventError};
use crate::events::{CollectingEventSink, Event, LocalBus};
use crate::executors::Spec;
use std::sync::Arc;
use std::time::Duration;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// A context over a [`LocalBus`] with a [`CollectingEventSink`].
#[derive(Debug)]
pub struct TestHarness {
    /// The context under test.
    pub ctx: Arc<Context>,
    /// The bus controllers listen on.
    pub bus: Arc<LocalBus>,
    /// Every telemetry record emitted.
    pub sink: Arc<CollectingEventSink>,
    settle_timeout: Duration,
}

impl TestHarness {
    /// Creates a harness with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default().with_name("test"))
    }

    /// Creates a harness with `config`.
    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        let bus = Arc::new(LocalBus::new());
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = Arc::new(
            Context::new(bus.clone())
                .with_config(config)
                .with_event_sink(sink.clone()),
        );
        Self {
            ctx,
            bus,
            sink,
            settle_timeout: SETTLE_TIMEOUT,
        }
    }

    /// Sets how long [`dispatch`](Self::dispatch) waits for the event to settle.
    #[must_use]
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Creates a controller that runs `specs` for `event_type`.
    pub fn controller(&self, name: &str, event_type: &str, specs: Vec<Spec>) -> Arc<Controller> {
        let controller = Arc::new(self.ctx.controller(name));
        self.bus.listen(&controller, event_type, specs);
        controller
    }

    /// Registers `specs` for `event_type` on an existing controller.
    pub fn listen(&self, controller: &Arc<Controller>, event_type: &str, specs: Vec<Spec>) {
        self.bus.listen(controller, event_type, specs);
    }

    /// Dispatches `event` and waits until every controller reported.
    ///
    /// Returns the event with the result of [`Event::settled`]. An event
    /// that does not settle within the settle timeout (five seconds by
    /// default) is an error.
    pub async fn dispatch(&self, event: Event) -> Result<(Arc<Event>, Result<(), CommandError>), EventError> {
        let event = self.ctx.dispatch(event)?;
        let settled = tokio::time::timeout(self.settle_timeout, event.settled())
            .await
            .map_err(|_| EventError::NotSettled {
                event_type: event.event_type().to_string(),
                event_id: event.id(),
                waited_ms: u64::try_from(self.settle_timeout.as_millis()).unwrap_or(u64::MAX),
            })?;
        Ok((event, settled))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
