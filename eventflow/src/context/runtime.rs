//! The runtime context that owns identity generation, the bus and every
//! live thread.

use super::ContextConfig;
use crate::controller::Controller;
use crate::core::ThreadId;
use crate::errors::EventError;
use crate::events::{Bus, Event, EventSink, NoOpEventSink};
use crate::executors::Spec;
use crate::thread::Thread;
use crate::utils::{generate_uuid, Sequence};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// Owns everything a group of dispatches shares.
///
/// A context replaces process-wide state: ids come from its [`Sequence`],
/// events are delivered through its [`Bus`], and [`Context::teardown`]
/// releases every thread it started so tests can isolate runs.
pub struct Context {
    run_id: Uuid,
    config: ContextConfig,
    sequence: Arc<Sequence>,
    bus: Arc<dyn Bus>,
    event_sink: Arc<dyn EventSink>,
    threads: DashMap<ThreadId, Weak<Thread>>,
    torn_down: AtomicBool,
}

impl Context {
    /// Creates a context delivering through `bus`.
    #[must_use]
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self {
            run_id: generate_uuid(),
            config: ContextConfig::default(),
            sequence: Arc::new(Sequence::new()),
            bus,
            event_sink: Arc::new(NoOpEventSink),
            threads: DashMap::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the id sequence.
    #[must_use]
    pub fn with_sequence(mut self, sequence: Arc<Sequence>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    /// Returns the telemetry sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns the id sequence.
    #[must_use]
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// Hands out the next id.
    pub fn next_id(&self) -> u64 {
        self.sequence.next_id()
    }

    /// Creates an event with a fresh id.
    #[must_use]
    pub fn event(&self, event_type: impl Into<String>) -> Event {
        Event::new(event_type).with_id(self.next_id())
    }

    /// Creates a controller with a fresh id.
    #[must_use]
    pub fn controller(&self, name: impl Into<String>) -> Controller {
        Controller::new(self.next_id(), name)
    }

    /// Creates a thread with no owning controller.
    #[must_use]
    pub fn thread(self: &Arc<Self>, specs: Vec<Spec>) -> Arc<Thread> {
        self.thread_for(None, specs)
    }

    /// Creates a thread owned by `controller` and registers it as live.
    #[must_use]
    pub fn thread_for(self: &Arc<Self>, controller: Option<Arc<Controller>>, specs: Vec<Spec>) -> Arc<Thread> {
        let thread = Arc::new(Thread::new(self.next_id(), specs, controller, self));
        if self.is_torn_down() {
            thread.destroy();
        } else {
            self.threads.insert(thread.id(), Arc::downgrade(&thread));
        }
        thread
    }

    /// Dispatches an event through this context's bus.
    pub fn dispatch(self: &Arc<Self>, event: Event) -> Result<Arc<Event>, EventError> {
        let event = Arc::new(event);
        event.dispatch(self)?;
        Ok(event)
    }

    /// Returns the number of threads still alive.
    pub fn live_threads(&self) -> usize {
        self.threads.retain(|_, weak| weak.strong_count() > 0);
        self.threads.len()
    }

    pub(crate) fn forget_thread(&self, id: ThreadId) {
        self.threads.remove(&id);
    }

    /// Returns true once [`Context::teardown`] has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Destroys every live thread and rejects further dispatch.
    ///
    /// Executors already mid-flight keep running, but whatever they report
    /// afterwards is discarded.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let live: Vec<Arc<Thread>> = self
            .threads
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        self.threads.clear();

        info!(
            context = %self.config.name,
            threads = live.len(),
            "Tearing down context"
        );
        for thread in live {
            debug!(thread_id = thread.id(), "Destroying thread");
            thread.destroy();
        }
    }

    /// Forwards a telemetry record to the sink when telemetry is enabled.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) {
        if !self.config.emit_telemetry {
            return;
        }

        let mut enriched = data;
        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
            map.insert("context".to_string(), serde_json::json!(&self.config.name));
        }
        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("run_id", &self.run_id)
            .field("name", &self.config.name)
            .field("threads", &self.threads.len())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
