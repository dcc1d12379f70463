//! The dispatch handle for one logical event.

use super::{Listener, Notification};
use crate::context::{Context, ValueBag};
use crate::controller::Controller;
use crate::core::{ControllerId, EventId, NotificationKind};
use crate::errors::{CommandError, EventError, EventflowError};
use crate::executors::FunctionSpec;
use crate::inject::{resolve, InjectionTable, Scope};
use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct EventState {
    in_flight: Vec<Arc<Controller>>,
    completed: Vec<Arc<Controller>>,
    caught: bool,
    delivering: bool,
    outcome: Option<Result<(), CommandError>>,
    waiters: Vec<oneshot::Sender<Result<(), CommandError>>>,
    errors: Vec<CommandError>,
    promise_result: Option<serde_json::Value>,
    promise_error: Option<CommandError>,
    log: Vec<Notification>,
    listeners: HashMap<NotificationKind, Vec<Listener>>,
}

/// A dispatched (or about to be dispatched) event.
///
/// The event tracks which controllers are handling it, aggregates their
/// completions and failures, and notifies listeners. Notifications are
/// logged so listeners added late still see what already happened.
///
/// FAIL is emitted once per reported failure. Once the last in-flight
/// controller completes the event settles: it emits DONE if nothing failed,
/// else a final FAIL carrying every recorded failure.
pub struct Event {
    id: EventId,
    event_type: String,
    values: ValueBag,
    target: Option<String>,
    source: Option<serde_json::Value>,
    cause: Option<Arc<Event>>,
    require_catch: bool,
    created_at: Timestamp,
    dispatched: AtomicBool,
    state: Mutex<EventState>,
}

impl Event {
    /// Creates a new, undispatched event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: 0,
            event_type: event_type.into(),
            values: ValueBag::new(),
            target: None,
            source: None,
            cause: None,
            require_catch: false,
            created_at: now_utc(),
            dispatched: AtomicBool::new(false),
            state: Mutex::new(EventState::default()),
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Adds a value to the value bag.
    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.set(key, value);
        self
    }

    /// Adds several values to the value bag.
    #[must_use]
    pub fn with_values<K, I>(self, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        for (key, value) in values {
            self.values.set(key, value);
        }
        self
    }

    /// Sets the dispatch target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches the underlying transport event.
    #[must_use]
    pub fn with_source(mut self, source: serde_json::Value) -> Self {
        self.source = Some(source);
        self
    }

    /// Records the event that caused this one.
    #[must_use]
    pub fn caused_by(mut self, cause: Arc<Event>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Requires at least one controller to catch this event.
    #[must_use]
    pub fn requiring_catch(mut self, required: bool) -> Self {
        self.require_catch = required;
        self
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the value bag.
    #[must_use]
    pub fn values(&self) -> &ValueBag {
        &self.values
    }

    /// Returns the dispatch target.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the underlying transport event.
    #[must_use]
    pub fn source(&self) -> Option<&serde_json::Value> {
        self.source.as_ref()
    }

    /// Returns the causing event.
    #[must_use]
    pub fn cause(&self) -> Option<&Arc<Event>> {
        self.cause.as_ref()
    }

    /// Returns when the event was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Describes where the event came from, for diagnostics.
    #[must_use]
    pub fn origin(&self) -> String {
        match &self.target {
            Some(target) => format!("{}#{} on '{}'", self.event_type, self.id, target),
            None => format!("{}#{}", self.event_type, self.id),
        }
    }

    /// Returns true if a catch is required.
    #[must_use]
    pub fn requires_catch(&self) -> bool {
        self.require_catch
    }

    /// Returns true once dispatched.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Returns true once any controller caught the event.
    #[must_use]
    pub fn is_caught(&self) -> bool {
        self.state.lock().caught
    }

    /// Returns true once the final aggregation ran.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// Returns the ids of controllers still handling the event.
    #[must_use]
    pub fn in_flight(&self) -> Vec<ControllerId> {
        self.state.lock().in_flight.iter().map(|c| c.id()).collect()
    }

    /// Returns the ids of controllers that finished, in completion order.
    #[must_use]
    pub fn completed(&self) -> Vec<ControllerId> {
        self.state.lock().completed.iter().map(|c| c.id()).collect()
    }

    /// Returns every recorded failure.
    #[must_use]
    pub fn errors(&self) -> Vec<CommandError> {
        self.state.lock().errors.clone()
    }

    /// Returns every notification emitted so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().log.clone()
    }

    /// Returns the last promise result, falling back along the cause chain.
    #[must_use]
    pub fn promise_result(&self) -> Option<serde_json::Value> {
        let own = self.state.lock().promise_result.clone();
        own.or_else(|| self.cause.as_ref().and_then(|cause| cause.promise_result()))
    }

    /// Returns the last promise error, falling back along the cause chain.
    #[must_use]
    pub fn promise_error(&self) -> Option<CommandError> {
        let own = self.state.lock().promise_error.clone();
        own.or_else(|| self.cause.as_ref().and_then(|cause| cause.promise_error()))
    }

    pub(crate) fn set_promise_result(&self, value: serde_json::Value) {
        self.state.lock().promise_result = Some(value);
    }

    pub(crate) fn set_promise_error(&self, error: CommandError) {
        self.state.lock().promise_error = Some(error);
    }

    /// Delivers the event through the context's bus.
    ///
    /// Completion is not evaluated while the bus is delivering, so a thread
    /// that finishes before its siblings were caught cannot settle the event
    /// early. An event nobody caught settles DONE right after delivery.
    pub fn dispatch(self: &Arc<Self>, ctx: &Arc<Context>) -> Result<(), EventError> {
        if ctx.is_torn_down() {
            return Err(EventError::TornDown {
                context: ctx.name().to_string(),
            });
        }
        if self.dispatched.swap(true, Ordering::SeqCst) {
            return Err(EventError::DoubleDispatch {
                event_type: self.event_type.clone(),
                event_id: self.id,
            });
        }

        self.state.lock().delivering = true;
        info!(event_type = %self.event_type, event_id = self.id, "Dispatching event");
        ctx.emit(
            "event.dispatched",
            json!({
                "event_id": self.id,
                "event_type": &self.event_type,
                "target": &self.target,
            }),
        );

        ctx.bus().deliver(ctx, self);

        let caught = {
            let mut state = self.state.lock();
            state.delivering = false;
            state.caught
        };

        if self.require_catch && !caught {
            if ctx.config().warn_on_uncaught {
                warn!(
                    event_type = %self.event_type,
                    origin = %self.origin(),
                    "Event requires a catch but no controller caught it"
                );
            }
            ctx.emit(
                "event.uncaught",
                json!({"event_id": self.id, "event_type": &self.event_type}),
            );
        }

        self.check_completion();
        Ok(())
    }

    /// Records that `controller` started handling the event.
    pub fn mark_caught(&self, controller: &Arc<Controller>) -> Result<(), EventError> {
        let mut state = self.state.lock();
        let reason = if state.in_flight.iter().any(|c| c.id() == controller.id()) {
            Some("already in flight")
        } else if state.completed.iter().any(|c| c.id() == controller.id()) {
            Some("already completed")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(EventError::InvalidController {
                controller: controller.name().to_string(),
                event_type: self.event_type.clone(),
                reason: reason.to_string(),
            });
        }

        state.in_flight.push(controller.clone());
        state.caught = true;
        debug!(
            event_type = %self.event_type,
            controller = %controller.name(),
            "Controller caught event"
        );
        Ok(())
    }

    /// Moves `controller` from in-flight to completed.
    pub fn mark_uncaught(&self, controller: &Controller) -> Result<(), EventError> {
        let mut state = self.state.lock();
        let Some(pos) = state.in_flight.iter().position(|c| c.id() == controller.id()) else {
            return Err(self.not_found(controller));
        };
        let finished = state.in_flight.remove(pos);
        state.completed.push(finished);
        Ok(())
    }

    /// Records a failure reported by `controller` and emits FAIL.
    ///
    /// A fatal failure also completes the controller.
    pub fn report_failure(
        &self,
        controller: &Controller,
        error: CommandError,
        fatal: bool,
    ) -> Result<(), EventError> {
        if fatal {
            self.mark_uncaught(controller)?;
        } else if !self.state.lock().in_flight.iter().any(|c| c.id() == controller.id()) {
            return Err(self.not_found(controller));
        }

        warn!(
            event_type = %self.event_type,
            controller = %controller.name(),
            fatal,
            error = %error,
            "Controller reported failure"
        );
        self.state.lock().errors.push(error.clone());
        self.notify(Notification::Fail(error));

        if fatal {
            self.check_completion();
        }
        Ok(())
    }

    /// Records that `controller` finished.
    pub fn report_done(&self, controller: &Controller) -> Result<(), EventError> {
        self.mark_uncaught(controller)?;
        debug!(
            event_type = %self.event_type,
            controller = %controller.name(),
            "Controller finished event"
        );
        self.check_completion();
        Ok(())
    }

    fn not_found(&self, controller: &Controller) -> EventError {
        EventError::ControllerNotFound {
            controller: controller.name().to_string(),
            event_type: self.event_type.clone(),
        }
    }

    fn check_completion(&self) {
        let (outcome, waiters) = {
            let mut state = self.state.lock();
            if state.delivering
                || state.outcome.is_some()
                || !state.in_flight.is_empty()
                || !self.is_dispatched()
            {
                return;
            }
            let outcome = if state.errors.is_empty() {
                Ok(())
            } else {
                Err(CommandError::combine(&state.errors))
            };
            state.outcome = Some(outcome.clone());
            (outcome, std::mem::take(&mut state.waiters))
        };

        match &outcome {
            Ok(()) => {
                info!(event_type = %self.event_type, event_id = self.id, "Event done");
                self.notify(Notification::Done);
            }
            Err(err) => {
                info!(event_type = %self.event_type, event_id = self.id, error = %err, "Event failed");
                self.notify(Notification::Fail(err.clone()));
            }
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn notify(&self, notification: Notification) {
        let listeners = {
            let mut state = self.state.lock();
            state.log.push(notification.clone());
            state
                .listeners
                .get(&notification.kind())
                .cloned()
                .unwrap_or_default()
        };
        for listener in listeners {
            listener.call(&notification);
        }
    }

    fn register(&self, kind: NotificationKind, listener: Listener, reject_duplicate: bool) -> Result<(), EventError> {
        let replay: Vec<Notification> = {
            let mut state = self.state.lock();
            let registered = state.listeners.entry(kind).or_default();
            if reject_duplicate && registered.iter().any(|l| l.same_as(&listener)) {
                return Err(EventError::DuplicateListener {
                    kind,
                    event_type: self.event_type.clone(),
                });
            }
            registered.push(listener.clone());
            state.log.iter().filter(|n| n.kind() == kind).cloned().collect()
        };

        for notification in &replay {
            debug!(event_type = %self.event_type, %kind, "Replaying notification to late listener");
            listener.call(notification);
        }
        Ok(())
    }

    /// Registers a listener for one notification kind.
    ///
    /// Notifications of that kind that already fired are replayed to it
    /// immediately. Registering the same listener twice is an error.
    pub fn add_listener(&self, kind: NotificationKind, listener: Listener) -> Result<&Self, EventError> {
        self.register(kind, listener, true)?;
        Ok(self)
    }

    /// Registers a DONE handler and a FAIL handler.
    pub fn then<D, F>(&self, on_done: D, on_fail: F) -> Result<&Self, EventError>
    where
        D: Fn() + Send + Sync + 'static,
        F: Fn(&CommandError) + Send + Sync + 'static,
    {
        self.add_listener(NotificationKind::Done, Listener::new(move |_| on_done()))?;
        self.catch(on_fail)
    }

    /// Registers a FAIL handler.
    pub fn catch<F>(&self, on_fail: F) -> Result<&Self, EventError>
    where
        F: Fn(&CommandError) + Send + Sync + 'static,
    {
        self.add_fail_listener(on_fail)
    }

    /// Registers a FAIL handler receiving the reported error.
    pub fn add_fail_listener<F>(&self, handler: F) -> Result<&Self, EventError>
    where
        F: Fn(&CommandError) + Send + Sync + 'static,
    {
        self.add_listener(
            NotificationKind::Fail,
            Listener::new(move |n| {
                if let Some(err) = n.error() {
                    handler(err);
                }
            }),
        )
    }

    /// Registers a DONE handler whose declared arguments are resolved
    /// against this event.
    ///
    /// Resolution is checked once at registration so a missing name fails
    /// here instead of when DONE fires.
    pub fn add_done_listener(self: &Arc<Self>, handler: FunctionSpec) -> Result<&Arc<Self>, EventflowError> {
        let table = InjectionTable::new(handler.args().to_vec());
        resolve(&table, &Scope::new(self))?;

        let event = Arc::downgrade(self);
        self.add_listener(
            NotificationKind::Done,
            Listener::new(move |_| {
                let Some(event) = event.upgrade() else {
                    return;
                };
                match resolve(&table, &Scope::new(&event)) {
                    Ok(args) => {
                        if let Err(err) = handler.call(args) {
                            warn!(handler = %handler.name(), error = %err, "Done listener failed");
                        }
                    }
                    Err(err) => error!(handler = %handler.name(), error = %err, "Done listener arguments unresolved"),
                }
            }),
        )?;
        Ok(self)
    }

    /// Resolves once the event settles.
    ///
    /// Per-failure FAIL notifications do not resolve it: it waits for every
    /// in-flight controller, then yields `Ok` on DONE or the combined
    /// failure on the final FAIL.
    pub fn settled(&self) -> impl Future<Output = Result<(), CommandError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            match &state.outcome {
                Some(outcome) => {
                    let _ = tx.send(outcome.clone());
                }
                None => state.waiters.push(tx),
            }
        }

        async move {
            rx.await
                .unwrap_or_else(|_| Err(CommandError::new("event dropped before settling")))
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("dispatched", &self.is_dispatched())
            .field("in_flight", &self.in_flight())
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}
