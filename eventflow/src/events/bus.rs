//! Event delivery.
//!
//! A [`Bus`] routes a dispatched event to the controllers interested in it.
//! For every controller it routes to, the bus must call
//! [`Event::mark_caught`] and later [`Event::report_done`] or
//! [`Event::report_failure`].

use super::Event;
use crate::context::Context;
use crate::controller::Controller;
use crate::core::ControllerId;
use crate::errors::CommandError;
use crate::executors::Spec;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Transport that delivers events to controllers.
#[cfg_attr(test, mockall::automock)]
pub trait Bus: Send + Sync {
    /// Delivers `event` to zero or more controllers.
    fn deliver(&self, ctx: &Arc<Context>, event: &Arc<Event>);
}

/// A bus that delivers to nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl Bus for NullBus {
    fn deliver(&self, _ctx: &Arc<Context>, _event: &Arc<Event>) {}
}

#[derive(Debug, Clone)]
struct Route {
    event_type: String,
    controller: Arc<Controller>,
    specs: Vec<Spec>,
}

/// An in-process bus.
///
/// Controllers register an executor list per event type. On delivery every
/// matching controller is marked caught first, then one thread per
/// controller is started against the event.
#[derive(Debug, Default)]
pub struct LocalBus {
    routes: RwLock<Vec<Route>>,
}

impl LocalBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `controller` respond to `event_type` by running `specs`.
    pub fn listen(&self, controller: &Arc<Controller>, event_type: impl Into<String>, specs: Vec<Spec>) {
        let event_type = event_type.into();
        debug!(controller = %controller.name(), %event_type, "Controller listening");
        self.routes.write().push(Route {
            event_type,
            controller: controller.clone(),
            specs,
        });
    }

    /// Removes every route of a controller.
    pub fn unlisten(&self, controller: ControllerId) {
        self.routes.write().retain(|r| r.controller.id() != controller);
    }

    /// Returns how many controllers listen to `event_type`.
    #[must_use]
    pub fn listeners(&self, event_type: &str) -> usize {
        self.routes
            .read()
            .iter()
            .filter(|r| r.event_type == event_type)
            .count()
    }
}

impl Bus for LocalBus {
    fn deliver(&self, ctx: &Arc<Context>, event: &Arc<Event>) {
        let routes: Vec<Route> = self
            .routes
            .read()
            .iter()
            .filter(|r| r.event_type == event.event_type())
            .cloned()
            .collect();

        let mut caught = Vec::with_capacity(routes.len());
        for route in routes {
            match event.mark_caught(&route.controller) {
                Ok(()) => caught.push(route),
                Err(err) => warn!(error = %err, "Skipping route"),
            }
        }

        for route in caught {
            let controller = route.controller;
            let thread = ctx.thread_for(Some(controller.clone()), route.specs);

            let (done_event, done_controller) = (event.clone(), controller.clone());
            let (fail_event, fail_controller) = (event.clone(), controller.clone());
            let started = thread.run(
                event.clone(),
                move |_thread| {
                    if let Err(err) = done_event.report_done(&done_controller) {
                        error!(error = %err, "Could not report thread completion");
                    }
                },
                move |_thread, failure, fatal| {
                    if let Err(err) = fail_event.report_failure(&fail_controller, failure.clone(), fatal) {
                        error!(error = %err, "Could not report thread failure");
                    }
                },
            );

            if let Err(err) = started {
                error!(controller = %controller.name(), error = %err, "Could not start thread");
                if let Err(err) = event.report_failure(&controller, CommandError::from(err), true) {
                    error!(error = %err, "Could not report thread start failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NotificationKind;
    use crate::events::Notification;
    use crate::executors::FunctionSpec;

    #[test]
    fn test_mock_bus_is_called_once() {
        let mut bus = MockBus::new();
        bus.expect_deliver().times(1).returning(|_, _| ());
        let ctx = Arc::new(Context::new(Arc::new(bus)));

        ctx.dispatch(ctx.event("ping")).unwrap();
    }

    #[test]
    fn test_listen_and_unlisten() {
        let bus = LocalBus::new();
        let controller = Arc::new(Controller::new(1, "form"));
        bus.listen(&controller, "save", vec![Spec::event("noop")]);
        bus.listen(&controller, "load", vec![Spec::event("noop")]);

        assert_eq!(bus.listeners("save"), 1);
        bus.unlisten(1);
        assert_eq!(bus.listeners("save"), 0);
        assert_eq!(bus.listeners("load"), 0);
    }

    #[tokio::test]
    async fn test_local_bus_runs_thread_and_settles() {
        let bus = Arc::new(LocalBus::new());
        let ctx = Arc::new(Context::new(bus.clone()));
        let controller = Arc::new(ctx.controller("form"));
        bus.listen(
            &controller,
            "save",
            vec![FunctionSpec::new("store", &["draft"], |_| Ok(())).into()],
        );

        let event = ctx.dispatch(ctx.event("save").with_value("draft", serde_json::json!("hi"))).unwrap();
        event.settled().await.unwrap();

        assert_eq!(event.completed(), vec![controller.id()]);
    }

    #[tokio::test]
    async fn test_local_bus_reports_empty_thread_as_fatal() {
        let bus = Arc::new(LocalBus::new());
        let ctx = Arc::new(Context::new(bus.clone()));
        let controller = Arc::new(ctx.controller("form"));
        bus.listen(&controller, "save", Vec::new());

        let event = ctx.dispatch(ctx.event("save")).unwrap();

        let err = event.settled().await.unwrap_err();
        assert_eq!(err.code(), Some(CommandError::CONTRACT));
        assert_eq!(
            event.notifications().iter().map(Notification::kind).collect::<Vec<_>>(),
            vec![NotificationKind::Fail, NotificationKind::Fail]
        );
    }
}
