//! The sequential executor runner.
//!
//! A [`Thread`] runs one controller's executor list against one event,
//! strictly one executor at a time. Between two executors the drive loop
//! yields back to the scheduler, so a long list never grows the stack and
//! never starves other tasks.

use crate::context::Context;
use crate::controller::Controller;
use crate::core::{ExecutorId, ExecutorKind, ExecutorState, ThreadId};
use crate::errors::{CommandError, EventflowError, ThreadError};
use crate::events::Event;
use crate::executors::{Executor, ExecutorFactory, Outcome, Spec};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// A finished executor, as recorded when it was evicted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedStep {
    /// The executor id.
    pub id: ExecutorId,
    /// The executor kind.
    pub kind: ExecutorKind,
    /// The executor label.
    pub label: String,
    /// The terminal state.
    pub state: ExecutorState,
    /// How long it ran.
    pub duration_ms: Option<f64>,
}

#[derive(Default)]
struct ThreadState {
    event: Option<Arc<Event>>,
    index: usize,
    executors: Vec<Option<Arc<Executor>>>,
    errors: Vec<CommandError>,
    executed: Vec<ExecutedStep>,
}

/// Runs an ordered list of executors against one event.
pub struct Thread {
    id: ThreadId,
    specs: Vec<Spec>,
    controller: Option<Arc<Controller>>,
    context: Weak<Context>,
    running: AtomicBool,
    destroyed: AtomicBool,
    state: Mutex<ThreadState>,
}

impl Thread {
    /// Creates a thread. Use [`Context::thread_for`] to also register it as
    /// live.
    #[must_use]
    pub fn new(id: ThreadId, specs: Vec<Spec>, controller: Option<Arc<Controller>>, ctx: &Arc<Context>) -> Self {
        Self {
            id,
            specs,
            controller,
            context: Arc::downgrade(ctx),
            running: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            state: Mutex::new(ThreadState::default()),
        }
    }

    /// Returns the thread id.
    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns the owning controller.
    #[must_use]
    pub fn controller(&self) -> Option<&Arc<Controller>> {
        self.controller.as_ref()
    }

    /// Returns the owning context, unless it was dropped.
    #[must_use]
    pub fn context(&self) -> Option<Arc<Context>> {
        self.context.upgrade()
    }

    /// Returns the event of the current run.
    #[must_use]
    pub fn event(&self) -> Option<Arc<Event>> {
        self.state.lock().event.clone()
    }

    /// Returns the index of the current executor.
    #[must_use]
    pub fn index(&self) -> usize {
        self.state.lock().index
    }

    /// Returns the number of executor specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if the thread has no executor specs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns true once the thread was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Returns the failures recorded during the current run.
    #[must_use]
    pub fn errors(&self) -> Vec<CommandError> {
        self.state.lock().errors.clone()
    }

    /// Returns the executors that finished, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<ExecutedStep> {
        self.state.lock().executed.clone()
    }

    /// Returns the executor currently running, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Executor>> {
        let state = self.state.lock();
        state.executors.get(state.index).cloned().flatten()
    }

    /// Starts running the executor list against `event`.
    ///
    /// The executors are built from the specs, in order, and driven on a
    /// spawned task. `on_fail` is called for every failure with its fatal
    /// flag. `on_done` is called once the last executor finished, unless a
    /// fatal failure stopped the thread first.
    pub fn run<D, F>(self: &Arc<Self>, event: Arc<Event>, on_done: D, on_fail: F) -> Result<JoinHandle<()>, ThreadError>
    where
        D: FnOnce(&Arc<Thread>) + Send + 'static,
        F: Fn(&Arc<Thread>, &CommandError, bool) + Send + 'static,
    {
        let thread_id = self.id;
        if self.is_destroyed() {
            return Err(ThreadError::Destroyed { thread_id });
        }
        if self.is_running() {
            return Err(ThreadError::AlreadyRunning { thread_id });
        }
        if self.specs.is_empty() {
            return Err(ThreadError::EmptyExecutorList { thread_id });
        }
        let runtime = Handle::try_current().map_err(|_| ThreadError::NoRuntime { thread_id })?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ThreadError::AlreadyRunning { thread_id });
        }

        let executors = ExecutorFactory::build_all(&self.specs, self);
        {
            let mut state = self.state.lock();
            state.event = Some(event.clone());
            state.index = 0;
            state.errors.clear();
            state.executed.clear();
            state.executors = executors.into_iter().map(Some).collect();
        }

        info!(
            thread_id,
            event_type = %event.event_type(),
            controller = self.controller.as_ref().map(|c| c.name()),
            executors = self.specs.len(),
            "Thread started"
        );

        let span = info_span!("thread", thread_id, event_type = %event.event_type());
        let thread = self.clone();
        Ok(runtime.spawn(async move { thread.drive(on_done, on_fail).await }.instrument(span)))
    }

    async fn drive<D, F>(self: Arc<Self>, on_done: D, on_fail: F)
    where
        D: FnOnce(&Arc<Thread>),
        F: Fn(&Arc<Thread>, &CommandError, bool),
    {
        loop {
            if !self.is_running() || self.is_destroyed() {
                debug!(thread_id = self.id, "Thread stopped before its next step");
                return;
            }

            let (index, executor) = {
                let state = self.state.lock();
                (state.index, state.executors.get(state.index).cloned().flatten())
            };
            let Some(executor) = executor else {
                // Evicted by a teardown that raced this step.
                debug!(thread_id = self.id, index, "Executor already evicted");
                return;
            };

            self.emit(
                "executor.started",
                json!({"executor_id": executor.id(), "kind": executor.kind(), "index": index}),
            );
            let outcome = executor.execute().await;

            if self.is_destroyed() {
                debug!(thread_id = self.id, executor = %executor.label(), "Discarding outcome of destroyed thread");
                return;
            }
            self.evict(index);
            if !self.is_running() {
                debug!(thread_id = self.id, executor = %executor.label(), "Discarding outcome of killed thread");
                return;
            }

            if let Outcome::Failed { error, fatal } = &outcome {
                self.state.lock().errors.push(error.clone());
                on_fail(&self, error, *fatal);
                if *fatal {
                    warn!(thread_id = self.id, executor = %executor.label(), error = %error, "Thread stopped by fatal failure");
                    self.stop("thread.failed");
                    return;
                }
            }

            let finished = {
                let mut state = self.state.lock();
                state.index += 1;
                state.index >= state.executors.len()
            };
            if finished {
                info!(thread_id = self.id, errors = self.errors().len(), "Thread completed");
                self.stop("thread.completed");
                on_done(&self);
                return;
            }

            tokio::task::yield_now().await;
        }
    }

    fn evict(&self, index: usize) {
        let Some(executor) = self.state.lock().executors.get_mut(index).and_then(Option::take) else {
            return;
        };

        let step = ExecutedStep {
            id: executor.id(),
            kind: executor.kind(),
            label: executor.label().to_string(),
            state: executor.state(),
            duration_ms: executor.duration_ms(),
        };
        self.emit(
            "executor.evicted",
            json!({
                "executor_id": step.id,
                "kind": step.kind,
                "label": &step.label,
                "state": step.state,
                "duration_ms": step.duration_ms,
            }),
        );
        self.state.lock().executed.push(step);
    }

    fn stop(&self, record: &str) {
        self.running.store(false, Ordering::SeqCst);
        let remaining = {
            let mut state = self.state.lock();
            state.executors.clear();
            state.errors.len()
        };
        self.emit(record, json!({"errors": remaining}));
        if let Some(ctx) = self.context() {
            ctx.forget_thread(self.id);
        }
    }

    /// Stops the thread before its next step.
    ///
    /// An executor already running is not aborted, but its outcome is
    /// discarded and neither `on_done` nor `on_fail` is called again. The
    /// event is not told: its controller stays in flight, so the event and
    /// any sub-event trigger awaiting it never settle. Use
    /// [`kill_and_report`](Self::kill_and_report) when the event must
    /// still settle.
    pub fn kill(&self) {
        self.halt();
    }

    /// Kills the thread and reports a fatal failure to its event on behalf
    /// of the owning controller.
    ///
    /// Returns false if the thread was not running. A thread without a
    /// controller is only killed.
    pub fn kill_and_report(&self) -> bool {
        if !self.halt() {
            return false;
        }
        let (Some(controller), Some(event)) = (self.controller.as_ref(), self.event()) else {
            return true;
        };
        let error = CommandError::new(format!("Thread #{} was killed", self.id)).with_code(CommandError::KILLED);
        if let Err(err) = event.report_failure(controller, error, true) {
            debug!(thread_id = self.id, error = %err, "Killed thread had already reported");
        }
        true
    }

    fn halt(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        info!(thread_id = self.id, index = self.index(), "Thread killed");
        self.emit("thread.killed", json!({"index": self.index()}));
        true
    }

    /// Kills the thread and drops its executors.
    ///
    /// Late completions arriving afterwards are discarded silently.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.state.lock().executors.clear();
        debug!(thread_id = self.id, "Thread destroyed");
        if let Some(ctx) = self.context() {
            ctx.forget_thread(self.id);
        }
    }

    /// Dispatches a sub-event caused by this thread's event.
    pub fn trigger<K, I>(&self, event_type: impl Into<String>, values: I) -> Result<Arc<Event>, EventflowError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let thread_id = self.id;
        if self.is_destroyed() {
            return Err(ThreadError::Destroyed { thread_id }.into());
        }
        let ctx = self.context().ok_or(ThreadError::Destroyed { thread_id })?;

        let mut event = ctx.event(event_type).with_values(values);
        if let Some(cause) = self.event() {
            event = event.caused_by(cause);
        }
        Ok(ctx.dispatch(event)?)
    }

    fn emit(&self, record: &str, mut data: serde_json::Value) {
        let Some(ctx) = self.context() else {
            return;
        };
        if let serde_json::Value::Object(ref mut map) = data {
            map.insert("thread_id".to_string(), json!(self.id));
            if let Some(controller) = &self.controller {
                map.insert("controller".to_string(), json!(controller.name()));
            }
        }
        ctx.emit(record, data);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("controller", &self.controller.as_ref().map(|c| c.name()))
            .field("specs", &self.specs.len())
            .field("running", &self.is_running())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
