//! The runnable unit of a thread.

use super::command::Command;
use super::factory::ExecutorFactory;
use super::outcome::{Completion, Outcome};
use super::spec::{ConditionalSpec, EventSpec, FunctionSpec, PromiseSpec};
use crate::core::{ExecutorId, ExecutorKind, ExecutorState, ThreadId};
use crate::errors::{CommandError, ThreadError};
use crate::events::Event;
use crate::inject::{resolve, Args, InjectionTable, Scope};
use crate::thread::Thread;
use crate::utils::{duration_ms, now_utc, Timestamp};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, warn};

pub(crate) enum Body {
    Function(FunctionSpec),
    Promise(PromiseSpec),
    Command {
        command: Mutex<Option<Box<dyn Command>>>,
        args: Arc<[String]>,
    },
    Conditional(ConditionalSpec),
    Parallel(Vec<Arc<Executor>>),
    Event(EventSpec),
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: ExecutorState,
    started_at: Option<Timestamp>,
    ended_at: Option<Timestamp>,
}

/// One unit of work owned by a thread.
///
/// Moves through `NotStarted -> Running -> Done | Failed` exactly once; an
/// executor is never reused.
pub struct Executor {
    id: ExecutorId,
    kind: ExecutorKind,
    label: String,
    thread_id: ThreadId,
    thread: Weak<Thread>,
    body: Body,
    table: OnceLock<InjectionTable>,
    lifecycle: Mutex<Lifecycle>,
}

impl Executor {
    pub(crate) fn new(id: ExecutorId, kind: ExecutorKind, label: String, thread: &Arc<Thread>, body: Body) -> Self {
        Self {
            id,
            kind,
            label,
            thread_id: thread.id(),
            thread: Arc::downgrade(thread),
            body,
            table: OnceLock::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Returns the executor id.
    #[must_use]
    pub fn id(&self) -> ExecutorId {
        self.id
    }

    /// Returns the executor kind.
    #[must_use]
    pub fn kind(&self) -> ExecutorKind {
        self.kind
    }

    /// Returns the label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ExecutorState {
        self.lifecycle.lock().state
    }

    /// Returns when execution started.
    #[must_use]
    pub fn started_at(&self) -> Option<Timestamp> {
        self.lifecycle.lock().started_at
    }

    /// Returns when execution ended.
    #[must_use]
    pub fn ended_at(&self) -> Option<Timestamp> {
        self.lifecycle.lock().ended_at
    }

    /// Returns the execution time once the executor finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        let lifecycle = self.lifecycle.lock();
        match (&lifecycle.started_at, &lifecycle.ended_at) {
            (Some(start), Some(end)) => Some(duration_ms(start, end)),
            _ => None,
        }
    }

    /// Runs the executor to its outcome.
    pub fn execute(&self) -> BoxFuture<'_, Outcome> {
        async move {
            if let Err(outcome) = self.begin() {
                return outcome;
            }

            let outcome = match self.thread.upgrade() {
                Some(thread) => self.run(&thread).await,
                None => Outcome::fatal(ThreadError::Destroyed {
                    thread_id: self.thread_id,
                }),
            };

            self.finish(&outcome);
            outcome
        }
        .boxed()
    }

    fn begin(&self) -> Result<(), Outcome> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != ExecutorState::NotStarted {
            return Err(Outcome::fatal(
                CommandError::new(format!("Executor '{}' already ran", self.label)).with_code(CommandError::CONTRACT),
            ));
        }
        lifecycle.state = ExecutorState::Running;
        lifecycle.started_at = Some(now_utc());
        debug!(executor = %self.label, kind = %self.kind, "Executor started");
        Ok(())
    }

    fn finish(&self, outcome: &Outcome) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = outcome.state();
        lifecycle.ended_at = Some(now_utc());
        debug!(executor = %self.label, state = %lifecycle.state, "Executor finished");
    }

    async fn run(&self, thread: &Arc<Thread>) -> Outcome {
        let Some(event) = thread.event() else {
            return Outcome::fatal(
                CommandError::new(format!("Thread #{} has no event", thread.id())).with_code(CommandError::CONTRACT),
            );
        };

        match &self.body {
            Body::Function(spec) => self.run_function(thread, &event, spec).await,
            Body::Promise(spec) => self.run_promise(thread, &event, spec).await,
            Body::Command { command, args } => self.run_command(thread, &event, command, args).await,
            Body::Conditional(spec) => self.run_conditional(thread, &event, spec).await,
            Body::Parallel(members) => run_parallel(members).await,
            Body::Event(spec) => run_event(thread, &event, spec).await,
        }
    }

    fn bind(
        &self,
        names: impl FnOnce() -> Arc<[String]>,
        thread: &Arc<Thread>,
        event: &Arc<Event>,
        completion: Option<&Completion>,
    ) -> Result<Args, CommandError> {
        let table = self.table.get_or_init(|| InjectionTable::new(names()));
        let mut scope = Scope::new(event).with_thread(thread);
        if let Some(completion) = completion {
            scope = scope.with_completion(completion);
        }
        resolve(table, &scope).map_err(|err| {
            error!(executor = %self.label, error = %err, "Argument resolution failed");
            CommandError::from(err)
        })
    }

    fn wants_completion(&self, names: impl FnOnce() -> Arc<[String]>) -> bool {
        self.table.get_or_init(|| InjectionTable::new(names())).wants_completion()
    }

    async fn run_function(&self, thread: &Arc<Thread>, event: &Arc<Event>, spec: &FunctionSpec) -> Outcome {
        if !self.wants_completion(|| spec.shared_args()) {
            return match self.bind(|| spec.shared_args(), thread, event, None) {
                Ok(args) => Outcome::from(spec.call(args)),
                Err(err) => Outcome::fatal(err),
            };
        }

        let (completion, rx) = Completion::channel(self.label.as_str());
        let args = match self.bind(|| spec.shared_args(), thread, event, Some(&completion)) {
            Ok(args) => args,
            Err(err) => return Outcome::fatal(err),
        };
        let result = spec.call(args);
        self.settle_deferred(completion, result, rx).await
    }

    async fn run_promise(&self, thread: &Arc<Thread>, event: &Arc<Event>, spec: &PromiseSpec) -> Outcome {
        let args = match self.bind(|| spec.shared_args(), thread, event, None) {
            Ok(args) => args,
            Err(err) => return Outcome::fatal(err),
        };

        match spec.call(args).await {
            Ok(value) => {
                event.set_promise_result(value);
                Outcome::Done
            }
            Err(err) => {
                warn!(executor = %self.label, error = %err, "Promise rejected");
                event.set_promise_error(err.clone());
                Outcome::failed(err)
            }
        }
    }

    async fn run_command(
        &self,
        thread: &Arc<Thread>,
        event: &Arc<Event>,
        slot: &Mutex<Option<Box<dyn Command>>>,
        names: &Arc<[String]>,
    ) -> Outcome {
        let Some(mut command) = slot.lock().take() else {
            return Outcome::fatal(
                CommandError::new(format!("Command '{}' was already consumed", self.label))
                    .with_code(CommandError::CONTRACT),
            );
        };

        if !self.wants_completion(|| names.clone()) {
            return match self.bind(|| names.clone(), thread, event, None) {
                Ok(args) => Outcome::from(command.execute(args).await),
                Err(err) => Outcome::fatal(err),
            };
        }

        let (completion, rx) = Completion::channel(self.label.as_str());
        let args = match self.bind(|| names.clone(), thread, event, Some(&completion)) {
            Ok(args) => args,
            Err(err) => return Outcome::fatal(err),
        };
        let result = command.execute(args).await;
        drop(command);
        self.settle_deferred(completion, result, rx).await
    }

    /// Waits for a handler that declared `done`/`fail` to call one of them.
    ///
    /// An error returned by the handler itself counts as `fail` unless a
    /// continuation already ran.
    async fn settle_deferred(
        &self,
        completion: Completion,
        result: Result<(), CommandError>,
        rx: tokio::sync::oneshot::Receiver<Outcome>,
    ) -> Outcome {
        if let Err(err) = result {
            if !completion.fail(err.clone()) {
                warn!(executor = %self.label, error = %err, "Handler returned an error after completing");
            }
        }
        drop(completion);

        rx.await.unwrap_or_else(|_| {
            Outcome::fatal(
                CommandError::new(format!(
                    "Executor '{}' dropped its continuations without calling done or fail",
                    self.label
                ))
                .with_code(CommandError::CONTRACT),
            )
        })
    }

    async fn run_conditional(&self, thread: &Arc<Thread>, event: &Arc<Event>, spec: &ConditionalSpec) -> Outcome {
        let predicate = spec.predicate();
        let args = match self.bind(|| predicate.shared_args(), thread, event, None) {
            Ok(args) => args,
            Err(err) => return Outcome::fatal(err),
        };

        let choice = match predicate.evaluate(&args) {
            Ok(choice) => choice,
            Err(err) => return Outcome::failed(err),
        };
        debug!(executor = %self.label, choice, "Conditional evaluated");

        match spec.branch(choice) {
            Some(branch) => {
                let executor = ExecutorFactory::build(branch, thread);
                executor.execute().await
            }
            None => Outcome::Done,
        }
    }
}

async fn run_parallel(members: &[Arc<Executor>]) -> Outcome {
    let outcomes = join_all(members.iter().map(|m| m.execute())).await;

    let fatal = outcomes.iter().any(Outcome::is_fatal);
    match outcomes.into_iter().find_map(|o| o.error().cloned()) {
        Some(error) => Outcome::Failed { error, fatal },
        None => Outcome::Done,
    }
}

async fn run_event(thread: &Arc<Thread>, parent: &Arc<Event>, spec: &EventSpec) -> Outcome {
    let Some(ctx) = thread.context() else {
        return Outcome::fatal(ThreadError::Destroyed { thread_id: thread.id() });
    };

    let mut child = ctx
        .event(spec.event_type())
        .with_values(spec.values().clone())
        .caused_by(parent.clone())
        .requiring_catch(spec.requires_catch());
    if let Some(target) = spec.target() {
        child = child.with_target(target);
    }

    let child = match ctx.dispatch(child) {
        Ok(child) => child,
        Err(err) => return Outcome::fatal(err),
    };

    match child.settled().await {
        Ok(()) => Outcome::Done,
        Err(err) => Outcome::failed(err),
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("thread_id", &self.thread_id)
            .field("state", &self.state())
            .finish()
    }
}
