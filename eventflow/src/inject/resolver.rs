//! Name-based argument resolution.

use super::{Arg, Args};
use crate::controller::Controller;
use crate::errors::UnresolvedArgumentError;
use crate::events::Event;
use crate::executors::Completion;
use crate::thread::Thread;
use serde_json::Value;
use std::sync::Arc;

/// Well-known names every handler can declare.
pub mod names {
    /// The controller owning the thread.
    pub const CONTROLLER: &str = "controller";
    /// The thread running the executor.
    pub const THREAD: &str = "thread";
    /// The event being handled.
    pub const EVENT: &str = "event";
    /// The underlying transport event.
    pub const SOURCE_EVENT: &str = "source_event";
    /// The dispatch target.
    pub const TARGET: &str = "target";
    /// The success continuation.
    pub const DONE: &str = "done";
    /// The failure continuation.
    pub const FAIL: &str = "fail";
    /// The last promise result along the cause chain.
    pub const PROMISE_RESULT: &str = "promise_result";
    /// The last promise error along the cause chain.
    pub const PROMISE_ERROR: &str = "promise_error";
}

/// A value the engine can inject by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injectable {
    /// See [`names::CONTROLLER`].
    Controller,
    /// See [`names::THREAD`].
    Thread,
    /// See [`names::EVENT`].
    Event,
    /// See [`names::SOURCE_EVENT`].
    SourceEvent,
    /// See [`names::TARGET`].
    Target,
    /// See [`names::DONE`].
    Done,
    /// See [`names::FAIL`].
    Fail,
    /// See [`names::PROMISE_RESULT`].
    PromiseResult,
    /// See [`names::PROMISE_ERROR`].
    PromiseError,
}

impl Injectable {
    /// Maps a declared name to a well-known injectable.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            names::CONTROLLER => Self::Controller,
            names::THREAD => Self::Thread,
            names::EVENT => Self::Event,
            names::SOURCE_EVENT => Self::SourceEvent,
            names::TARGET => Self::Target,
            names::DONE => Self::Done,
            names::FAIL => Self::Fail,
            names::PROMISE_RESULT => Self::PromiseResult,
            names::PROMISE_ERROR => Self::PromiseError,
            _ => return None,
        })
    }
}

/// The declared names of a handler with their well-known slots
/// precomputed.
///
/// Executors build this once and reuse it for every resolution.
#[derive(Debug, Clone)]
pub struct InjectionTable {
    names: Arc<[String]>,
    slots: Vec<Option<Injectable>>,
}

impl InjectionTable {
    /// Builds the table for `names`.
    #[must_use]
    pub fn new(names: impl Into<Arc<[String]>>) -> Self {
        let names = names.into();
        let slots = names.iter().map(|n| Injectable::from_name(n)).collect();
        Self { names, slots }
    }

    /// Returns the declared names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns true if the handler declared `done` or `fail`.
    #[must_use]
    pub fn wants_completion(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s, Some(Injectable::Done | Injectable::Fail)))
    }
}

/// Everything a resolution may draw from.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    event: &'a Arc<Event>,
    thread: Option<&'a Arc<Thread>>,
    controller: Option<&'a Arc<Controller>>,
    completion: Option<&'a Completion>,
}

impl<'a> Scope<'a> {
    /// A scope with only the event.
    #[must_use]
    pub fn new(event: &'a Arc<Event>) -> Self {
        Self {
            event,
            thread: None,
            controller: None,
            completion: None,
        }
    }

    /// Adds the running thread and its controller.
    #[must_use]
    pub fn with_thread(mut self, thread: &'a Arc<Thread>) -> Self {
        self.thread = Some(thread);
        self.controller = thread.controller();
        self
    }

    /// Adds the continuation handed out as `done`/`fail`.
    #[must_use]
    pub fn with_completion(mut self, completion: &'a Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    fn origin(&self) -> String {
        match self.controller {
            Some(c) => format!("{} (controller '{}')", self.event.origin(), c.name()),
            None => self.event.origin(),
        }
    }

    fn injectable(&self, slot: Injectable) -> Option<Arg> {
        match slot {
            Injectable::Controller => self.controller.map(|c| Arg::Controller(c.clone())),
            Injectable::Thread => self.thread.map(|t| Arg::Thread(t.clone())),
            Injectable::Event => Some(Arg::Event(self.event.clone())),
            Injectable::SourceEvent => Some(Arg::Value(self.event.source().cloned().unwrap_or(Value::Null))),
            Injectable::Target => Some(Arg::Value(
                self.event.target().map_or(Value::Null, |t| Value::String(t.to_string())),
            )),
            Injectable::Done => self.completion.map(|c| Arg::Done(c.clone())),
            Injectable::Fail => self.completion.map(|c| Arg::Fail(c.clone())),
            Injectable::PromiseResult => Some(Arg::Value(self.event.promise_result().unwrap_or(Value::Null))),
            Injectable::PromiseError => Some(Arg::Error(self.event.promise_error())),
        }
    }
}

/// Binds every declared name in `table` to a value.
///
/// For each name the lookup order is:
/// 1. the event's value bag;
/// 2. the well-known injectables, then the controller's injections;
/// 3. otherwise the resolution fails, naming the missing argument, every
///    declared argument and the dispatch origin.
pub fn resolve(table: &InjectionTable, scope: &Scope<'_>) -> Result<Args, UnresolvedArgumentError> {
    let mut values = Vec::with_capacity(table.names.len());

    for (name, slot) in table.names.iter().zip(&table.slots) {
        let arg = scope
            .event
            .values()
            .get(name)
            .map(Arg::Value)
            .or_else(|| (*slot).and_then(|s| scope.injectable(s)))
            .or_else(|| {
                scope
                    .controller
                    .and_then(|c| c.injections().get(name))
                    .map(Arg::Value)
            });

        match arg {
            Some(arg) => values.push(arg),
            None => {
                return Err(UnresolvedArgumentError::new(
                    name.clone(),
                    &table.names,
                    scope.origin(),
                ))
            }
        }
    }

    Ok(Args::new(table.names.clone(), values))
}
