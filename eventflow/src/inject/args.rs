//! Resolved argument lists.

use crate::controller::Controller;
use crate::errors::CommandError;
use crate::events::Event;
use crate::executors::Completion;
use crate::thread::Thread;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// One resolved argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A JSON value from the value bag, an injection, or a well-known
    /// value such as `target` or `promise_result`.
    Value(serde_json::Value),
    /// The owning controller.
    Controller(Arc<Controller>),
    /// The owning thread.
    Thread(Arc<Thread>),
    /// The event being handled.
    Event(Arc<Event>),
    /// The `done` continuation.
    Done(Completion),
    /// The `fail` continuation.
    Fail(Completion),
    /// The last promise error along the cause chain.
    Error(Option<CommandError>),
}

impl Arg {
    /// Returns the JSON value, if this is a value argument.
    #[must_use]
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Arguments bound to a handler's declared names, in declaration order.
#[derive(Debug, Clone)]
pub struct Args {
    names: Arc<[String]>,
    values: Vec<Arg>,
}

impl Args {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<Arg>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Returns the declared names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no arguments were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the argument at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Arg> {
        self.values.get(index)
    }

    /// Returns the argument bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    /// Returns the JSON value bound to `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name).and_then(Arg::as_value)
    }

    /// Deserializes the value bound to `name`.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, CommandError> {
        let value = self
            .value(name)
            .ok_or_else(|| CommandError::new(format!("argument '{name}' is not a value")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| CommandError::new(format!("argument '{name}' has the wrong shape: {e}")))
    }

    /// Returns the event argument, if declared.
    #[must_use]
    pub fn event(&self) -> Option<&Arc<Event>> {
        self.values.iter().find_map(|a| match a {
            Arg::Event(e) => Some(e),
            _ => None,
        })
    }

    /// Returns the thread argument, if declared.
    #[must_use]
    pub fn thread(&self) -> Option<&Arc<Thread>> {
        self.values.iter().find_map(|a| match a {
            Arg::Thread(t) => Some(t),
            _ => None,
        })
    }

    /// Returns the controller argument, if declared.
    #[must_use]
    pub fn controller(&self) -> Option<&Arc<Controller>> {
        self.values.iter().find_map(|a| match a {
            Arg::Controller(c) => Some(c),
            _ => None,
        })
    }

    /// Returns the `done` continuation, if declared.
    #[must_use]
    pub fn done(&self) -> Option<&Completion> {
        self.values.iter().find_map(|a| match a {
            Arg::Done(c) => Some(c),
            _ => None,
        })
    }

    /// Returns the `fail` continuation, if declared.
    #[must_use]
    pub fn fail(&self) -> Option<&Completion> {
        self.values.iter().find_map(|a| match a {
            Arg::Fail(c) => Some(c),
            _ => None,
        })
    }

    /// Iterates over `(name, argument)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }
}
