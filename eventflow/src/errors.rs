//! Error types for the eventflow engine.
//!
//! Contract errors (double dispatch, duplicate listeners, running a thread
//! twice, unresolved arguments, unsupported specs) are returned immediately
//! to the caller. Domain failures raised by executors travel as
//! [`CommandError`] through the thread and event notification paths.

use crate::core::{EventId, NotificationKind, ThreadId};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for eventflow operations.
#[derive(Debug, Error)]
pub enum EventflowError {
    /// A dispatch-handle contract was violated.
    #[error("{0}")]
    Event(#[from] EventError),

    /// A thread contract was violated.
    #[error("{0}")]
    Thread(#[from] ThreadError),

    /// A declared argument could not be resolved.
    #[error("{0}")]
    UnresolvedArgument(#[from] UnresolvedArgumentError),

    /// A declarative spec could not be built.
    #[error("{0}")]
    Spec(#[from] SpecError),

    /// An executor failed.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contract errors raised by [`Event`](crate::events::Event).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event was dispatched a second time.
    #[error("Event '{event_type}' (#{event_id}) was already dispatched")]
    DoubleDispatch {
        /// The event type.
        event_type: String,
        /// The event id.
        event_id: EventId,
    },

    /// A controller tried to catch an event it is already handling or has
    /// already finished.
    #[error("Controller '{controller}' cannot catch event '{event_type}': {reason}")]
    InvalidController {
        /// The controller name.
        controller: String,
        /// The event type.
        event_type: String,
        /// Why the catch was rejected.
        reason: String,
    },

    /// A controller reported completion without having caught the event.
    #[error("Controller '{controller}' was never marked caught for event '{event_type}'")]
    ControllerNotFound {
        /// The controller name.
        controller: String,
        /// The event type.
        event_type: String,
    },

    /// The same listener was registered twice for one notification kind.
    #[error("Listener already registered for '{kind}' on event '{event_type}'")]
    DuplicateListener {
        /// The notification kind.
        kind: NotificationKind,
        /// The event type.
        event_type: String,
    },

    /// The owning context was torn down.
    #[error("Context '{context}' was torn down")]
    TornDown {
        /// The context name.
        context: String,
    },

    /// The event did not settle in time.
    #[error("Event '{event_type}' (#{event_id}) did not settle within {waited_ms}ms")]
    NotSettled {
        /// The event type.
        event_type: String,
        /// The event id.
        event_id: EventId,
        /// How long the caller waited.
        waited_ms: u64,
    },
}

/// Contract errors raised by [`Thread`](crate::thread::Thread).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// `run` was called while the thread was running.
    #[error("Thread #{thread_id} is already running")]
    AlreadyRunning {
        /// The thread id.
        thread_id: ThreadId,
    },

    /// The thread has no executor specs.
    #[error("Thread #{thread_id} has no executors to run")]
    EmptyExecutorList {
        /// The thread id.
        thread_id: ThreadId,
    },

    /// The thread was destroyed by a teardown.
    #[error("Thread #{thread_id} was destroyed")]
    Destroyed {
        /// The thread id.
        thread_id: ThreadId,
    },

    /// `run` was called outside a tokio runtime.
    #[error("Thread #{thread_id} needs a tokio runtime to run")]
    NoRuntime {
        /// The thread id.
        thread_id: ThreadId,
    },
}

/// Error raised when a declared argument name cannot be bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unresolved argument '{name}' in ({}) while handling {origin}", declared.join(", "))]
pub struct UnresolvedArgumentError {
    /// The name that could not be resolved.
    pub name: String,
    /// Every name the handler declared, in order.
    pub declared: Vec<String>,
    /// Where the dispatch came from.
    pub origin: String,
}

impl UnresolvedArgumentError {
    /// Creates a new unresolved argument error.
    #[must_use]
    pub fn new(name: impl Into<String>, declared: &[String], origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: declared.to_vec(),
            origin: origin.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), json!(self.name));
        map.insert("declared".to_string(), json!(self.declared));
        map.insert("origin".to_string(), json!(self.origin));
        map.insert("message".to_string(), json!(self.to_string()));
        map
    }
}

/// Errors raised while turning a declarative description into a [`Spec`](crate::executors::Spec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// The value has a shape no executor understands.
    #[error("Unsupported executee of type '{shape}'")]
    UnsupportedExecutee {
        /// The offending JSON type.
        shape: String,
    },

    /// A `run` or `if` entry names nothing registered.
    #[error("Unknown command '{name}'")]
    UnknownCommand {
        /// The missing name.
        name: String,
    },

    /// The value has the right type but the wrong content.
    #[error("Malformed spec: {message}")]
    Malformed {
        /// What is wrong.
        message: String,
    },
}

impl SpecError {
    /// Creates an unsupported executee error for a JSON value.
    #[must_use]
    pub fn unsupported(value: &serde_json::Value) -> Self {
        Self::UnsupportedExecutee {
            shape: json_type_name(value).to_string(),
        }
    }

    /// Creates an unknown command error.
    #[must_use]
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates a malformed spec error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A failure raised by an executor.
///
/// Cloneable so it can be recorded on the thread, stored on the event and
/// replayed to late listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    /// Human readable message.
    pub message: String,
    /// Optional machine readable code.
    pub code: Option<String>,
}

impl CommandError {
    /// Code attached to failures caused by an unresolved argument.
    pub const UNRESOLVED_ARGUMENT: &'static str = "UNRESOLVED_ARGUMENT";
    /// Code attached to failures caused by a contract error.
    pub const CONTRACT: &'static str = "CONTRACT";
    /// Code attached to the failure reported for a killed thread.
    pub const KILLED: &'static str = "KILLED";

    /// Creates a new command error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Folds several failures into one.
    ///
    /// A single failure is returned as is. Several keep the first code and
    /// join the messages in the order they were recorded.
    #[must_use]
    pub fn combine(errors: &[CommandError]) -> Self {
        match errors {
            [] => Self::new("failed"),
            [only] => only.clone(),
            [first, ..] => {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                Self {
                    message: format!("{} failures: {}", errors.len(), messages.join("; ")),
                    code: first.code.clone(),
                }
            }
        }
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<UnresolvedArgumentError> for CommandError {
    fn from(err: UnresolvedArgumentError) -> Self {
        Self::new(err.to_string()).with_code(Self::UNRESOLVED_ARGUMENT)
    }
}

impl From<EventError> for CommandError {
    fn from(err: EventError) -> Self {
        Self::new(err.to_string()).with_code(Self::CONTRACT)
    }
}

impl From<ThreadError> for CommandError {
    fn from(err: ThreadError) -> Self {
        Self::new(err.to_string()).with_code(Self::CONTRACT)
    }
}

impl From<&str> for CommandError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
