//! Executor kind, executor state and notification kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The variant of work an executor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// A plain function.
    Function,
    /// A future-producing function whose result is recorded on the event.
    Promise,
    /// A stateful command object.
    Command,
    /// A branch on a predicate.
    Conditional,
    /// A fan-out of nested specs.
    Parallel,
    /// A sub-event dispatch.
    Event,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Promise => write!(f, "promise"),
            Self::Command => write!(f, "command"),
            Self::Conditional => write!(f, "conditional"),
            Self::Parallel => write!(f, "parallel"),
            Self::Event => write!(f, "event"),
        }
    }
}

/// The lifecycle state of an executor.
///
/// `NotStarted -> Running -> {Done | Failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    /// Built but not yet executed.
    #[default]
    NotStarted,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Done,
    /// Completed with a failure.
    Failed,
}

impl ExecutorState {
    /// Returns true if the state is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The kind of notification an event emits to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Every controller finished without errors.
    Done,
    /// A controller reported a failure.
    Fail,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Fail => write!(f, "fail"),
        }
    }
}
