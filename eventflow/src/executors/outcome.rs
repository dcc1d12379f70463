//! Executor outcomes and the continuations that report them.

use crate::core::ExecutorState;
use crate::errors::CommandError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

/// How an executor finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Completed successfully.
    Done,
    /// Completed with a failure. A fatal failure stops the thread.
    Failed {
        /// The failure.
        error: CommandError,
        /// Whether the thread must stop.
        fatal: bool,
    },
}

impl Outcome {
    /// A recoverable failure.
    #[must_use]
    pub fn failed(error: impl Into<CommandError>) -> Self {
        Self::Failed {
            error: error.into(),
            fatal: false,
        }
    }

    /// A failure that stops the thread.
    #[must_use]
    pub fn fatal(error: impl Into<CommandError>) -> Self {
        Self::Failed {
            error: error.into(),
            fatal: true,
        }
    }

    /// Returns true for `Done`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true for a fatal failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed { fatal: true, .. })
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&CommandError> {
        match self {
            Self::Done => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Returns the terminal executor state this outcome maps to.
    #[must_use]
    pub fn state(&self) -> ExecutorState {
        match self {
            Self::Done => ExecutorState::Done,
            Self::Failed { .. } => ExecutorState::Failed,
        }
    }
}

impl From<Result<(), CommandError>> for Outcome {
    fn from(result: Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(err) => Self::failed(err),
        }
    }
}

/// The `done`/`fail` continuations handed to handlers that finish
/// asynchronously.
///
/// Clones share one slot: the first call settles the executor, later calls
/// are logged and ignored.
#[derive(Clone)]
pub struct Completion {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
    label: Arc<str>,
}

impl Completion {
    /// Creates a continuation and the receiver its outcome arrives on.
    #[must_use]
    pub fn channel(label: impl Into<Arc<str>>) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
            label: label.into(),
        };
        (completion, rx)
    }

    /// Reports success.
    pub fn done(&self) -> bool {
        self.settle(Outcome::Done)
    }

    /// Reports a recoverable failure.
    pub fn fail(&self, error: impl Into<CommandError>) -> bool {
        self.settle(Outcome::failed(error))
    }

    /// Reports a failure that stops the thread.
    pub fn kill(&self, error: impl Into<CommandError>) -> bool {
        self.settle(Outcome::fatal(error))
    }

    /// Reports `outcome`. Returns false if already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let Some(tx) = self.slot.lock().take() else {
            warn!(executor = %self.label, "Continuation called after the executor already completed");
            return false;
        };
        // The receiver is gone when the thread was torn down meanwhile.
        let _ = tx.send(outcome);
        true
    }

    /// Returns true once a continuation was called.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("label", &self.label)
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_wins() {
        let (completion, rx) = Completion::channel("save");
        let other = completion.clone();

        assert!(completion.fail("first"));
        assert!(!other.done());
        assert!(other.is_settled());

        assert_eq!(rx.await.unwrap(), Outcome::failed("first"));
    }

    #[tokio::test]
    async fn test_kill_is_fatal() {
        let (completion, rx) = Completion::channel("save");
        completion.kill("stop");

        let outcome = rx.await.unwrap();
        assert!(outcome.is_fatal());
        assert_eq!(outcome.state(), ExecutorState::Failed);
    }

    #[test]
    fn test_settle_after_receiver_dropped() {
        let (completion, rx) = Completion::channel("save");
        drop(rx);
        assert!(completion.done());
    }

    #[test]
    fn test_outcome_from_result() {
        assert!(Outcome::from(Ok(())).is_done());
        let failed = Outcome::from(Err(CommandError::new("x")));
        assert!(!failed.is_fatal());
        assert_eq!(failed.error().unwrap().message, "x");
    }
}
