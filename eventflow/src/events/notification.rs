//! Notifications an event emits and the listeners that receive them.

use crate::core::NotificationKind;
use crate::errors::CommandError;
use std::fmt;
use std::sync::Arc;

/// A notification emitted by an [`Event`](super::Event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Every controller finished and no failure was recorded.
    Done,
    /// A controller reported a failure, or the event settled with failures.
    Fail(CommandError),
}

impl Notification {
    /// Returns the kind of this notification.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Done => NotificationKind::Done,
            Self::Fail(_) => NotificationKind::Fail,
        }
    }

    /// Returns the failure carried by a `Fail` notification.
    #[must_use]
    pub fn error(&self) -> Option<&CommandError> {
        match self {
            Self::Done => None,
            Self::Fail(err) => Some(err),
        }
    }
}

type ListenerFn = dyn Fn(&Notification) + Send + Sync;

/// A notification handler.
///
/// Listeners are compared by identity: cloning a listener yields the same
/// listener, wrapping the same closure twice yields two different ones.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Returns true if both handles wrap the same closure.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0).cast::<()>(),
            Arc::as_ptr(&other.0).cast::<()>(),
        )
    }

    pub(crate) fn call(&self, notification: &Notification) {
        (self.0)(notification);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}
