//! Core domain model types for eventflow.
//!
//! This module contains the small shared vocabulary used by every other
//! module: id aliases and the executor/notification enums.

mod status;

pub use status::{ExecutorKind, ExecutorState, NotificationKind};

/// Identifies an [`Event`](crate::events::Event) within its context.
pub type EventId = u64;

/// Identifies a [`Thread`](crate::thread::Thread) within its context.
pub type ThreadId = u64;

/// Identifies an [`Executor`](crate::executors::Executor) within its context.
pub type ExecutorId = u64;

/// Identifies a [`Controller`](crate::controller::Controller) within its context.
pub type ControllerId = u64;
