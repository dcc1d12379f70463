//! # Eventflow
//!
//! An event-triggered asynchronous command-pipeline engine.
//!
//! Named events are dispatched onto a bus. Every controller listening for
//! the event responds by running an ordered list of executors on a
//! [`Thread`](thread::Thread):
//!
//! - **Ordered execution**: at most one executor runs per thread at a time
//! - **Failure propagation**: recoverable and fatal failures, aggregated per event
//! - **Composition**: conditional branches, parallel groups and sub-events
//! - **Name-based injection**: handlers declare argument names that are
//!   bound against the event's value bag and the controller's injections
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eventflow::prelude::*;
//!
//! let bus = Arc::new(LocalBus::new());
//! let ctx = Arc::new(Context::new(bus.clone()));
//! let form = Arc::new(ctx.controller("form"));
//!
//! bus.listen(&form, "save", vec![
//!     FunctionSpec::new("validate", &["draft"], |args| {
//!         let draft: String = args.parse("draft")?;
//!         if draft.is_empty() { Err("empty draft".into()) } else { Ok(()) }
//!     })
//!     .into(),
//!     Spec::event("saved"),
//! ]);
//!
//! let event = ctx.dispatch(ctx.event("save").with_value("draft", json!("hello")))?;
//! event.settled().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod controller;
pub mod core;
pub mod errors;
pub mod events;
pub mod executors;
pub mod inject;
pub mod observability;
pub mod testing;
pub mod thread;
pub mod utils;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{Context, ContextConfig, LoggingConfig, ValueBag};
    pub use crate::controller::Controller;
    pub use crate::core::{ExecutorKind, ExecutorState, NotificationKind};
    pub use crate::errors::{
        CommandError, EventError, EventflowError, SpecError, ThreadError,
        UnresolvedArgumentError,
    };
    pub use crate::events::{
        Bus, Event, EventSink, LocalBus, LoggingEventSink, NoOpEventSink, Notification,
        NullBus,
    };
    pub use crate::executors::{
        Command, CommandSpec, Completion, ConditionalSpec, EventSpec, FunctionSpec,
        Predicate, PromiseSpec, Spec, SpecRegistry,
    };
    pub use crate::inject::{Arg, Args};
    pub use crate::observability::init_tracing;
    pub use crate::thread::Thread;
    pub use crate::utils::{generate_uuid, iso_timestamp, Sequence, Timestamp};
}
