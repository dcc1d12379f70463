//! Executors: the units of work a thread runs.
//!
//! This module provides:
//! - [`Spec`], the closed set of executor specifications
//! - [`ExecutorFactory`], which builds an [`Executor`] per spec
//! - [`Command`], the trait for stateful executors
//! - [`Completion`], the `done`/`fail` continuations
//! - [`SpecRegistry`], which builds specs from JSON

mod command;
mod executor;
mod factory;
mod outcome;
mod registry;
mod spec;

pub use command::{Command, CommandSpec};
pub use executor::Executor;
pub use factory::ExecutorFactory;
pub use outcome::{Completion, Outcome};
pub use registry::SpecRegistry;
pub use spec::{ConditionalSpec, EventSpec, FunctionSpec, Predicate, PromiseSpec, Spec};
