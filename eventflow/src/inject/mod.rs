//! Argument injection.
//!
//! Handlers declare an ordered list of argument names instead of a
//! positional signature. The resolver binds each name against the event's
//! value bag, the well-known injectables and the controller's injections.

mod args;
mod resolver;

pub use args::{Arg, Args};
pub use resolver::{names, resolve, Injectable, InjectionTable, Scope};
