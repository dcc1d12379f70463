//! Context management for eventflow.
//!
//! This module provides:
//! - The per-dispatch value bag
//! - Context configuration
//! - The runtime context that owns ids, the bus and live threads

mod bag;
mod config;
mod runtime;

pub use bag::ValueBag;
pub use config::{ContextConfig, LoggingConfig};
pub use runtime::Context;
