//! Testing utilities for eventflow.
//!
//! This module provides:
//! - [`CallLog`], an ordered record of handler calls
//! - [`ManualBus`], a bus that only records and catches
//! - [`TestHarness`], a context wired to a local bus and a collecting sink

mod fixtures;
mod mocks;

pub use fixtures::TestHarness;
pub use mocks::{CallLog, ManualBus};
