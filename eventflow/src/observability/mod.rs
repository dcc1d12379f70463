//! Observability utilities.
//!
//! Logging goes through `tracing`; lifecycle records go to the context's
//! [`EventSink`](crate::events::EventSink).

mod logging;

pub use logging::init_tracing;
