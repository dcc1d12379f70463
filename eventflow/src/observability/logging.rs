//! Tracing subscriber setup.

use crate::context::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber built from `config`.
///
/// `RUST_LOG` overrides `config.filter` when set. Returns false if a global
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
            true
        }
        Err(_) => false,
    }
}
