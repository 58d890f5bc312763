//! # Logging
//!
//! `tracing` setup for client hosts and the component-tagged helpers the hooks log through.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Component-tagged log helpers used by the hooks
pub struct Logger;

impl Logger {
    pub fn debug_with_component(component: &str, message: &str) {
        tracing::debug!(component, "{}", message);
    }

    pub fn info_with_component(component: &str, message: &str) {
        tracing::info!(component, "{}", message);
    }

    pub fn warn_with_component(component: &str, message: &str) {
        tracing::warn!(component, "{}", message);
    }

    pub fn error_with_component(component: &str, message: &str) {
        tracing::error!(component, "{}", message);
    }
}
