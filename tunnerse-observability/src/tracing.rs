//! Logging setup for agents and tests
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is the embedding application's job, through these helpers.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Minimal logging setup without metrics or tracing infrastructure.
///
/// Default level is "info"; override with `RUST_LOG`.
pub fn init_minimal_logging() {
    let _ = try_init_logging();
}

/// Like [`init_minimal_logging`], but reports whether this call installed
/// the subscriber. Safe to call repeatedly, which test harnesses do.
pub fn try_init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("logging initialized");
    }
    installed
}
