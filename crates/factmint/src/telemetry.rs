//! Logging setup for embedding applications.
//!
//! The crate logs through the `log` macros and annotates hot paths with
//! `tracing` spans; this wires both into one formatted subscriber. Hosts
//! with their own subscriber can skip it.

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber with an env-driven filter
/// (`RUST_LOG`, defaulting to `info`) and bridges `log` records into it.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    // Err means a logger is already installed, which is fine.
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
