//! # Log output for tasks.
//!
//! The engine emits `tracing` events at fixed levels:
//!
//! ```text
//! trace  execution started / settled / canceled        (instance = <id>)
//! debug  settled with defect, absorbed late settlement
//! error  unhandled failure or defect under UnhandledPolicy::Log
//! ```
//!
//! Any `tracing` subscriber will pick these up. This module only ships a
//! ready-made fmt subscriber for binaries and tests that have none.
//!
//! Enabled via the `logging` feature.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `settle=info`).
///
/// Safe to call multiple times; only the first call installs anything, and an
/// already-installed global subscriber is left in place.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("settle=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
