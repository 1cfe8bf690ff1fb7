//! Tracing/logging initialization.
//!
//! Filtering is controlled by `RUST_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize JSON tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Initialize compact, human-readable logs on stderr.
pub fn init_pretty() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}
