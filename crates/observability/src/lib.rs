//! Tracing and logging setup shared by the dispatch binaries.

/// Install the JSON subscriber used by long-running processes.
///
/// Repeated calls keep the first subscriber.
pub fn init() {
    tracing::init();
}

/// Install human-readable logs instead of JSON (for interactive use).
pub fn init_pretty() {
    tracing::init_pretty();
}

/// Subscriber setup (filters, formats).
pub mod tracing;
