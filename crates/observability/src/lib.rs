//! Tracing and logging (shared setup).

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers, output format).
pub mod tracing;

/// Per-request correlation.
pub mod request;

pub use self::request::{RequestId, request_span};
pub use self::tracing::LogFormat;
