//! Observability hook for cache internals.
//!
//! The cache is best-effort: failures are never returned to callers of the
//! caller-facing surface. They are handed to a [`Diagnostics`] sink instead.

use crate::Error;
use std::fmt;

/// Sink for errors and debug messages produced by the cache.
///
/// Implementations must not affect control flow; they only observe.
pub trait Diagnostics: Send + Sync + fmt::Debug {
    /// An error that was caught and swallowed
    fn report(&self, error: &Error);

    /// A debug-level message
    fn debug(&self, message: &str);
}

/// Routes diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, error: &Error) {
        tracing::warn!(error = %error, "cache operation failed");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "stowage_cache", "{message}");
    }
}
