//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(stowage::cache::io),
        help("Check file permissions and ensure the cache directory exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "touch")
        operation: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(stowage::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A queued task failed or panicked on the worker
    #[error("Cache task '{label}' failed: {message}")]
    #[diagnostic(code(stowage::cache::task))]
    TaskFailed {
        /// Label the task was submitted with
        label: String,
        /// Failure description (panic payload or error text)
        message: String,
    },

    /// The background worker could not be started or has gone away
    #[error("Cache worker unavailable: {message}")]
    #[diagnostic(
        code(stowage::cache::worker),
        help("Queued writes are dropped while the worker is unavailable")
    )]
    WorkerUnavailable {
        /// Error message describing why the worker is unavailable
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a task failure error
    #[must_use]
    pub fn task_failed(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Create a worker unavailable error
    #[must_use]
    pub fn worker_unavailable(msg: impl Into<String>) -> Self {
        Self::WorkerUnavailable {
            message: msg.into(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
