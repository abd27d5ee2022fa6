//! CLI error types with miette diagnostics

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No cache entry for key '{key}'")]
    #[diagnostic(
        code(stowage::cli::not_found),
        help("The entry may have been evicted or never stored")
    )]
    NotFound { key: String },

    #[error("Failed to store entry for key '{key}'")]
    #[diagnostic(
        code(stowage::cli::store_failed),
        help("Run with --level warn or higher to see the underlying I/O error")
    )]
    StoreFailed { key: String },

    #[error("File operation failed: {operation} {}", path.display())]
    #[diagnostic(
        code(stowage::cli::file_error),
        help("Check file permissions and ensure the path exists")
    )]
    FileError {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output")]
    #[diagnostic(code(stowage::cli::output))]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] stowage_cache::Error),
}

impl CliError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn store_failed(key: impl Into<String>) -> Self {
        Self::StoreFailed { key: key.into() }
    }

    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileError {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(source: std::io::Error) -> Self {
        Self::Output { source }
    }
}
