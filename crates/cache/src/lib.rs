//! Disk-backed content cache
//!
//! This crate stores opaque byte payloads as files in a single directory,
//! one file per key:
//! - Entry names are derived from keys with a stable one-way hash
//! - Writes and cleans run on one background worker, in order
//! - Eviction is size-triggered and driven by file modification times
//!
//! # Overview
//!
//! ```no_run
//! use std::time::Duration;
//! use stowage_cache::{CacheConfig, ContentCache};
//!
//! let cache = ContentCache::new(CacheConfig::new("/var/cache/myapp"));
//! let root = cache.root().to_path_buf();
//!
//! cache.store_async(&root, "https://example.com/logo.png", vec![1, 2, 3], Duration::ZERO);
//! cache.clean_async(&root, None, None);
//! cache.drain_blocking();
//!
//! if let Some(path) = cache.lookup_and_touch(&root, "https://example.com/logo.png") {
//!     println!("cached at {}", path.display());
//! }
//! ```
//!
//! The cache is best-effort: nothing on [`ContentCache`] returns an error.
//! Failures are reported through [`Diagnostics`] and the operation becomes a
//! no-op.

// TODO(cache-docs): document # Errors on the store, eviction and config functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

mod cache;
pub mod config;
pub mod diagnostics;
pub mod directory;
mod error;
pub mod eviction;
pub mod key;
pub mod queue;
pub mod store;

use std::sync::OnceLock;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use cache::ContentCache;
pub use config::CacheConfig;
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use directory::CacheDirectory;
pub use eviction::{CacheUsage, CleanReport, EvictionPolicy};
pub use key::EntryName;
pub use queue::TaskQueue;

/// The process-wide cache, configured from the environment on first use.
///
/// Falls back to the default configuration (temp directory) if the
/// environment is unusable.
pub fn shared() -> &'static ContentCache {
    static SHARED: OnceLock<ContentCache> = OnceLock::new();
    SHARED.get_or_init(|| {
        let config = CacheConfig::from_env().unwrap_or_else(|e| {
            TracingDiagnostics.report(&e);
            CacheConfig::default()
        });
        ContentCache::new(config)
    })
}
