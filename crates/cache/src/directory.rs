//! Resolution of the cache root directory

use crate::Error;
use crate::diagnostics::Diagnostics;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name of the directory created under the base directory to hold entries
pub const CACHE_DIR_NAME: &str = "stowage";

/// The single directory holding all cache entries.
///
/// Resolution is first-wins: the first call to [`resolve`](Self::resolve)
/// fixes the path for the lifetime of this value, whatever base later
/// callers pass.
#[derive(Debug, Default)]
pub struct CacheDirectory {
    resolved: OnceLock<PathBuf>,
}

impl CacheDirectory {
    /// Create an unresolved directory handle
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resolved: OnceLock::new(),
        }
    }

    /// Resolve `base/stowage`, creating it (and its parents) on first use.
    ///
    /// Creation failures are reported and otherwise ignored; writes into the
    /// directory will then fail and be reported individually.
    pub fn resolve(&self, base: &Path, diagnostics: &dyn Diagnostics) -> &Path {
        self.resolved.get_or_init(|| {
            let dir = base.join(CACHE_DIR_NAME);
            match fs::create_dir_all(&dir) {
                Ok(()) => tracing::debug!(path = %dir.display(), "cache directory ready"),
                Err(e) => diagnostics.report(&Error::io(e, &dir, "create_dir_all")),
            }
            dir
        })
    }

    /// The resolved path, if [`resolve`](Self::resolve) has been called
    #[must_use]
    pub fn get(&self) -> Option<&Path> {
        self.resolved.get().map(PathBuf::as_path)
    }
}
