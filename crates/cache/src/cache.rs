//! Caller-facing cache surface

use crate::config::CacheConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::directory::CacheDirectory;
use crate::eviction::{self, CacheUsage, CleanReport, EvictionPolicy};
use crate::key::EntryName;
use crate::queue::TaskQueue;
use crate::store;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Disk-backed content cache.
///
/// Writes and cleans are queued on a single background worker and never
/// fail from the caller's point of view; lookups and reads run on the
/// calling thread. Every error is handed to the configured [`Diagnostics`].
///
/// Operations take the entry directory explicitly so one cache (and one
/// worker) can serve several directories; [`root`](Self::root) gives the
/// configured default.
#[derive(Debug)]
pub struct ContentCache {
    config: CacheConfig,
    directory: CacheDirectory,
    queue: TaskQueue,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ContentCache {
    /// Create a cache that reports through `tracing`
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_diagnostics(config, Arc::new(TracingDiagnostics))
    }

    /// Create a cache with a custom diagnostics sink
    #[must_use]
    pub fn with_diagnostics(config: CacheConfig, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            config,
            directory: CacheDirectory::new(),
            queue: TaskQueue::new("stowage", Arc::clone(&diagnostics)),
            diagnostics,
        }
    }

    /// The configuration this cache was built with
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The default entry directory, created on first call
    pub fn root(&self) -> &Path {
        self.directory
            .resolve(&self.config.base_dir, self.diagnostics.as_ref())
    }

    /// Path the entry for `key` has (or would have) in `dir`
    #[must_use]
    pub fn entry_path(&self, dir: &Path, key: &str) -> PathBuf {
        dir.join(EntryName::derive(key).as_str())
    }

    /// Path of the existing entry for `key`, without marking it used
    #[must_use]
    pub fn lookup(&self, dir: &Path, key: &str) -> Option<PathBuf> {
        let path = self.entry_path(dir, key);
        store::exists(&path).then_some(path)
    }

    /// Path of the existing entry for `key`, marking it recently used
    pub fn lookup_and_touch(&self, dir: &Path, key: &str) -> Option<PathBuf> {
        let path = self.lookup(dir, key)?;
        if let Err(e) = store::touch(&path) {
            self.diagnostics.report(&e);
        }
        Some(path)
    }

    /// Payload stored for `key`, marking the entry recently used
    pub fn read(&self, dir: &Path, key: &str) -> Option<Vec<u8>> {
        let path = self.lookup_and_touch(dir, key)?;
        match store::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.diagnostics.report(&e);
                None
            }
        }
    }

    /// Write the entry for `key` on the calling thread
    pub fn store(&self, dir: &Path, key: &str, bytes: &[u8]) {
        let path = self.entry_path(dir, key);
        if let Err(e) = store::write(&path, bytes) {
            self.diagnostics.debug(&format!("can't store {}", path.display()));
            self.diagnostics.report(&e);
        }
    }

    /// Queue a write of the entry for `key`, to run after `delay`
    pub fn store_async(&self, dir: &Path, key: &str, bytes: impl Into<Vec<u8>>, delay: Duration) {
        let path = self.entry_path(dir, key);
        let bytes = bytes.into();
        self.queue
            .submit("store", delay, move || store::write(&path, &bytes));
    }

    /// Run an eviction scan of `dir` on the calling thread
    pub fn clean(&self, dir: &Path, policy: EvictionPolicy) -> CleanReport {
        match policy.clean_if_needed(dir, self.diagnostics.as_ref()) {
            Ok(report) => report,
            Err(e) => {
                self.diagnostics.report(&e);
                CleanReport::default()
            }
        }
    }

    /// Queue an eviction scan of `dir`.
    ///
    /// Missing thresholds fall back to the configured ones.
    pub fn clean_async(&self, dir: &Path, trigger_size: Option<u64>, target_size: Option<u64>) {
        let policy = EvictionPolicy::new(
            trigger_size.unwrap_or(self.config.trigger_size),
            target_size.unwrap_or(self.config.target_size),
        );
        let dir = dir.to_path_buf();
        let diagnostics = Arc::clone(&self.diagnostics);
        self.queue.submit("clean", Duration::ZERO, move || {
            policy
                .clean_if_needed(&dir, diagnostics.as_ref())
                .map(|_| ())
        });
    }

    /// Queue an eviction scan of [`root`](Self::root) with the configured thresholds
    pub fn clean_root_async(&self) {
        let root = self.root().to_path_buf();
        self.clean_async(&root, None, None);
    }

    /// Entry count and size of `dir`
    pub fn usage(&self, dir: &Path) -> CacheUsage {
        match eviction::usage(dir) {
            Ok(usage) => usage,
            Err(e) => {
                self.diagnostics.report(&e);
                CacheUsage::default()
            }
        }
    }

    /// Wait until every queued write and clean submitted so far has run
    pub async fn drain(&self) {
        self.queue.drain().await;
    }

    /// Blocking variant of [`drain`](Self::drain); not for use inside a runtime
    pub fn drain_blocking(&self) {
        self.queue.drain_blocking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::CACHE_DIR_NAME;
    use tempfile::TempDir;

    fn cache(tmp: &TempDir) -> ContentCache {
        ContentCache::new(CacheConfig::new(tmp.path()))
    }

    #[test]
    fn root_lives_under_base_dir() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        assert_eq!(cache.root(), tmp.path().join(CACHE_DIR_NAME));
        assert!(cache.root().is_dir());
    }

    #[test]
    fn entry_path_uses_derived_name() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let path = cache.entry_path(tmp.path(), "a");
        assert_eq!(path, tmp.path().join("r6p51cluyxfm1x21kf967yw1"));
    }

    #[test]
    fn lookup_misses_then_hits() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let root = cache.root().to_path_buf();
        assert!(cache.lookup(&root, "https://example.com/").is_none());

        cache.store(&root, "https://example.com/", b"body");

        let path = cache.lookup(&root, "https://example.com/").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"body");
    }

    #[test]
    fn read_touches_the_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let root = cache.root().to_path_buf();
        cache.store(&root, "k", b"v");
        let path = cache.entry_path(&root, "k");
        let old = std::time::SystemTime::now() - Duration::from_secs(3600);
        store::touch_at(&path, old).unwrap();

        assert_eq!(cache.read(&root, "k").unwrap(), b"v");

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > old + Duration::from_secs(60));
    }

    #[test]
    fn store_failure_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let missing = tmp.path().join("missing");
        cache.store(&missing, "k", b"v");
        assert!(cache.lookup(&missing, "k").is_none());
    }

    #[test]
    fn clean_async_uses_configured_thresholds() {
        let tmp = TempDir::new().unwrap();
        let cache = ContentCache::new(CacheConfig::new(tmp.path()).with_thresholds(10, 5));
        let root = cache.root().to_path_buf();
        cache.store(&root, "a", &[0u8; 8]);
        cache.store(&root, "b", &[0u8; 8]);

        cache.clean_root_async();
        cache.drain_blocking();

        assert_eq!(cache.usage(&root).entries, 0);
    }
}
