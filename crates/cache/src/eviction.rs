//! Size-triggered eviction of cache entries.
//!
//! A scan lists every entry, orders them oldest-first by modification time
//! and sums their sizes. If the running total ever exceeds the trigger size,
//! a second pass walks the same order and deletes every entry from the one
//! that brings the running total to the target size onwards.
//!
//! Note that this removes a contiguous *newer* suffix of the oldest-first
//! order, not the oldest entries. The rule is kept as-is so that caches
//! shared with earlier releases shrink the same way.

use crate::diagnostics::Diagnostics;
use crate::{Error, Result};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default cumulative size above which a clean deletes entries
pub const DEFAULT_TRIGGER_SIZE: u64 = 3_000_000;

/// Default cumulative size a clean shrinks the cache towards
pub const DEFAULT_TARGET_SIZE: u64 = 2_000_000;

/// Thresholds for one eviction scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Running total (bytes) that must be exceeded for eviction to happen
    pub trigger_size: u64,
    /// Running total (bytes) at which entries start being deleted
    pub target_size: u64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            trigger_size: DEFAULT_TRIGGER_SIZE,
            target_size: DEFAULT_TARGET_SIZE,
        }
    }
}

/// Size and age of one entry file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    /// Path of the entry file
    pub path: PathBuf,
    /// Payload size in bytes
    pub size: u64,
    /// Last modification (doubles as last access)
    pub modified: SystemTime,
}

/// Outcome of one eviction scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Entries found in the directory
    pub scanned: usize,
    /// Total bytes of all scanned entries
    pub total_bytes: u64,
    /// Whether the trigger size was exceeded
    pub eviction_needed: bool,
    /// Entries deleted
    pub deleted: usize,
    /// Bytes freed by the deletions
    pub reclaimed_bytes: u64,
    /// Entries whose deletion failed
    pub failed: usize,
}

/// Entry count and total size of a cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    /// Number of entry files
    pub entries: usize,
    /// Sum of entry sizes in bytes
    pub bytes: u64,
}

impl EvictionPolicy {
    /// Create a policy with explicit thresholds
    #[must_use]
    pub const fn new(trigger_size: u64, target_size: u64) -> Self {
        Self {
            trigger_size,
            target_size,
        }
    }

    /// Whether the oldest-first running total ever exceeds the trigger size
    #[must_use]
    pub fn needs_eviction(&self, oldest_first: &[EntryStat]) -> bool {
        let mut total = 0u64;
        for entry in oldest_first {
            total = total.saturating_add(entry.size);
            if total > self.trigger_size {
                return true;
            }
        }
        false
    }

    /// Indices (into `oldest_first`) of the entries a clean deletes.
    ///
    /// An entry is kept while the running total including it is below the
    /// target size; from the first entry that reaches the target, it and
    /// every later entry are selected.
    #[must_use]
    pub fn select_victims(&self, oldest_first: &[EntryStat]) -> Vec<usize> {
        let mut total = 0u64;
        let mut victims = Vec::new();
        for (index, entry) in oldest_first.iter().enumerate() {
            total = total.saturating_add(entry.size);
            if total >= self.target_size {
                victims.push(index);
            }
        }
        victims
    }

    /// Scan `dir` and delete entries if the trigger size is exceeded.
    ///
    /// A missing directory is treated as empty. Failed deletions are reported
    /// and counted; they do not stop the scan.
    pub fn clean_if_needed(&self, dir: &Path, diagnostics: &dyn Diagnostics) -> Result<CleanReport> {
        self.clean_with(dir, diagnostics, |path| fs::remove_file(path))
    }

    /// [`clean_if_needed`](Self::clean_if_needed) with a custom removal function
    pub fn clean_with<F>(
        &self,
        dir: &Path,
        diagnostics: &dyn Diagnostics,
        mut remove: F,
    ) -> Result<CleanReport>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut entries = scan(dir)?;
        sort_oldest_first(&mut entries);

        let mut report = CleanReport {
            scanned: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            ..CleanReport::default()
        };
        if entries.is_empty() {
            return Ok(report);
        }

        if !self.needs_eviction(&entries) {
            diagnostics.debug("clean not required");
            return Ok(report);
        }
        report.eviction_needed = true;

        for index in self.select_victims(&entries) {
            let entry = &entries[index];
            match remove(&entry.path) {
                Ok(()) => {
                    report.deleted += 1;
                    report.reclaimed_bytes += entry.size;
                }
                // Already gone is as good as deleted
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    report.failed += 1;
                    diagnostics.report(&Error::io(e, &entry.path, "remove"));
                }
            }
        }

        diagnostics.debug(&format!(
            "deleted {} entries ({} bytes) from {}",
            report.deleted,
            report.reclaimed_bytes,
            dir.display()
        ));
        Ok(report)
    }
}

/// List the entry files in `dir` in directory order.
///
/// Subdirectories and other non-file entries are skipped.
pub fn scan(dir: &Path) -> Result<Vec<EntryStat>> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(e, dir, "read_dir")),
    };

    let mut entries = Vec::new();
    for item in listing {
        let item = item.map_err(|e| Error::io(e, dir, "read_dir"))?;
        let path = item.path();
        let metadata = match item.metadata() {
            Ok(metadata) => metadata,
            // Removed between listing and stat
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(e, &path, "stat")),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| Error::io(e, &path, "stat"))?;
        entries.push(EntryStat {
            path,
            size: metadata.len(),
            modified,
        });
    }
    Ok(entries)
}

/// Sort ascending by modification time; equal times keep their scan order.
pub fn sort_oldest_first(entries: &mut [EntryStat]) {
    entries.sort_by_key(|entry| entry.modified);
}

/// Count entries and bytes in `dir` without deleting anything
pub fn usage(dir: &Path) -> Result<CacheUsage> {
    let entries = scan(dir)?;
    Ok(CacheUsage {
        entries: entries.len(),
        bytes: entries.iter().map(|e| e.size).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::TracingDiagnostics;
    use crate::store;
    use std::time::Duration;
    use tempfile::TempDir;

    const MB: u64 = 1_000_000;

    fn stat(name: &str, size: u64, age_secs: u64) -> EntryStat {
        EntryStat {
            path: PathBuf::from(name),
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 - age_secs),
        }
    }

    fn write_entry(dir: &Path, name: &str, size: u64, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let len = usize::try_from(size).unwrap();
        store::write(&path, &vec![0u8; len]).unwrap();
        store::touch_at(&path, SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
        path
    }

    #[test]
    fn default_thresholds() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.trigger_size, 3_000_000);
        assert_eq!(policy.target_size, 2_000_000);
    }

    #[test]
    fn sort_is_stable_for_equal_times() {
        let mut entries = vec![
            stat("newest", 1, 0),
            stat("tie-1", 1, 50),
            stat("oldest", 1, 100),
            stat("tie-2", 1, 50),
        ];
        sort_oldest_first(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.path.to_str().unwrap()).collect();
        assert_eq!(names, ["oldest", "tie-1", "tie-2", "newest"]);
    }

    #[test]
    fn trigger_must_be_exceeded() {
        let policy = EvictionPolicy::new(2 * MB, MB);
        let exact = [stat("a", MB, 2), stat("b", MB, 1)];
        assert!(!policy.needs_eviction(&exact));

        let over = [stat("a", MB, 2), stat("b", MB, 1), stat("c", 1, 0)];
        assert!(policy.needs_eviction(&over));
    }

    #[test]
    fn victims_are_the_suffix_from_the_target_crossing() {
        let policy = EvictionPolicy::new(2 * MB, MB * 3 / 2);
        let entries = [stat("a", MB, 3), stat("b", MB, 2), stat("c", MB, 1)];
        assert!(policy.needs_eviction(&entries));
        assert_eq!(policy.select_victims(&entries), vec![1, 2]);
    }

    #[test]
    fn entry_reaching_target_exactly_is_deleted() {
        let policy = EvictionPolicy::new(0, 10);
        let entries = [stat("a", 4, 3), stat("b", 6, 2), stat("c", 1, 1)];
        assert_eq!(policy.select_victims(&entries), vec![1, 2]);
    }

    #[test]
    fn clean_keeps_only_oldest_entry() {
        let tmp = TempDir::new().unwrap();
        let a = write_entry(tmp.path(), "a", MB, 300);
        let b = write_entry(tmp.path(), "b", MB, 200);
        let c = write_entry(tmp.path(), "c", MB, 100);

        let report = EvictionPolicy::new(2 * MB, MB * 3 / 2)
            .clean_if_needed(tmp.path(), &TracingDiagnostics)
            .unwrap();

        assert!(a.exists());
        assert!(!b.exists());
        assert!(!c.exists());
        assert_eq!(report.scanned, 3);
        assert_eq!(report.total_bytes, 3 * MB);
        assert!(report.eviction_needed);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.reclaimed_bytes, 2 * MB);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn clean_below_trigger_deletes_nothing() {
        let tmp = TempDir::new().unwrap();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            write_entry(tmp.path(), name, 500_000, 100 * (i as u64 + 1));
        }

        let report = EvictionPolicy::new(3 * MB, 2 * MB)
            .clean_if_needed(tmp.path(), &TracingDiagnostics)
            .unwrap();

        assert!(!report.eviction_needed);
        assert_eq!(report.deleted, 0);
        assert_eq!(usage(tmp.path()).unwrap().entries, 3);
    }

    #[derive(Debug, Default)]
    struct CountingDiagnostics {
        reported: std::sync::Mutex<Vec<String>>,
    }

    impl Diagnostics for CountingDiagnostics {
        fn report(&self, error: &Error) {
            self.reported.lock().unwrap().push(error.to_string());
        }

        fn debug(&self, _message: &str) {}
    }

    #[test]
    fn failed_deletions_are_counted_and_do_not_stop_the_clean() {
        let tmp = TempDir::new().unwrap();
        let keep = write_entry(tmp.path(), "keep", 10, 500);
        let denied = write_entry(tmp.path(), "denied", 10, 400);
        let vanished = write_entry(tmp.path(), "vanished", 10, 300);
        let last = write_entry(tmp.path(), "last", 10, 200);
        let diagnostics = CountingDiagnostics::default();

        let report = EvictionPolicy::new(30, 15)
            .clean_with(tmp.path(), &diagnostics, |path| {
                match path.file_name().and_then(|n| n.to_str()) {
                    Some("denied") => Err(io::Error::from(ErrorKind::PermissionDenied)),
                    Some("vanished") => Err(io::Error::from(ErrorKind::NotFound)),
                    _ => fs::remove_file(path),
                }
            })
            .unwrap();

        assert!(keep.exists());
        assert!(denied.exists());
        assert!(vanished.exists());
        assert!(!last.exists());
        assert!(report.eviction_needed);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.reclaimed_bytes, 10);
        assert_eq!(report.failed, 1);

        let reported = diagnostics.reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("remove"));
    }

    #[test]
    fn clean_of_missing_directory_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let report = EvictionPolicy::default()
            .clean_if_needed(&tmp.path().join("missing"), &TracingDiagnostics)
            .unwrap();
        assert_eq!(report, CleanReport::default());
    }

    #[test]
    fn scan_skips_subdirectories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        write_entry(tmp.path(), "entry", 10, 0);

        let entries = scan(tmp.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 10);
        assert_eq!(
            usage(tmp.path()).unwrap(),
            CacheUsage {
                entries: 1,
                bytes: 10
            }
        );
    }
}
