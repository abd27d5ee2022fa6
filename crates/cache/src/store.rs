//! Synchronous file primitives for cache entries.
//!
//! Only the queue worker calls [`write`], so two writes never race. Reads and
//! touches may run on any thread.

use crate::{Error, Result};
use filetime::FileTime;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

/// Write `bytes` to `path`, creating the file if needed and replacing any
/// previous content.
pub fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|e| Error::io(e, path, "open"))?;
    file.write_all(bytes)
        .map_err(|e| Error::io(e, path, "write"))?;
    file.flush().map_err(|e| Error::io(e, path, "flush"))?;
    Ok(())
}

/// Whether an entry file exists at `path`
#[must_use]
pub fn exists(path: &Path) -> bool {
    path.is_file()
}

/// Mark the entry at `path` as recently used by setting its modification
/// time to now. This is the only recency signal eviction consumes.
pub fn touch(path: &Path) -> Result<()> {
    touch_at(path, SystemTime::now())
}

/// Set the modification time of `path` to `when`.
///
/// Only the timestamp changes, so read-only entries can be touched too.
pub fn touch_at(path: &Path, when: SystemTime) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_system_time(when))
        .map_err(|e| Error::io(e, path, "touch"))
}

/// Read the whole payload stored at `path`
pub fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(e, path, "read"))
}
