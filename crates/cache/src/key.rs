//! Derivation of on-disk entry names from cache keys

use md5::{Digest, Md5};
use std::fmt;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Filesystem-safe name of a cache entry, derived from its key.
///
/// The name is the MD5 digest of the key read as a signed big-endian
/// integer, made non-negative and rendered in lowercase base 36. It never
/// contains path separators and is stable across processes, so the same
/// key always maps to the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryName(String);

impl EntryName {
    /// Derive the entry name for `key`.
    #[must_use]
    pub fn derive(key: &str) -> Self {
        let digest = Md5::digest(key.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        let value = i128::from_be_bytes(bytes).unsigned_abs();
        Self(to_base36(value))
    }

    /// The name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the entry name for `key` as a plain string.
#[must_use]
pub fn derive(key: &str) -> String {
    EntryName::derive(key).into_string()
}

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(25);
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}
