//! Cache configuration and environment resolution

use crate::eviction::{DEFAULT_TARGET_SIZE, DEFAULT_TRIGGER_SIZE, EvictionPolicy};
use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory
pub const ENV_CACHE_HOME: &str = "STOWAGE_CACHE_HOME";
/// Environment variable overriding the clean trigger size (bytes)
pub const ENV_TRIGGER_BYTES: &str = "STOWAGE_CLEAN_TRIGGER_BYTES";
/// Environment variable overriding the clean target size (bytes)
pub const ENV_TARGET_BYTES: &str = "STOWAGE_CLEAN_TARGET_BYTES";

/// Where the cache lives and how large it may grow.
///
/// The cache root is `base_dir/stowage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Parent of the cache root directory
    pub base_dir: PathBuf,
    /// Default trigger size for cleans
    pub trigger_size: u64,
    /// Default target size for cleans
    pub target_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir(),
            trigger_size: DEFAULT_TRIGGER_SIZE,
            target_size: DEFAULT_TARGET_SIZE,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted at `base_dir` with default thresholds
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Replace the base directory
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Replace the default clean thresholds
    #[must_use]
    pub fn with_thresholds(mut self, trigger_size: u64, target_size: u64) -> Self {
        self.trigger_size = trigger_size;
        self.target_size = target_size;
        self
    }

    /// The eviction policy built from the configured thresholds
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        EvictionPolicy::new(self.trigger_size, self.target_size)
    }

    /// Resolve configuration from the process environment.
    ///
    /// The base directory is the first usable of `STOWAGE_CACHE_HOME`,
    /// `XDG_CACHE_HOME`, the OS cache directory, `~/.cache` and the temp
    /// directory.
    pub fn from_env() -> Result<Self> {
        let inputs = ConfigInputs {
            cache_home: non_empty_var(ENV_CACHE_HOME).map(PathBuf::from),
            xdg_cache_home: non_empty_var("XDG_CACHE_HOME").map(PathBuf::from),
            os_cache_dir: cache_dir(),
            home_dir: home_dir(),
            temp_dir: std::env::temp_dir(),
            trigger_bytes: non_empty_var(ENV_TRIGGER_BYTES),
            target_bytes: non_empty_var(ENV_TARGET_BYTES),
        };
        config_from_inputs(inputs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Inputs for resolving configuration
#[derive(Debug, Clone)]
struct ConfigInputs {
    cache_home: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
    trigger_bytes: Option<String>,
    target_bytes: Option<String>,
}

fn config_from_inputs(inputs: ConfigInputs) -> Result<CacheConfig> {
    let trigger_size = match inputs.trigger_bytes.as_deref() {
        Some(raw) => parse_bytes(ENV_TRIGGER_BYTES, raw)?,
        None => DEFAULT_TRIGGER_SIZE,
    };
    let target_size = match inputs.target_bytes.as_deref() {
        Some(raw) => parse_bytes(ENV_TARGET_BYTES, raw)?,
        None => DEFAULT_TARGET_SIZE,
    };

    // Resolution order (first usable wins):
    // 1) STOWAGE_CACHE_HOME (explicit override)
    // 2) XDG_CACHE_HOME
    // 3) OS cache dir
    // 4) ~/.cache
    // 5) TMPDIR (fallback)
    let mut candidates: Vec<PathBuf> = Vec::new();
    candidates.extend(inputs.cache_home);
    candidates.extend(inputs.xdg_cache_home);
    candidates.extend(inputs.os_cache_dir);
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".cache"));
    }
    candidates.push(inputs.temp_dir);

    let base_dir = candidates
        .into_iter()
        .find(|path| is_usable_base(path))
        .ok_or_else(|| Error::configuration("Failed to determine a writable cache directory"))?;
    tracing::debug!(base_dir = %base_dir.display(), trigger_size, target_size, "resolved cache configuration");

    Ok(CacheConfig {
        base_dir,
        trigger_size,
        target_size,
    })
}

fn is_usable_base(path: &Path) -> bool {
    // Nix build sandboxes point HOME here; it is never writable
    if path.starts_with("/homeless-shelter") {
        return false;
    }
    // Existing directories must be writable; some CI environments mount
    // read-only cache directories under $HOME.
    if path.exists() {
        let probe = path.join(".stowage_write_probe");
        return match std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&probe)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        };
    }
    std::fs::create_dir_all(path).is_ok()
}

fn parse_bytes(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        Error::configuration(format!("{name} must be a byte count, got '{raw}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inputs(temp_dir: PathBuf) -> ConfigInputs {
        ConfigInputs {
            cache_home: None,
            xdg_cache_home: None,
            os_cache_dir: None,
            home_dir: None,
            temp_dir,
            trigger_bytes: None,
            target_bytes: None,
        }
    }

    #[test]
    fn defaults_when_nothing_set() {
        let tmp = TempDir::new().unwrap();
        let config = config_from_inputs(inputs(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.base_dir, tmp.path());
        assert_eq!(config.policy(), EvictionPolicy::default());
    }

    #[test]
    fn explicit_override_wins() {
        let tmp = TempDir::new().unwrap();
        let override_dir = tmp.path().join("override");
        let mut inputs = inputs(std::env::temp_dir());
        inputs.cache_home = Some(override_dir.clone());
        inputs.xdg_cache_home = Some(tmp.path().join("xdg"));

        let config = config_from_inputs(inputs).unwrap();
        assert_eq!(config.base_dir, override_dir);
        assert!(override_dir.is_dir());
    }

    #[test]
    fn skips_homeless_shelter() {
        let tmp = TempDir::new().unwrap();
        let mut inputs = inputs(tmp.path().to_path_buf());
        inputs.xdg_cache_home = Some(PathBuf::from("/homeless-shelter/.cache"));
        inputs.home_dir = Some(PathBuf::from("/homeless-shelter"));

        let config = config_from_inputs(inputs).unwrap();
        assert!(!config.base_dir.starts_with("/homeless-shelter"));
        assert_eq!(config.base_dir, tmp.path());
    }

    #[test]
    fn home_candidate_uses_dot_cache() {
        let tmp = TempDir::new().unwrap();
        let mut inputs = inputs(std::env::temp_dir());
        inputs.home_dir = Some(tmp.path().to_path_buf());

        let config = config_from_inputs(inputs).unwrap();
        assert_eq!(config.base_dir, tmp.path().join(".cache"));
    }

    #[test]
    fn thresholds_from_inputs() {
        let tmp = TempDir::new().unwrap();
        let mut inputs = inputs(tmp.path().to_path_buf());
        inputs.trigger_bytes = Some("5000".to_string());
        inputs.target_bytes = Some(" 4000 ".to_string());

        let config = config_from_inputs(inputs).unwrap();
        assert_eq!(config.policy(), EvictionPolicy::new(5000, 4000));
    }

    #[test]
    fn invalid_threshold_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let mut inputs = inputs(tmp.path().to_path_buf());
        inputs.trigger_bytes = Some("3MB".to_string());

        let err = config_from_inputs(inputs).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains(ENV_TRIGGER_BYTES));
    }

    #[test]
    fn builder_overrides() {
        let config = CacheConfig::new("/var/cache/app").with_thresholds(10, 5);
        assert_eq!(config.base_dir, PathBuf::from("/var/cache/app"));
        assert_eq!(config.policy(), EvictionPolicy::new(10, 5));

        let moved = config.with_base_dir("/srv/cache");
        assert_eq!(moved.base_dir, PathBuf::from("/srv/cache"));
        assert_eq!(moved.trigger_size, 10);
    }
}
