use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::ErrorCode;
use crate::scheduler::SpacedRepetitionSchedulerConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ORBIT_CONFIG";

/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "orbit.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Invalid { .. } => ErrorCode::InvalidConfigValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrbitConfig {
    #[serde(default)]
    pub scheduler: SpacedRepetitionSchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. Relative paths resolve against the orbit data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entities per `update_entities` transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_busy_timeout_millis")]
    pub busy_timeout_millis: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            batch_size: default_batch_size(),
            busy_timeout_millis: default_busy_timeout_millis(),
        }
    }
}

impl StoreConfig {
    /// Absolute (or data-dir relative) location of the database file.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        let base = dirs::data_dir().map(|dir| dir.join("orbit"));
        match (&self.path, base) {
            (Some(path), _) if path.is_absolute() => path.clone(),
            (Some(path), Some(base)) => base.join(path),
            (Some(path), None) => path.clone(),
            (None, Some(base)) => base.join(DEFAULT_DB_FILE),
            (None, None) => PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Components due up to this far in the future join the queue.
    #[serde(default = "default_lookahead_millis")]
    pub lookahead_millis: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            lookahead_millis: default_lookahead_millis(),
        }
    }
}

impl OrbitConfig {
    /// Reject values the scheduler or store can't work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        if self.store.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "store.batch_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.review.lookahead_millis < 0 {
            return Err(ConfigError::Invalid {
                field: "review.lookahead_millis",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Pick the config file to read: explicit path, then `$ORBIT_CONFIG`, then
/// `<config_dir>/orbit/config.toml`.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("orbit").join("config.toml"))
}

/// Load and validate the config. A missing file yields defaults, unless it
/// was named explicitly.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file can't be read, doesn't parse, or
/// holds invalid values.
pub fn load_config(explicit: Option<&Path>) -> Result<OrbitConfig, ConfigError> {
    let Some(path) = config_path(explicit) else {
        return Ok(OrbitConfig::default());
    };
    if explicit.is_none() && !path.exists() {
        return Ok(OrbitConfig::default());
    }
    load_config_file(&path)
}

/// Read one config file.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_file(path: &Path) -> Result<OrbitConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str::<OrbitConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

const fn default_batch_size() -> usize {
    100
}

const fn default_busy_timeout_millis() -> u64 {
    5_000
}

const fn default_max_queue_size() -> usize {
    50
}

const fn default_lookahead_millis() -> i64 {
    16 * 60 * 60 * 1000
}
