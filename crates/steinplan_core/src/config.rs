//! Core configuration.
//!
//! # Responsibility
//! - Resolve on-disk locations (database file, log directory) from one data dir.
//! - Carry the storage key of the durable record mirror.
//!
//! # Invariants
//! - `data_dir` is never empty.
//! - The core never reads environment variables; callers build the config.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Storage key of the record collection blob.
pub const DEFAULT_STORAGE_KEY: &str = "steinformat-forms";
/// File name of the SQLite database inside the data directory.
pub const DB_FILE_NAME: &str = "steinplan.sqlite3";
const LOG_DIR_NAME: &str = "logs";

/// Error returned for unusable configuration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyDataDir,
    EmptyStorageKey,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDataDir => write!(f, "data_dir cannot be empty"),
            Self::EmptyStorageKey => write!(f, "storage_key cannot be empty"),
        }
    }
}

impl Error for ConfigError {}

/// Locations and keys used to open a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    data_dir: PathBuf,
    storage_key: String,
    log_level: &'static str,
}

impl CoreConfig {
    /// Creates a config rooted at `data_dir` with default key and log level.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.into();
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        Ok(Self {
            data_dir,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: default_log_level(),
        })
    }

    /// Overrides the storage key, e.g. to keep several collections in one db.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        self.storage_key = key;
        Ok(self)
    }

    pub fn with_log_level(mut self, level: &'static str) -> Self {
        self.log_level = level;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn log_level(&self) -> &'static str {
        self.log_level
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// Directory receiving rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_STORAGE_KEY};
    use std::path::Path;

    #[test]
    fn derives_paths_from_data_dir() {
        let config = CoreConfig::new("/tmp/steinplan").unwrap();
        assert_eq!(config.storage_key(), DEFAULT_STORAGE_KEY);
        assert_eq!(
            config.db_path(),
            Path::new("/tmp/steinplan/steinplan.sqlite3")
        );
        assert_eq!(config.log_dir(), Path::new("/tmp/steinplan/logs"));
    }

    #[test]
    fn rejects_empty_inputs() {
        assert_eq!(CoreConfig::new("").unwrap_err(), ConfigError::EmptyDataDir);
        let err = CoreConfig::new("/tmp/x")
            .unwrap()
            .with_storage_key("  ")
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyStorageKey);
    }
}
