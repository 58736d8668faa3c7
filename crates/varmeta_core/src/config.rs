//! Configuration file handling.
//!
//! # Responsibility
//! - Define the configuration value consumed by the composition root:
//!   database location, logging policy, pagination defaults.
//! - Load and save the JSON configuration file.
//!
//! # Invariants
//! - A missing file or missing keys fall back to defaults; partial files
//!   merge over them.
//! - No process-wide configuration state: callers construct a `Config` and
//!   pass it down.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "VARMETA_CONFIG_PATH";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "configuration file i/o error: {err}"),
            Self::Parse(err) => write!(f, "configuration file is not valid JSON: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level configuration, grouped by concern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
    /// Directory for database backups made by collaborators.
    pub backup_dir: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let base = data_dir();
        Self {
            path: base.join("varmeta.db"),
            backup_dir: base.join("backups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace|debug|info|warn|error.
    pub level: String,
    /// Directory receiving rotated log files.
    pub dir: PathBuf,
    /// Rotation threshold per log file.
    pub max_file_size_bytes: u64,
    /// Rotated files kept before cleanup.
    pub keep_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: data_dir().join("logs"),
            max_file_size_bytes: 10 * 1024 * 1024,
            keep_files: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size collaborators use when the caller gives none.
    pub page_size: u32,
    /// Cap collaborators apply to caller-requested page sizes. The engine
    /// itself enforces its own hard bound independently.
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: crate::store::DEFAULT_PAGE_SIZE,
            max_page_size: 100,
        }
    }
}

impl Config {
    /// Returns the configuration file path: the `VARMETA_CONFIG_PATH`
    /// environment variable when set, otherwise `~/.varmeta/config.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("config.json"))
    }

    /// Loads configuration from `path`, merging file content over defaults.
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes this configuration as pretty-printed JSON, creating the
    /// parent directory when missing.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

fn data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".varmeta")
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_point_under_the_data_directory() {
        let config = Config::default();
        assert!(config.database.path.ends_with("varmeta.db"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pagination.page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pagination": {"page_size": 50}}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.pagination.page_size, 50);
        assert_eq!(loaded.pagination.max_page_size, 100);
        assert_eq!(loaded.database, Config::default().database);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        config.pagination.page_size = 25;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(super::ConfigError::Parse(_))
        ));
    }
}
