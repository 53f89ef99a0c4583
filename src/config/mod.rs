//! Configuration management for gator.
//!
//! Configuration is read from `~/.config/gator/config.toml` (or the path given
//! with `--config` / `GATOR_CONFIG`) at startup. If the file doesn't exist, a
//! default configuration is written. The file is rewritten whenever the
//! session user changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::Session;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 60;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 6 * 3600;

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database location: a file path, a `sqlite://` URL or `:memory:`.
    pub db_url: String,
    pub current_user_name: Option<String>,
    pub fetch_timeout_secs: u64,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            current_user_name: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

fn default_db_url() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gator")
        .join("gator.db")
        .to_string_lossy()
        .into_owned()
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

impl Config {
    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    ///
    /// Missing fields in the config file will use default values.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Record the session user and rewrite the file at `path` if it changed.
    ///
    /// Returns whether the file was written.
    pub fn sync_session(&mut self, session: &Session, path: &Path) -> Result<bool, ConfigError> {
        let current = session.current_user();
        if current == self.current_user_name.as_deref() {
            return Ok(false);
        }

        self.current_user_name = current.map(String::from);
        self.save_to(path)?;
        Ok(true)
    }

    /// Get the default config file path: `~/.config/gator/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("gator").join("config.toml"))
    }

    pub fn db_location(&self) -> DbLocation {
        let raw = self.db_url.trim();
        let raw = raw.strip_prefix("sqlite://").unwrap_or(raw);
        if raw.is_empty() || raw == ":memory:" {
            DbLocation::Memory
        } else {
            DbLocation::File(PathBuf::from(raw))
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
