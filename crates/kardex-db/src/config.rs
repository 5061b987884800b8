//! # Configuration
//!
//! Loads the database and ledger settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KARDEX_DB_PATH=./data/kardex.db                                    │
//! │     KARDEX_MAX_CONNECTIONS=8                                           │
//! │     KARDEX_MAX_COMMIT_ATTEMPTS=16                                      │
//! │     KARDEX_RETRY_BACKOFF_MS=2                                          │
//! │                                                                         │
//! │  2. TOML Config File (kardex.toml)                                     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./kardex.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! max_commit_attempts = 8
//! retry_backoff_ms = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ledger::LedgerConfig;
use crate::pool::DbConfig;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

/// The `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kardex.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Kardex configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl KardexConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file, if given and present
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                info!(?path, "Loading config from file");
                Self::from_toml(&std::fs::read_to_string(path)?)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.ledger.max_commit_attempts == 0 {
            return Err(ConfigError::Invalid(
                "ledger.max_commit_attempts must be greater than 0".into(),
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `KARDEX_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("KARDEX_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("KARDEX_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %value, "Ignoring invalid KARDEX_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("KARDEX_MAX_COMMIT_ATTEMPTS") {
            match value.parse() {
                Ok(attempts) => self.ledger.max_commit_attempts = attempts,
                Err(_) => warn!(value = %value, "Ignoring invalid KARDEX_MAX_COMMIT_ATTEMPTS"),
            }
        }

        if let Some(value) = lookup("KARDEX_RETRY_BACKOFF_MS") {
            match value.parse() {
                Ok(ms) => self.ledger.retry_backoff_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid KARDEX_RETRY_BACKOFF_MS"),
            }
        }
    }

    /// Builds the pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        };

        base.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = KardexConfig::default();
        assert_eq!(config.database.path, PathBuf::from("kardex.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ledger.max_commit_attempts, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config = KardexConfig::from_toml(
            r#"
            [ledger]
            max_commit_attempts = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.max_commit_attempts, 20);
        assert_eq!(config.ledger.retry_backoff_ms, 5);
        assert_eq!(config.database, DatabaseSettings::default());
    }

    #[test]
    fn test_malformed_file() {
        let err = KardexConfig::from_toml("[ledger]\nmax_commit_attempts = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KARDEX_DB_PATH", "/var/lib/kardex.db"),
            ("KARDEX_MAX_CONNECTIONS", "9"),
            ("KARDEX_MAX_COMMIT_ATTEMPTS", "not-a-number"),
            ("KARDEX_RETRY_BACKOFF_MS", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = KardexConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/var/lib/kardex.db"));
        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.ledger.max_commit_attempts, 8);
        assert_eq!(config.ledger.retry_backoff_ms, 1);
    }

    #[test]
    fn test_validation() {
        let mut config = KardexConfig::default();
        config.ledger.max_commit_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = KardexConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_config() {
        let mut config = KardexConfig::default();
        config.database.path = PathBuf::from(":memory:");
        assert!(config.db_config().is_in_memory());

        config.database.path = PathBuf::from("stock.db");
        config.database.max_connections = 7;
        let db = config.db_config();
        assert_eq!(db.max_connections, 7);
        assert_eq!(db.busy_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("kardex-does-not-exist.toml");
        let config = KardexConfig::load(Some(&path)).unwrap();
        assert_eq!(config.ledger, LedgerConfig::default());
    }
}
