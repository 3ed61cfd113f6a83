//! Engine configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `tally.toml`, then `TALLY_*` environment variables
//! (e.g. `TALLY_DATABASE_PATH`, `TALLY_AUDIT_BUFFER_SIZE`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tally_db::DbConfig;

/// Order engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a writer waits on SQLite's write lock. A cancellation holds
    /// that lock across its gateway call, so this must exceed
    /// `gateway_timeout_ms`.
    pub busy_timeout_ms: u64,

    /// Audit events buffered before new ones are dropped
    pub audit_buffer_size: usize,

    /// Per-event budget for the activity logger
    pub audit_timeout_ms: u64,

    /// Budget for each payment gateway call
    pub gateway_timeout_ms: u64,

    /// Orders per page when the caller does not say
    pub default_page_size: i64,

    /// Upper bound for `per_page`
    pub max_page_size: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./tally.db"),
            max_connections: 5,
            busy_timeout_ms: 15_000,
            audit_buffer_size: 1024,
            audit_timeout_ms: 5_000,
            gateway_timeout_ms: 10_000,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl EngineConfig {
    /// Loads defaults → `tally.toml` (optional) → `TALLY_*` environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("tally")
    }

    /// Same as [`EngineConfig::load`] with a custom file stem.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("TALLY").try_parsing(true))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML document. No environment lookup.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let d = EngineConfig::default();
        Ok(Config::builder()
            .set_default("database_path", d.database_path.to_string_lossy().to_string())?
            .set_default("max_connections", d.max_connections as i64)?
            .set_default("busy_timeout_ms", d.busy_timeout_ms as i64)?
            .set_default("audit_buffer_size", d.audit_buffer_size as i64)?
            .set_default("audit_timeout_ms", d.audit_timeout_ms as i64)?
            .set_default("gateway_timeout_ms", d.gateway_timeout_ms as i64)?
            .set_default("default_page_size", d.default_page_size)?
            .set_default("max_page_size", d.max_page_size)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.busy_timeout_ms <= self.gateway_timeout_ms {
            return Err(ConfigError::InvalidValue("busy_timeout_ms".to_string()));
        }
        if self.audit_buffer_size == 0 {
            return Err(ConfigError::InvalidValue("audit_buffer_size".to_string()));
        }
        if self.default_page_size < 1 || self.max_page_size < self.default_page_size {
            return Err(ConfigError::InvalidValue("default_page_size".to_string()));
        }
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_millis(self.audit_timeout_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            database_path = "/var/lib/tally/orders.db"
            gateway_timeout_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/tally/orders.db"));
        assert_eq!(config.gateway_timeout(), Duration::from_millis(2500));
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.audit_buffer_size, 1024);
    }

    #[test]
    fn test_invalid_page_sizes_rejected() {
        let err = EngineConfig::from_toml_str("default_page_size = 200\nmax_page_size = 50").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_busy_timeout_must_outlast_gateway_calls() {
        let err = EngineConfig::from_toml_str("busy_timeout_ms = 5000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref field) if field == "busy_timeout_ms"));

        let err = EngineConfig::from_toml_str("busy_timeout_ms = 8000\ngateway_timeout_ms = 8000")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let config =
            EngineConfig::from_toml_str("busy_timeout_ms = 4000\ngateway_timeout_ms = 3000").unwrap();
        assert_eq!(config.db_config().busy_timeout, Duration::from_millis(4000));
    }

    #[test]
    fn test_db_config() {
        let config = EngineConfig::default();
        let db = config.db_config();
        assert_eq!(db.max_connections, 5);
        assert_eq!(db.database_path, PathBuf::from("./tally.db"));
        assert!(db.busy_timeout > config.gateway_timeout());
    }
}
