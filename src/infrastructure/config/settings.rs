//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; every section is optional and
//! falls back to its defaults. `DBLOAD_DATABASE_PATH` overrides the database
//! path.
//!
//! # Example
//!
//! ```no_run
//! use dbload::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("dbload.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use super::pool::PoolConfig;
use super::reporting::ReportingConfig;
use super::workload::WorkloadConfig;
use crate::error::{ConfigError, Result};

/// Environment variable that replaces `[database].path`.
pub const DATABASE_PATH_ENV: &str = "DBLOAD_DATABASE_PATH";

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Target database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Connection pool sizing and maintenance.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Worker count, mode, duration and pacing.
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Progress reporting and result export.
    #[serde(default)]
    pub reporting: ReportingConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Applies environment overrides before validating.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_overrides(std::env::var(DATABASE_PATH_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Replace values that may come from the environment.
    pub fn apply_overrides(&mut self, database_path: Option<String>) {
        if let Some(path) = database_path.filter(|p| !p.trim().is_empty()) {
            self.database.path = path;
        }
    }

    /// Validate configuration values.
    ///
    /// Checks that values are within acceptable ranges. Call again after
    /// mutating a loaded config (for example from CLI overrides).
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| ConfigError::InvalidValue {
            field,
            reason: reason.to_string(),
        };

        if !LoggingConfig::FORMATS.contains(&self.logging.format.as_str()) {
            return Err(invalid("format", "must be 'pretty' or 'json'").into());
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "path" }.into());
        }

        self.pool.validate()?;

        let workload = &self.workload;
        if workload.threads == 0 {
            return Err(invalid("threads", "must be greater than 0").into());
        }
        if workload.duration_secs == 0 {
            return Err(invalid("duration_secs", "must be greater than 0").into());
        }
        if workload.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0").into());
        }
        if !workload.target_tps.is_finite() || workload.target_tps < 0.0 {
            return Err(invalid("target_tps", "must be 0 or greater").into());
        }
        if workload.error_log_interval_secs == 0 {
            return Err(invalid("error_log_interval_secs", "must be greater than 0").into());
        }

        let reporting = &self.reporting;
        if reporting.monitor_interval_ms == 0 {
            return Err(invalid("monitor_interval_ms", "must be greater than 0").into());
        }
        if reporting.sub_second_window_ms == 0 || reporting.sub_second_window_ms > 1000 {
            return Err(invalid("sub_second_window_ms", "must be between 1 and 1000").into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
