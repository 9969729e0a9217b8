//! Database target configuration.

use std::time::Duration;

use serde::Deserialize;

/// SQLite target settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    ///
    /// Overridden by `DBLOAD_DATABASE_PATH` when set.
    #[serde(default = "default_path")]
    pub path: String,
    /// How long SQLite waits on a locked database before failing a statement.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_path() -> String {
    "dbload.db".to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
