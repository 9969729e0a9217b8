//! Connection pool configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Connection pool sizing, timeouts and maintenance settings.
///
/// All durations are whole seconds. A zero `idle_timeout_secs` or
/// `keepalive_time_secs` disables that maintenance rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    /// Connections created at warmup and kept by the health monitor.
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    /// Hard cap on live connections.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Upper bound on a single liveness check.
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,
    /// Upper bound on opening a single physical connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How long a worker waits for a connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Connections older than this are recycled.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    /// Checkouts held longer than this are reported as leaks.
    #[serde(default = "default_leak_detection_threshold_secs")]
    pub leak_detection_threshold_secs: u64,
    /// Health monitor tick.
    #[serde(default = "default_idle_check_interval_secs")]
    pub idle_check_interval_secs: u64,
    /// Idle connections above `min_size` are closed after this long.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Idle connections are re-validated after this long.
    #[serde(default = "default_keepalive_time_secs")]
    pub keepalive_time_secs: u64,
}

const fn default_min_size() -> usize {
    100
}

const fn default_max_size() -> usize {
    200
}

const fn default_validation_timeout_secs() -> u64 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_acquire_timeout_secs() -> u64 {
    30
}

const fn default_max_lifetime_secs() -> u64 {
    1800 // 30 minutes
}

const fn default_leak_detection_threshold_secs() -> u64 {
    60
}

const fn default_idle_check_interval_secs() -> u64 {
    30
}

const fn default_idle_timeout_secs() -> u64 {
    30
}

const fn default_keepalive_time_secs() -> u64 {
    30
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            validation_timeout_secs: default_validation_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            leak_detection_threshold_secs: default_leak_detection_threshold_secs(),
            idle_check_interval_secs: default_idle_check_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            keepalive_time_secs: default_keepalive_time_secs(),
        }
    }
}

impl PoolConfig {
    /// Check the sizing and interval constraints the pool relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::InvalidValue {
            field,
            reason: reason.to_string(),
        };

        if self.max_size == 0 {
            return Err(invalid("max_size", "must be greater than 0"));
        }
        if self.min_size > self.max_size {
            return Err(invalid("min_size", "must be <= max_size"));
        }
        if self.idle_check_interval_secs == 0 {
            return Err(invalid("idle_check_interval_secs", "must be greater than 0"));
        }
        if self.max_lifetime_secs == 0 {
            return Err(invalid("max_lifetime_secs", "must be greater than 0"));
        }
        if self.validation_timeout_secs == 0 {
            return Err(invalid("validation_timeout_secs", "must be greater than 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    #[must_use]
    pub const fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    #[must_use]
    pub const fn leak_detection_threshold(&self) -> Duration {
        Duration::from_secs(self.leak_detection_threshold_secs)
    }

    #[must_use]
    pub const fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs)
    }

    /// `None` when idle shrink-back is disabled.
    #[must_use]
    pub const fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// `None` when keepalive validation is disabled.
    #[must_use]
    pub const fn keepalive_time(&self) -> Option<Duration> {
        match self.keepalive_time_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
