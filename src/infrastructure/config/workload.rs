//! Workload configuration: what the workers do and for how long.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::WorkloadMode;

/// Worker count, run length, mode and pacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkloadConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default)]
    pub mode: WorkloadMode,
    /// Rows per insert transaction in `insert-only` mode.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Transactions completed before this point are excluded from the
    /// post-warmup statistics.
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    /// Worker starts are spread evenly over this window.
    #[serde(default)]
    pub ramp_up_secs: u64,
    /// Global transactions per second; `0` means unlimited.
    #[serde(default)]
    pub target_tps: f64,
    /// Base seed for per-worker random number generators.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub skip_schema_setup: bool,
    /// Empty the load table before the run.
    #[serde(default)]
    pub truncate: bool,
    /// Extra time workers get to finish after the run deadline.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Minimum spacing between repeated error log lines per worker.
    #[serde(default = "default_error_log_interval_secs")]
    pub error_log_interval_secs: u64,
}

const fn default_threads() -> usize {
    100
}

const fn default_duration_secs() -> u64 {
    300
}

const fn default_batch_size() -> usize {
    1
}

const fn default_warmup_secs() -> u64 {
    30
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

const fn default_error_log_interval_secs() -> u64 {
    10
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            duration_secs: default_duration_secs(),
            mode: WorkloadMode::default(),
            batch_size: default_batch_size(),
            warmup_secs: default_warmup_secs(),
            ramp_up_secs: 0,
            target_tps: 0.0,
            seed: None,
            skip_schema_setup: false,
            truncate: false,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            error_log_interval_secs: default_error_log_interval_secs(),
        }
    }
}

impl WorkloadConfig {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    #[must_use]
    pub const fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    #[must_use]
    pub const fn ramp_up(&self) -> Duration {
        Duration::from_secs(self.ramp_up_secs)
    }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    #[must_use]
    pub const fn error_log_interval(&self) -> Duration {
        Duration::from_secs(self.error_log_interval_secs)
    }
}
