//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::domain::WorkloadMode;
use crate::infrastructure::config::pool::PoolConfig;
use crate::infrastructure::config::settings::Config;

/// Pool config with the given sizes and slow maintenance.
///
/// Lifetimes and idle rules are long enough that nothing is recycled unless
/// a test moves the clock. Override individual fields for timing tests.
pub fn pool(min_size: usize, max_size: usize) -> PoolConfig {
    PoolConfig {
        min_size,
        max_size,
        validation_timeout_secs: 1,
        connect_timeout_secs: 1,
        acquire_timeout_secs: 2,
        max_lifetime_secs: 3600,
        leak_detection_threshold_secs: 600,
        idle_check_interval_secs: 30,
        idle_timeout_secs: 0,
        keepalive_time_secs: 0,
    }
}

/// Full application config for a short in-memory run.
pub fn run(threads: usize, duration_secs: u64, mode: WorkloadMode) -> Config {
    let mut config = Config::default();
    config.pool = pool(threads.min(4), threads.max(1));
    config.workload.threads = threads;
    config.workload.duration_secs = duration_secs;
    config.workload.mode = mode;
    config.workload.warmup_secs = 0;
    config.workload.seed = Some(7);
    config.workload.shutdown_grace_secs = 2;
    config.reporting.monitor_interval_ms = 500;
    config
}
