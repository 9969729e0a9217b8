use std::path::Path;

use crate::adapter::inbound::cli::{config, output};
use crate::error::Result;

/// Validate a configuration file without starting a run.
pub fn execute_config(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = config::load(config_path)?;

    output::section("Configuration Check");
    match &path {
        Some(path) => output::field("Config", path.display()),
        None => output::field("Config", "defaults"),
    }
    output::success("Configuration is valid");

    output::section("Summary");
    output::field("Database", &config.database.path);
    output::field("Mode", config.workload.mode);
    output::field("Threads", config.workload.threads);
    output::field("Duration", format!("{}s", config.workload.duration_secs));
    output::field(
        "Pool",
        format!("{}..{}", config.pool.min_size, config.pool.max_size),
    );

    if config.pool.max_size < config.workload.threads {
        output::warning("max_size is below the worker count; workers will wait for connections");
    }
    if config.pool.leak_detection_threshold_secs > 0
        && config.pool.leak_detection_threshold_secs < config.workload.duration_secs
    {
        output::note("Workers hold connections for the whole run; expect leak warnings");
    }

    output::success("Configuration check complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbload.toml");
        std::fs::write(&path, "[workload]\nthreads = 2\n").unwrap();
        assert!(execute_config(Some(&path)).is_ok());
    }

    #[test]
    fn rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbload.toml");
        std::fs::write(&path, "[pool]\nmin_size = 10\nmax_size = 2\n").unwrap();
        assert!(execute_config(Some(&path)).is_err());
    }
}
