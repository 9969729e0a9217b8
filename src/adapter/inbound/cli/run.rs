//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::{config, output};
use crate::adapter::outbound::sqlite::SqliteBackend;
use crate::app::{Orchestrator, RunReport};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let (mut config, _) = config::load(args.config.as_deref())?;
    apply_args(&mut config, args, output::is_json());
    config.validate()?;
    config.init_logging();

    print_startup_config(&config);

    let backend = Arc::new(SqliteBackend::new(&config.database));
    let orchestrator = Orchestrator::new(config, backend);

    let shutdown = orchestrator.shutdown_signal();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.request();
        }
    });

    let report = orchestrator.run().await?;
    print_summary(&report);
    Ok(())
}

/// Apply command-line overrides on top of the loaded config.
pub fn apply_args(config: &mut Config, args: &RunArgs, force_json_logs: bool) {
    if let Some(path) = &args.database {
        config.database.path.clone_from(path);
    }

    let workload = &mut config.workload;
    if let Some(threads) = args.threads {
        workload.threads = threads;
    }
    if let Some(duration) = args.duration {
        workload.duration_secs = duration;
    }
    if let Some(mode) = args.mode {
        workload.mode = mode;
    }
    if let Some(batch_size) = args.batch_size {
        workload.batch_size = batch_size;
    }
    if let Some(warmup) = args.warmup {
        workload.warmup_secs = warmup;
    }
    if let Some(ramp_up) = args.ramp_up {
        workload.ramp_up_secs = ramp_up;
    }
    if let Some(target_tps) = args.target_tps {
        workload.target_tps = target_tps;
    }
    if args.seed.is_some() {
        workload.seed = args.seed;
    }
    workload.truncate |= args.truncate;
    workload.skip_schema_setup |= args.skip_schema_setup;

    if let Some(min) = args.min_pool {
        config.pool.min_size = min;
    }
    if let Some(max) = args.max_pool {
        config.pool.max_size = max;
    }

    if let Some(interval) = args.monitor_interval_ms {
        config.reporting.monitor_interval_ms = interval;
    }
    if args.output.is_some() {
        config.reporting.output.clone_from(&args.output);
    }
    if let Some(format) = args.output_format {
        config.reporting.output_format = format;
    }

    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || force_json_logs {
        config.logging.format = "json".to_string();
    }
}

fn print_startup_config(config: &Config) {
    let workload = &config.workload;
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Database", &config.database.path);
    output::field("Mode", workload.mode);
    output::field("Threads", workload.threads);
    output::field("Duration", format!("{}s", workload.duration_secs));
    output::field(
        "Pool",
        format!("{}..{}", config.pool.min_size, config.pool.max_size),
    );
    if output::verbosity() > 0 {
        output::field("Warmup", format!("{}s", workload.warmup_secs));
        output::field("Ramp-up", format!("{}s", workload.ramp_up_secs));
        output::field("Batch size", workload.batch_size);
    }
    if workload.target_tps > 0.0 {
        output::field("Target TPS", workload.target_tps);
    }
    if workload.truncate {
        output::warning("Load table will be truncated before the run");
    }
}

fn print_summary(report: &RunReport) {
    let stats = &report.stats;
    output::section("Summary");
    output::field("Transactions", stats.total_transactions);
    output::field("Errors", stats.errors);
    output::field("Avg TPS", format!("{:.1}", stats.avg_tps));
    if let Some(tps) = stats.post_warmup_tps {
        output::field("Measured TPS", format!("{tps:.1}"));
    }
    output::field(
        "Latency",
        format!(
            "avg {:.2}ms  p95 {:.2}ms  p99 {:.2}ms",
            stats.latency.avg_ms, stats.latency.p95_ms, stats.latency.p99_ms
        ),
    );
    if let Some(rate) = stats.success_rate() {
        output::field("Success", format!("{rate:.2}%"));
    }
    if stats.verification_failures > 0 {
        output::warning(&format!(
            "{} read-back verification failures",
            stats.verification_failures
        ));
    }
    if report.interrupted {
        output::warning("Run interrupted before its deadline");
    }
    output::success("Load test complete");
}
