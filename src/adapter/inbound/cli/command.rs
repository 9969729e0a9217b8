//! Command-line interface definitions.
//!
//! Defines the CLI structure for dbload using `clap`. The CLI runs load
//! tests, prints the load table DDL and validates configuration files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::WorkloadMode;
use crate::infrastructure::config::reporting::ReportFormat;

/// Concurrent database load generator
#[derive(Parser, Debug)]
#[command(name = "dbload")]
#[command(version)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Top-level subcommands for the dbload CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test (foreground, ctrl-c stops early)
    Run(Box<RunArgs>),

    /// Print the load table DDL
    Ddl(ConfigPathArg),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `dbload check`.
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate the configuration file syntax and semantics.
    Config(ConfigPathArg),
}

/// Shared `--config` argument.
#[derive(clap::Args, Debug, Default)]
pub struct ConfigPathArg {
    /// Path to the configuration file (defaults apply when omitted).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for `dbload run`. Every flag overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Path to the configuration file (defaults apply when omitted).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long)]
    pub database: Option<String>,

    /// Number of concurrent workers.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Run length in seconds.
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Workload mode.
    #[arg(short, long)]
    pub mode: Option<WorkloadMode>,

    /// Rows per insert transaction in insert-only mode.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds excluded from post-warmup statistics.
    #[arg(long)]
    pub warmup: Option<u64>,

    /// Seconds over which worker starts are spread.
    #[arg(long)]
    pub ramp_up: Option<u64>,

    /// Global transaction rate cap (0 = unlimited).
    #[arg(long)]
    pub target_tps: Option<f64>,

    /// Minimum pool size.
    #[arg(long)]
    pub min_pool: Option<usize>,

    /// Maximum pool size.
    #[arg(long)]
    pub max_pool: Option<usize>,

    /// Seed for reproducible operation sequences.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Empty the load table before the run.
    #[arg(long)]
    pub truncate: bool,

    /// Do not create the load table.
    #[arg(long)]
    pub skip_schema_setup: bool,

    /// Progress report interval in milliseconds.
    #[arg(long)]
    pub monitor_interval_ms: Option<u64>,

    /// Write the run report to this path.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report file format [json, csv].
    #[arg(long)]
    pub output_format: Option<ReportFormat>,

    /// Override log level (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty-printed logs.
    #[arg(long)]
    pub json_logs: bool,
}
