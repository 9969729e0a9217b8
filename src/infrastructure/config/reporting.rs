//! Reporting loop and result export configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File format of the exported run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    /// Configuration and final statistics as `# key,value` lines, then the
    /// snapshot time series and per-worker totals as tables.
    Csv,
}

impl ReportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("unknown report format '{s}' (expected json or csv)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportingConfig {
    /// Period of the progress log line and snapshot capture.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Window used for the sub-second throughput reading.
    #[serde(default = "default_sub_second_window_ms")]
    pub sub_second_window_ms: u64,
    /// Write the run report to this path.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub output_format: ReportFormat,
}

const fn default_monitor_interval_ms() -> u64 {
    1000
}

const fn default_sub_second_window_ms() -> u64 {
    100
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: default_monitor_interval_ms(),
            sub_second_window_ms: default_sub_second_window_ms(),
            output: None,
            output_format: ReportFormat::default(),
        }
    }
}

impl ReportingConfig {
    #[must_use]
    pub const fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    #[must_use]
    pub const fn sub_second_window(&self) -> Duration {
        Duration::from_millis(self.sub_second_window_ms)
    }
}
