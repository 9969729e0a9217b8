//! Run report export.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::worker::WorkerSummary;
use crate::domain::{FinalStats, PoolStats, Snapshot, WorkloadMode};
use crate::error::Result;
use crate::infrastructure::config::reporting::ReportFormat;

/// Everything a finished run produced, ready for export.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub backend: &'static str,
    pub mode: WorkloadMode,
    pub threads: usize,
    pub duration_secs: u64,
    pub warmup_secs: u64,
    /// Shutdown was requested before the run deadline.
    pub interrupted: bool,
    pub stats: FinalStats,
    pub pool: PoolStats,
    pub snapshots: Vec<Snapshot>,
    pub workers: Vec<WorkerSummary>,
}

impl RunReport {
    /// Write the report in `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write(&self, path: impl AsRef<Path>, format: ReportFormat) -> Result<()> {
        match format {
            ReportFormat::Json => self.write_json(path),
            ReportFormat::Csv => self.write_csv(path),
        }
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write the report as CSV sections: configuration and final statistics
    /// as `# key,value` lines, then the snapshot and worker tables.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)?;

        let run = json!({
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "backend": self.backend,
            "mode": self.mode,
            "threads": self.threads,
            "duration_secs": self.duration_secs,
            "warmup_secs": self.warmup_secs,
            "interrupted": self.interrupted,
        });
        write_pairs(&mut writer, "# Configuration", &run)?;
        write_pairs(&mut writer, "# Final Statistics", &serde_json::to_value(&self.stats)?)?;
        write_pairs(&mut writer, "# Pool", &serde_json::to_value(&self.pool)?)?;
        write_table(&mut writer, "# Time Series Data", &self.snapshots)?;
        write_table(&mut writer, "# Workers", &self.workers)?;

        writer.flush()?;
        Ok(())
    }
}

type CsvWriter = csv::Writer<std::fs::File>;

fn write_pairs(writer: &mut CsvWriter, title: &str, value: &Value) -> Result<()> {
    writer.write_record([title])?;
    let mut fields = Vec::new();
    flatten("", value, &mut fields);
    for (key, value) in fields {
        writer.write_record([format!("# {key}"), value])?;
    }
    Ok(())
}

fn write_table<T: Serialize>(writer: &mut CsvWriter, title: &str, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    writer.write_record([title])?;
    for (i, row) in rows.iter().enumerate() {
        let mut fields = Vec::new();
        flatten("", &serde_json::to_value(row)?, &mut fields);
        if i == 0 {
            writer.write_record(fields.iter().map(|(key, _)| key))?;
        }
        writer.write_record(fields.iter().map(|(_, value)| value))?;
    }
    Ok(())
}

/// Flatten nested objects into dotted keys, e.g. `latency.p95_ms`.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&key, value, out);
            }
        }
        Value::Null => out.push((prefix.to_string(), String::new())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
