//! Statistics records handed to reporters and exporters.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A row read back from the load table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: i64,
    pub worker: String,
    pub payload: String,
}

/// Point-in-time connection pool occupancy and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Connections created and not yet destroyed.
    pub total: usize,
    /// Connections currently checked out.
    pub active: usize,
    pub idle: usize,
    pub created: u64,
    /// Connections destroyed for exceeding their max lifetime.
    pub recycled: u64,
    /// Connections discarded by callers after a failure.
    pub discarded: u64,
    pub leak_warnings: u64,
    pub close_errors: u64,
    /// Values were read without the pool lock and may lag slightly.
    pub stale: bool,
}

/// Latency distribution in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Counter deltas since the previous interval read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IntervalStats {
    pub interval_secs: f64,
    pub transactions: u64,
    pub inserts: u64,
    pub selects: u64,
    pub updates: u64,
    pub deletes: u64,
    pub errors: u64,
    pub tps: f64,
}

/// Cumulative statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalStats {
    pub elapsed_secs: f64,
    pub total_transactions: u64,
    pub post_warmup_transactions: u64,
    pub inserts: u64,
    pub selects: u64,
    pub updates: u64,
    pub deletes: u64,
    pub errors: u64,
    pub verification_failures: u64,
    pub connection_recreates: u64,
    pub avg_tps: f64,
    /// Present once a warmup boundary has been configured.
    pub post_warmup_tps: Option<f64>,
    pub realtime_tps: f64,
    pub latency: LatencyStats,
    pub post_warmup_latency: Option<LatencyStats>,
}

impl FinalStats {
    /// Share of transactions that did not end in an error, as a percentage.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_transactions == 0 {
            return None;
        }
        let ratio = self.errors as f64 / self.total_transactions as f64;
        Some(((1.0 - ratio) * 100.0).max(0.0))
    }
}

/// One entry of the periodic time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total_transactions: u64,
    pub inserts: u64,
    pub selects: u64,
    pub updates: u64,
    pub deletes: u64,
    pub errors: u64,
    pub realtime_tps: f64,
    pub avg_tps: f64,
    pub post_warmup_tps: Option<f64>,
    pub latency_avg_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub is_warmup: bool,
    pub pool: PoolStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_none_without_transactions() {
        assert_eq!(FinalStats::default().success_rate(), None);
    }

    #[test]
    fn success_rate_accounts_for_errors() {
        let stats = FinalStats {
            total_transactions: 200,
            errors: 10,
            ..FinalStats::default()
        };
        let rate = stats.success_rate().unwrap();
        assert!((rate - 95.0).abs() < 1e-9);
    }

    #[test]
    fn success_rate_never_negative() {
        let stats = FinalStats {
            total_transactions: 2,
            errors: 5,
            ..FinalStats::default()
        };
        assert_eq!(stats.success_rate(), Some(0.0));
    }
}
