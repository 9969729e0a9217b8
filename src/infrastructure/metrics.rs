//! Run-wide metrics registry.
//!
//! Workers record into a single [`MetricsRegistry`] shared by `Arc`. Counters
//! are atomics; the throughput window, latency buffers and snapshot list each
//! sit behind their own small mutex, and no method holds two of them at once.
//!
//! A warmup boundary, once set, splits transactions into warmup and measured.
//! Measured transactions feed a second latency buffer and the post-warmup
//! throughput figure.

mod latency;
mod throughput;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::domain::{FinalStats, IntervalStats, LatencyStats, Operation, PoolStats, Snapshot};

pub use latency::{LatencyWindow, MAX_SAMPLES};
pub use throughput::ThroughputWindow;

#[derive(Debug, Default)]
struct Counters {
    transactions: AtomicU64,
    post_warmup_transactions: AtomicU64,
    inserts: AtomicU64,
    selects: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    verification_failures: AtomicU64,
    connection_recreates: AtomicU64,
}

/// Plain copy of the counters used for interval deltas.
#[derive(Debug, Clone, Copy, Default)]
struct CounterValues {
    transactions: u64,
    inserts: u64,
    selects: u64,
    updates: u64,
    deletes: u64,
    errors: u64,
}

impl Counters {
    fn values(&self) -> CounterValues {
        CounterValues {
            transactions: self.transactions.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            selects: self.selects.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct IntervalMark {
    at: Instant,
    values: CounterValues,
}

/// Shared counters, rolling throughput and latency percentiles for one run.
#[derive(Debug)]
pub struct MetricsRegistry {
    started_at: Instant,
    warmup_end: Mutex<Option<Instant>>,
    warmup_reported: AtomicBool,
    counters: Counters,
    throughput: Mutex<ThroughputWindow>,
    latency: Mutex<LatencyWindow>,
    post_warmup_latency: Mutex<LatencyWindow>,
    interval: Mutex<IntervalMark>,
    snapshots: Mutex<Vec<Snapshot>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Create a registry whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            warmup_end: Mutex::new(None),
            warmup_reported: AtomicBool::new(false),
            counters: Counters::default(),
            throughput: Mutex::new(ThroughputWindow::default()),
            latency: Mutex::new(LatencyWindow::default()),
            post_warmup_latency: Mutex::new(LatencyWindow::default()),
            interval: Mutex::new(IntervalMark {
                at: now,
                values: CounterValues::default(),
            }),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    /// Create a registry with the warmup boundary `warmup` from now.
    #[must_use]
    pub fn with_warmup(warmup: Duration) -> Self {
        let registry = Self::new();
        if !warmup.is_zero() {
            registry.set_warmup_end(registry.started_at + warmup);
        }
        registry
    }

    /// Set the instant at which measurement starts. Only the first call
    /// takes effect.
    pub fn set_warmup_end(&self, at: Instant) {
        let mut end = self.warmup_end.lock();
        if end.is_none() {
            *end = Some(at);
        }
    }

    #[must_use]
    pub fn warmup_end(&self) -> Option<Instant> {
        *self.warmup_end.lock()
    }

    /// Whether `now` falls before the warmup boundary.
    #[must_use]
    pub fn is_warmup(&self) -> bool {
        self.is_warmup_at(Instant::now())
    }

    fn is_warmup_at(&self, now: Instant) -> bool {
        self.warmup_end().is_some_and(|end| now < end)
    }

    /// Returns `true` exactly once, on the first call after the warmup
    /// boundary has passed.
    pub fn take_warmup_completion(&self) -> bool {
        match self.warmup_end() {
            Some(end) if Instant::now() >= end => !self.warmup_reported.swap(true, Ordering::AcqRel),
            _ => false,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Count `count` operations of one kind.
    pub fn record_operation(&self, op: Operation, count: u64) {
        let counter = match op {
            Operation::Insert => &self.counters.inserts,
            Operation::Select => &self.counters.selects,
            Operation::Update => &self.counters.updates,
            Operation::Delete => &self.counters.deletes,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one committed transaction and its latency.
    pub fn record_transaction(&self, latency: Duration) {
        let now = Instant::now();
        let measured = self.warmup_end().is_some_and(|end| now >= end);

        self.counters.transactions.fetch_add(1, Ordering::Relaxed);
        if measured {
            self.counters
                .post_warmup_transactions
                .fetch_add(1, Ordering::Relaxed);
        }

        self.throughput.lock().record(now);
        self.latency.lock().record(latency);
        if measured {
            self.post_warmup_latency.lock().record(latency);
        }
    }

    pub fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verification_failure(&self) {
        self.counters
            .verification_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_recreate(&self) {
        self.counters
            .connection_recreates
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn total_transactions(&self) -> u64 {
        self.counters.transactions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn post_warmup_transactions(&self) -> u64 {
        self.counters
            .post_warmup_transactions
            .load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_recreates(&self) -> u64 {
        self.counters.connection_recreates.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn verification_failures(&self) -> u64 {
        self.counters
            .verification_failures
            .load(Ordering::Relaxed)
    }

    /// Transactions completed in the last second.
    #[must_use]
    pub fn realtime_tps(&self) -> f64 {
        self.throughput.lock().per_second(Instant::now())
    }

    /// Transactions in the last `window`, scaled to per second.
    #[must_use]
    pub fn windowed_tps(&self, window: Duration) -> f64 {
        self.throughput.lock().windowed(Instant::now(), window)
    }

    /// Total transactions over total elapsed time.
    #[must_use]
    pub fn avg_tps(&self) -> f64 {
        rate(self.total_transactions(), self.elapsed())
    }

    /// Post-warmup transactions over the time since the boundary.
    ///
    /// `None` without a boundary; `Some(0.0)` before it is reached.
    #[must_use]
    pub fn post_warmup_tps(&self) -> Option<f64> {
        let end = self.warmup_end()?;
        let since = Instant::now().saturating_duration_since(end);
        Some(rate(self.post_warmup_transactions(), since))
    }

    #[must_use]
    pub fn latency_stats(&self) -> LatencyStats {
        self.latency.lock().stats()
    }

    #[must_use]
    pub fn post_warmup_latency_stats(&self) -> Option<LatencyStats> {
        self.warmup_end()?;
        Some(self.post_warmup_latency.lock().stats())
    }

    /// Counter deltas since the previous call (or since the registry was
    /// created).
    pub fn interval_stats(&self) -> IntervalStats {
        let now = Instant::now();
        let current = self.counters.values();
        let mut mark = self.interval.lock();
        let interval = now.saturating_duration_since(mark.at);
        let prev = mark.values;
        mark.at = now;
        mark.values = current;
        drop(mark);

        let transactions = current.transactions.saturating_sub(prev.transactions);
        IntervalStats {
            interval_secs: interval.as_secs_f64(),
            transactions,
            inserts: current.inserts.saturating_sub(prev.inserts),
            selects: current.selects.saturating_sub(prev.selects),
            updates: current.updates.saturating_sub(prev.updates),
            deletes: current.deletes.saturating_sub(prev.deletes),
            errors: current.errors.saturating_sub(prev.errors),
            tps: rate(transactions, interval),
        }
    }

    /// Capture a snapshot, store it in the time series and return it.
    pub fn take_snapshot(&self, pool: PoolStats) -> Snapshot {
        let values = self.counters.values();
        let latency = self.latency_stats();
        let snapshot = Snapshot {
            timestamp: Utc::now(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            total_transactions: values.transactions,
            inserts: values.inserts,
            selects: values.selects,
            updates: values.updates,
            deletes: values.deletes,
            errors: values.errors,
            realtime_tps: self.realtime_tps(),
            avg_tps: self.avg_tps(),
            post_warmup_tps: self.post_warmup_tps(),
            latency_avg_ms: latency.avg_ms,
            latency_p50_ms: latency.p50_ms,
            latency_p95_ms: latency.p95_ms,
            latency_p99_ms: latency.p99_ms,
            is_warmup: self.is_warmup(),
            pool,
        };
        self.snapshots.lock().push(snapshot.clone());
        snapshot
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    /// Cumulative statistics for the run so far.
    #[must_use]
    pub fn final_stats(&self) -> FinalStats {
        let values = self.counters.values();
        FinalStats {
            elapsed_secs: self.elapsed().as_secs_f64(),
            total_transactions: values.transactions,
            post_warmup_transactions: self.post_warmup_transactions(),
            inserts: values.inserts,
            selects: values.selects,
            updates: values.updates,
            deletes: values.deletes,
            errors: values.errors,
            verification_failures: self.verification_failures(),
            connection_recreates: self.connection_recreates(),
            avg_tps: self.avg_tps(),
            post_warmup_tps: self.post_warmup_tps(),
            realtime_tps: self.realtime_tps(),
            latency: self.latency_stats(),
            post_warmup_latency: self.post_warmup_latency_stats(),
        }
    }
}

fn rate(count: u64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn warmup_partitions_transactions() {
        let metrics = MetricsRegistry::with_warmup(Duration::from_secs(5));

        for _ in 0..30 {
            metrics.record_transaction(Duration::from_millis(100));
        }
        assert!(metrics.is_warmup());
        assert!(!metrics.take_warmup_completion());

        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..20 {
            metrics.record_transaction(Duration::from_millis(10));
        }
        tokio::time::advance(Duration::from_secs(5)).await;

        let stats = metrics.final_stats();
        assert_eq!(stats.total_transactions, 50);
        assert_eq!(stats.post_warmup_transactions, 20);
        assert!(stats.post_warmup_transactions <= stats.total_transactions);
        // 20 transactions over the 5 s since the boundary.
        let post_tps = stats.post_warmup_tps.unwrap();
        assert!((post_tps - 4.0).abs() < 1e-9);
        assert!((stats.avg_tps - 5.0).abs() < 1e-9);

        let post_latency = stats.post_warmup_latency.unwrap();
        assert_eq!(post_latency.samples, 20);
        assert!((post_latency.max_ms - 10.0).abs() < 1e-9);
        assert_eq!(stats.latency.samples, 50);

        assert!(metrics.take_warmup_completion());
        assert!(!metrics.take_warmup_completion());
    }

    #[tokio::test(start_paused = true)]
    async fn without_boundary_post_warmup_is_absent() {
        let metrics = MetricsRegistry::new();
        metrics.record_transaction(Duration::from_millis(3));
        let stats = metrics.final_stats();
        assert_eq!(stats.post_warmup_tps, None);
        assert_eq!(stats.post_warmup_latency, None);
        assert_eq!(stats.post_warmup_transactions, 0);
        assert!(!metrics.is_warmup());
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_tps_counts_last_second() {
        let metrics = MetricsRegistry::new();
        for _ in 0..7 {
            metrics.record_transaction(Duration::from_millis(1));
        }
        assert!((metrics.realtime_tps() - 7.0).abs() < 1e-9);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(metrics.realtime_tps().abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_stats_report_deltas() {
        let metrics = MetricsRegistry::new();
        metrics.record_operation(Operation::Insert, 3);
        metrics.record_transaction(Duration::from_millis(1));
        metrics.record_error();
        tokio::time::advance(Duration::from_secs(1)).await;

        let first = metrics.interval_stats();
        assert_eq!(first.inserts, 3);
        assert_eq!(first.transactions, 1);
        assert_eq!(first.errors, 1);
        assert!((first.tps - 1.0).abs() < 1e-9);

        metrics.record_operation(Operation::Delete, 1);
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = metrics.interval_stats();
        assert_eq!(second.inserts, 0);
        assert_eq!(second.deletes, 1);
        assert_eq!(second.transactions, 0);
        assert!((second.interval_secs - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_accumulate_in_order() {
        let metrics = MetricsRegistry::with_warmup(Duration::from_secs(1));
        let first = metrics.take_snapshot(PoolStats::default());
        assert!(first.is_warmup);

        tokio::time::advance(Duration::from_secs(2)).await;
        metrics.record_transaction(Duration::from_millis(5));
        let second = metrics.take_snapshot(PoolStats::default());
        assert!(!second.is_warmup);
        assert_eq!(second.total_transactions, 1);

        let series = metrics.snapshots();
        assert_eq!(series.len(), 2);
        assert!(series[0].elapsed_secs < series[1].elapsed_secs);
    }

    #[test]
    fn counters_are_monotonic() {
        let metrics = MetricsRegistry::new();
        metrics.record_verification_failure();
        metrics.record_connection_recreate();
        metrics.record_connection_recreate();
        assert_eq!(metrics.verification_failures(), 1);
        assert_eq!(metrics.connection_recreates(), 2);
    }
}
