//! Periodic progress reporting.
//!
//! The reporter ticks on `reporting.monitor_interval_ms`, records a
//! [`Snapshot`] for the run report and logs interval deltas next to the
//! rolling throughput figures. [`log_final`] prints the closing summary.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::domain::{FinalStats, PoolStats, Snapshot};
use crate::infrastructure::config::reporting::ReportingConfig;
use crate::infrastructure::metrics::MetricsRegistry;
use crate::infrastructure::pool::ConnectionPool;
use crate::infrastructure::shutdown::ShutdownSignal;
use crate::port::Backend;

/// Logs progress and collects snapshots while a run is in flight.
pub struct Reporter<B: Backend> {
    pool: Arc<ConnectionPool<B>>,
    metrics: Arc<MetricsRegistry>,
    interval: Duration,
    sub_second_window: Duration,
}

impl<B: Backend> Reporter<B> {
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool<B>>,
        metrics: Arc<MetricsRegistry>,
        config: &ReportingConfig,
    ) -> Self {
        Self {
            pool,
            metrics,
            interval: config.monitor_interval(),
            sub_second_window: config.sub_second_window(),
        }
    }

    /// Run the reporting loop on a background task until `stop` is requested.
    pub fn spawn(self, stop: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(stop).await })
    }

    async fn run(self, stop: ShutdownSignal) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report();
                }
                () = stop.requested() => break,
            }
        }
    }

    /// Log one progress line and record its snapshot.
    pub fn report(&self) -> Snapshot {
        if self.metrics.take_warmup_completion() {
            info!(
                elapsed_s = self.metrics.elapsed().as_secs(),
                transactions = self.metrics.total_transactions(),
                "Warmup completed, measuring from here"
            );
        }

        let delta = self.metrics.interval_stats();
        let snapshot = self.metrics.take_snapshot(self.pool.stats());
        let sub_second_tps = self.metrics.windowed_tps(self.sub_second_window);

        info!(
            phase = if snapshot.is_warmup { "warmup" } else { "measure" },
            elapsed_s = snapshot.elapsed_secs.round() as u64,
            transactions = delta.transactions,
            inserts = delta.inserts,
            selects = delta.selects,
            updates = delta.updates,
            deletes = delta.deletes,
            errors = delta.errors,
            interval_tps = round(delta.tps),
            realtime_tps = round(snapshot.realtime_tps),
            sub_second_tps = round(sub_second_tps),
            avg_tps = round(snapshot.avg_tps),
            p50_ms = round(snapshot.latency_p50_ms),
            p95_ms = round(snapshot.latency_p95_ms),
            p99_ms = round(snapshot.latency_p99_ms),
            pool_active = snapshot.pool.active,
            pool_idle = snapshot.pool.idle,
            pool_total = snapshot.pool.total,
            "Progress"
        );
        snapshot
    }
}

/// Log the end-of-run summary.
pub fn log_final(stats: &FinalStats, pool: &PoolStats) {
    info!(
        elapsed_s = round(stats.elapsed_secs),
        transactions = stats.total_transactions,
        inserts = stats.inserts,
        selects = stats.selects,
        updates = stats.updates,
        deletes = stats.deletes,
        errors = stats.errors,
        verification_failures = stats.verification_failures,
        connection_recreates = stats.connection_recreates,
        success_rate = stats.success_rate().map(round),
        "Run totals"
    );
    info!(
        avg_tps = round(stats.avg_tps),
        post_warmup_transactions = stats.post_warmup_transactions,
        post_warmup_tps = stats.post_warmup_tps.map(round),
        avg_ms = round(stats.latency.avg_ms),
        p50_ms = round(stats.latency.p50_ms),
        p95_ms = round(stats.latency.p95_ms),
        p99_ms = round(stats.latency.p99_ms),
        max_ms = round(stats.latency.max_ms),
        "Throughput and latency"
    );
    if let Some(latency) = &stats.post_warmup_latency {
        info!(
            samples = latency.samples,
            avg_ms = round(latency.avg_ms),
            p95_ms = round(latency.p95_ms),
            p99_ms = round(latency.p99_ms),
            "Post-warmup latency"
        );
    }
    info!(
        created = pool.created,
        recycled = pool.recycled,
        discarded = pool.discarded,
        leak_warnings = pool.leak_warnings,
        close_errors = pool.close_errors,
        "Connection pool totals"
    );
}

/// Two decimal places keep log lines short.
fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::Operation;
    use crate::testkit::{self, MemoryBackend};

    fn reporter(metrics: Arc<MetricsRegistry>) -> Reporter<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        let pool = ConnectionPool::new(backend, testkit::config::pool(1, 2)).unwrap();
        Reporter::new(pool, metrics, &ReportingConfig::default())
    }

    #[test]
    fn round_keeps_two_decimals() {
        assert_eq!(round(1.23456), 1.23);
        assert_eq!(round(0.0), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn report_records_snapshot() {
        let metrics = Arc::new(MetricsRegistry::new());
        let reporter = reporter(Arc::clone(&metrics));

        metrics.record_operation(Operation::Insert, 1);
        metrics.record_transaction(Duration::from_millis(5));
        tokio::time::advance(Duration::from_secs(1)).await;

        let snapshot = reporter.report();
        assert_eq!(snapshot.total_transactions, 1);
        assert_eq!(snapshot.inserts, 1);
        assert!(!snapshot.is_warmup);
        assert_eq!(metrics.snapshots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_until_stopped() {
        let metrics = Arc::new(MetricsRegistry::new());
        let stop = ShutdownSignal::new();
        let handle = reporter(Arc::clone(&metrics)).spawn(stop.clone());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        stop.request();
        handle.await.unwrap();

        assert_eq!(metrics.snapshots().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_completion_is_consumed_once() {
        let metrics = Arc::new(MetricsRegistry::with_warmup(Duration::from_secs(1)));
        let reporter = reporter(Arc::clone(&metrics));

        assert!(reporter.report().is_warmup);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!reporter.report().is_warmup);
        assert!(!metrics.take_warmup_completion());
    }
}
