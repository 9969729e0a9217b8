//! Run orchestration.
//!
//! The [`Orchestrator`] owns one load run from start to finish: it warms up
//! the pool, prepares the schema, staggers worker starts over the ramp-up
//! window, drives the reporter, and tears everything down in order once the
//! deadline passes or shutdown is requested.

mod report;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::app::reporter::{self, Reporter};
use crate::app::worker::{Worker, WorkerConfig, WorkerSummary};
use crate::error::{BackendError, Result};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::limiter::RateLimiter;
use crate::infrastructure::metrics::MetricsRegistry;
use crate::infrastructure::pool::{ConnectionPool, PooledHandle};
use crate::infrastructure::shutdown::ShutdownSignal;
use crate::port::Backend;

pub use report::RunReport;

/// Owner name used for connections the orchestrator itself checks out.
const OWNER: &str = "orchestrator";

/// How long to wait for the reporter task after it was told to stop.
const REPORTER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs one load test against a backend.
pub struct Orchestrator<B: Backend> {
    config: Config,
    backend: Arc<B>,
    shutdown: ShutdownSignal,
}

impl<B: Backend> Orchestrator<B> {
    #[must_use]
    pub fn new(config: Config, backend: Arc<B>) -> Self {
        Self {
            config,
            backend,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Use an externally owned shutdown signal, e.g. one wired to ctrl-c.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// A handle that stops the run when requested.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Execute the run and return its report.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool config is invalid, if no connection can be
    /// obtained for schema preparation, or if writing the JSON report fails.
    /// Failures inside workers are counted, never returned.
    pub async fn run(&self) -> Result<RunReport> {
        let workload = &self.config.workload;
        let started_at = Utc::now();
        info!(
            backend = self.backend.name(),
            mode = %workload.mode,
            threads = workload.threads,
            duration_s = workload.duration_secs,
            warmup_s = workload.warmup_secs,
            ramp_up_s = workload.ramp_up_secs,
            target_tps = workload.target_tps,
            "Starting load test"
        );

        // Pool
        let pool = ConnectionPool::new(Arc::clone(&self.backend), self.config.pool.clone())?;
        let created = pool.warmup().await;
        if created < self.config.pool.min_size {
            warn!(
                created,
                min_size = self.config.pool.min_size,
                "Pool warmup fell short of min_size"
            );
        }

        // Schema and initial row count
        let initial_max_id = match self.prepare(&pool).await {
            Ok(max_id) => max_id,
            Err(e) => {
                pool.close_all().await;
                return Err(e);
            }
        };
        if workload.mode.needs_existing_rows() && initial_max_id == 0 {
            warn!(mode = %workload.mode, "Load table is empty; workers will idle until rows exist");
        }

        // Shared state
        let metrics = Arc::new(MetricsRegistry::with_warmup(workload.warmup()));
        let limiter = Arc::new(RateLimiter::new(workload.target_tps));

        let start = Instant::now();
        let end = start + workload.duration();
        let mut workers = self.spawn_workers(&pool, &metrics, &limiter, start, end, initial_max_id);
        info!(workers = workers.len(), "Workers launched");

        let reporter_stop = ShutdownSignal::new();
        let reporter_task =
            Reporter::new(Arc::clone(&pool), Arc::clone(&metrics), &self.config.reporting)
                .spawn(reporter_stop.clone());

        let (summaries, interrupted) = self.join_workers(&mut workers, end).await;

        // Teardown: reporter, final figures, pool
        reporter_stop.request();
        if tokio::time::timeout(REPORTER_STOP_TIMEOUT, reporter_task)
            .await
            .is_err()
        {
            warn!("Reporter did not stop in time");
        }
        metrics.take_snapshot(pool.stats());
        let stats = metrics.final_stats();
        let pool_stats = pool.stats();
        pool.close_all().await;

        reporter::log_final(&stats, &pool_stats);

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            backend: self.backend.name(),
            mode: workload.mode,
            threads: workload.threads,
            duration_secs: workload.duration_secs,
            warmup_secs: workload.warmup_secs,
            interrupted,
            stats,
            pool: pool_stats,
            snapshots: metrics.snapshots(),
            workers: summaries,
        };

        if let Some(path) = &self.config.reporting.output {
            let format = self.config.reporting.output_format;
            report.write(path, format)?;
            info!(path = %path, format = %format, "Report written");
        }
        Ok(report)
    }

    /// Create the schema, optionally truncate, and probe the highest row id.
    async fn prepare(&self, pool: &ConnectionPool<B>) -> Result<i64> {
        let timeout = self.config.pool.acquire_timeout();
        let mut handle = pool.acquire(OWNER, timeout).await?;

        match self.prepare_with(&mut handle).await {
            Ok(max_id) => {
                pool.release(handle).await;
                info!(max_id, "Load table ready");
                Ok(max_id)
            }
            Err(e) => {
                if let Err(rollback) = self.backend.rollback(handle.conn_mut()).await {
                    debug!(error = %rollback, "Rollback after failed preparation failed");
                }
                pool.discard(handle).await;
                Err(e.into())
            }
        }
    }

    async fn prepare_with(
        &self,
        handle: &mut PooledHandle<B::Connection>,
    ) -> std::result::Result<i64, BackendError> {
        let workload = &self.config.workload;
        let conn = handle.conn_mut();

        if workload.skip_schema_setup {
            debug!("Schema setup skipped");
        } else {
            self.backend.setup_schema(conn).await?;
            self.backend.commit(conn).await?;
        }
        if workload.truncate {
            self.backend.truncate(conn).await?;
            self.backend.commit(conn).await?;
            info!("Load table truncated");
        }

        let max_id = self.backend.max_id(conn).await?;
        self.backend.commit(conn).await?;
        Ok(max_id)
    }

    fn spawn_workers(
        &self,
        pool: &Arc<ConnectionPool<B>>,
        metrics: &Arc<MetricsRegistry>,
        limiter: &Arc<RateLimiter>,
        start: Instant,
        end: Instant,
        initial_max_id: i64,
    ) -> JoinSet<WorkerSummary> {
        let workload = &self.config.workload;
        let threads = workload.threads;
        let ramp_up = workload.ramp_up();
        let mut workers = JoinSet::new();

        for index in 0..threads {
            let mut config = WorkerConfig::new(index + 1, workload.mode, end);
            config.batch_size = workload.batch_size;
            config.acquire_timeout = self.config.pool.acquire_timeout();
            config.error_log_interval = workload.error_log_interval();
            config.seed = workload.seed;
            config.initial_max_id = initial_max_id;
            if !ramp_up.is_zero() && index > 0 {
                config.active_from = Some(start + ramp_up.mul_f64(index as f64 / threads as f64));
            }

            let worker = Worker::new(
                config,
                Arc::clone(pool),
                Arc::clone(metrics),
                Arc::clone(limiter),
                self.shutdown.clone(),
            );
            workers.spawn(worker.run());
        }
        workers
    }

    /// Collect worker summaries, aborting stragglers once the grace period
    /// after the deadline (or after a shutdown request) runs out.
    async fn join_workers(
        &self,
        workers: &mut JoinSet<WorkerSummary>,
        end: Instant,
    ) -> (Vec<WorkerSummary>, bool) {
        let grace = self.config.workload.shutdown_grace();
        let mut deadline = end + grace;
        let mut stop_seen = false;
        let mut interrupted = false;
        let mut summaries = Vec::with_capacity(workers.len());

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(summary)) => summaries.push(summary),
                    Some(Err(e)) => warn!(error = %e, "Worker task failed"),
                    None => break,
                },
                () = self.shutdown.requested(), if !stop_seen => {
                    stop_seen = true;
                    interrupted = Instant::now() < end;
                    if interrupted {
                        info!(remaining = workers.len(), "Shutdown requested, stopping workers");
                    }
                    deadline = deadline.min(Instant::now() + grace);
                }
                () = sleep_until(deadline) => {
                    warn!(remaining = workers.len(), "Workers did not stop in time, aborting");
                    workers.abort_all();
                    while workers.join_next().await.is_some() {}
                    break;
                }
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        (summaries, interrupted)
    }
}
