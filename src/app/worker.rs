//! Load worker.
//!
//! A worker holds one pooled connection across iterations, validating it
//! before every transaction and replacing it after repeated failures. Each
//! iteration is gated by the shared [`RateLimiter`] and stops at the run
//! deadline or when shutdown is requested.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{MixWeights, WorkloadMode};
use crate::error::BackendError;
use crate::infrastructure::backoff::Backoff;
use crate::infrastructure::limiter::RateLimiter;
use crate::infrastructure::metrics::MetricsRegistry;
use crate::infrastructure::pool::{ConnectionPool, PooledHandle};
use crate::infrastructure::shutdown::ShutdownSignal;
use crate::port::Backend;

mod operations;
mod throttle;


pub use operations::PAYLOAD_LEN;
pub use throttle::ErrorLogThrottle;

use operations::Outcome;

/// Consecutive failed iterations before the held connection is replaced.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Transactions between refreshes of the cached highest row id.
const MAX_ID_REFRESH_EVERY: u64 = 100;

/// Pause when the table has no rows to read or modify.
const EMPTY_TABLE_PAUSE: Duration = Duration::from_secs(1);

/// Minimum spacing of "waiting for a connection" lines.
const ACQUIRE_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Per-worker settings derived from the run configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub id: usize,
    pub mode: WorkloadMode,
    pub batch_size: usize,
    pub mix: MixWeights,
    /// Run deadline.
    pub end: Instant,
    /// Ramp-up start; the worker idles until then.
    pub active_from: Option<Instant>,
    pub acquire_timeout: Duration,
    /// Longest wait for a rate limiter token before re-checking the deadline.
    pub rate_limit_wait: Duration,
    /// Pool acquire attempts per iteration.
    pub acquire_retries: u32,
    pub error_log_interval: Duration,
    pub seed: Option<u64>,
    /// Highest row id known when the run started.
    pub initial_max_id: i64,
}

impl WorkerConfig {
    #[must_use]
    pub fn new(id: usize, mode: WorkloadMode, end: Instant) -> Self {
        Self {
            id,
            mode,
            batch_size: 1,
            mix: MixWeights::DEFAULT,
            end,
            active_from: None,
            acquire_timeout: Duration::from_secs(30),
            rate_limit_wait: Duration::from_millis(500),
            acquire_retries: 3,
            error_log_interval: Duration::from_secs(10),
            seed: None,
            initial_max_id: 0,
        }
    }

    /// Display name, e.g. `Worker-0007`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("Worker-{:04}", self.id)
    }

    /// Whether the worker is still waiting for its ramp-up slot at `now`.
    #[must_use]
    pub fn is_ramping(&self, now: Instant) -> bool {
        self.active_from.is_some_and(|at| now < at)
    }
}

/// Per-worker totals returned when a worker exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub name: String,
    pub transactions: u64,
    pub errors: u64,
    pub verification_failures: u64,
    pub connection_recreates: u64,
}

/// Drives one connection through the configured workload.
pub struct Worker<B: Backend> {
    config: WorkerConfig,
    name: String,
    pool: Arc<ConnectionPool<B>>,
    backend: Arc<B>,
    metrics: Arc<MetricsRegistry>,
    limiter: Arc<RateLimiter>,
    shutdown: ShutdownSignal,
    rng: StdRng,
    max_id: i64,
    /// Transaction count at the last max-id refresh.
    refreshed_at: u64,
    throttle: ErrorLogThrottle,
    last_acquire_log: Option<Instant>,
    summary: WorkerSummary,
}

impl<B: Backend> Worker<B> {
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        pool: Arc<ConnectionPool<B>>,
        metrics: Arc<MetricsRegistry>,
        limiter: Arc<RateLimiter>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let name = config.name();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(config.id as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            backend: Arc::clone(pool.backend()),
            max_id: config.initial_max_id,
            refreshed_at: 0,
            throttle: ErrorLogThrottle::new(config.error_log_interval),
            last_acquire_log: None,
            summary: WorkerSummary {
                name: name.clone(),
                ..WorkerSummary::default()
            },
            name,
            config,
            pool,
            metrics,
            limiter,
            shutdown,
            rng,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until the deadline or shutdown and return this worker's totals.
    pub async fn run(mut self) -> WorkerSummary {
        if let Some(active_from) = self.config.active_from {
            let wait = active_from.saturating_duration_since(Instant::now());
            if !wait.is_zero() && !self.shutdown.sleep(wait).await {
                return self.summary;
            }
        }
        debug!(worker = %self.name, mode = %self.config.mode, "Worker started");

        let mut held: Option<PooledHandle<B::Connection>> = None;
        let mut consecutive_failures = 0u32;
        let mut backoff = Backoff::from_bounds(Backoff::RETRY);

        while self.should_continue() {
            if self.limiter.is_enabled() {
                let wait = self
                    .config
                    .rate_limit_wait
                    .min(self.config.end.saturating_duration_since(Instant::now()));
                if !self.limiter.acquire(wait).await {
                    continue;
                }
            }

            if let Some(mut handle) = held.take() {
                if self.pool.validate(&mut handle).await {
                    held = Some(handle);
                } else {
                    debug!(worker = %self.name, conn = %handle.id(), "Held connection invalid, replacing");
                    self.pool.discard(handle).await;
                    self.metrics.record_connection_recreate();
                    self.summary.connection_recreates += 1;
                }
            }

            let mut handle = match held.take() {
                Some(handle) => handle,
                None => match self.acquire_with_retry().await {
                    Some(handle) => handle,
                    None if self.pool.is_closed() => break,
                    None => {
                        consecutive_failures += 1;
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            consecutive_failures = 0;
                            self.shutdown.sleep(backoff.next_delay()).await;
                        }
                        continue;
                    }
                },
            };

            if self.needs_max_id() {
                self.refresh_max_id(handle.conn_mut()).await;
            }
            if self.config.mode.needs_existing_rows() && self.max_id == 0 {
                held = Some(handle);
                self.shutdown.sleep(EMPTY_TABLE_PAUSE).await;
                continue;
            }

            match self.execute(handle.conn_mut()).await {
                Outcome::Committed => {
                    consecutive_failures = 0;
                    backoff.reset();
                    self.summary.transactions += 1;
                    held = Some(handle);
                }
                Outcome::Skipped => held = Some(handle),
                Outcome::VerificationFailed { id } => {
                    self.metrics.record_verification_failure();
                    self.summary.verification_failures += 1;
                    warn!(worker = %self.name, id, "Read-back verification failed");
                    held = Some(handle);
                }
                Outcome::Failed { op, error } => {
                    if let Err(rollback) = self.backend.rollback(handle.conn_mut()).await {
                        debug!(worker = %self.name, error = %rollback, "Rollback failed");
                    }
                    self.metrics.record_error();
                    self.summary.errors += 1;
                    consecutive_failures += 1;
                    self.log_failure(op, &error);

                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        info!(
                            worker = %self.name,
                            failures = consecutive_failures,
                            "Replacing connection after consecutive failures"
                        );
                        self.pool.discard(handle).await;
                        self.metrics.record_connection_recreate();
                        self.summary.connection_recreates += 1;
                        consecutive_failures = 0;
                        self.shutdown.sleep(backoff.next_delay()).await;
                    } else {
                        held = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = held {
            self.pool.release(handle).await;
        }
        debug!(
            worker = %self.name,
            transactions = self.summary.transactions,
            errors = self.summary.errors,
            "Worker stopped"
        );
        self.summary
    }

    fn should_continue(&self) -> bool {
        !self.shutdown.is_requested() && Instant::now() < self.config.end
    }

    fn needs_max_id(&self) -> bool {
        if !self.config.mode.tracks_max_id() {
            return false;
        }
        let since = self.summary.transactions.saturating_sub(self.refreshed_at);
        self.max_id == 0 || since >= MAX_ID_REFRESH_EVERY
    }

    /// Re-read the highest row id and end the transaction the read opened.
    async fn refresh_max_id(&mut self, conn: &mut B::Connection) {
        self.refreshed_at = self.summary.transactions;
        let refreshed = match self.backend.max_id(conn).await {
            Ok(max_id) => self.backend.commit(conn).await.map(|()| max_id),
            Err(error) => Err(error),
        };
        match refreshed {
            Ok(max_id) => self.max_id = max_id,
            Err(error) => {
                if let Err(rollback) = self.backend.rollback(conn).await {
                    debug!(worker = %self.name, error = %rollback, "Rollback failed");
                }
                self.metrics.record_error();
                self.summary.errors += 1;
                self.log_failure("max id", &error);
            }
        }
    }

    async fn acquire_with_retry(&mut self) -> Option<PooledHandle<B::Connection>> {
        let mut backoff = Backoff::from_bounds(Backoff::RETRY);

        for attempt in 1..=self.config.acquire_retries.max(1) {
            if !self.should_continue() {
                return None;
            }
            match self
                .pool
                .acquire(&self.name, self.config.acquire_timeout)
                .await
            {
                Ok(handle) => return Some(handle),
                Err(error) => {
                    let now = Instant::now();
                    let due = self
                        .last_acquire_log
                        .map_or(true, |at| now - at >= ACQUIRE_LOG_INTERVAL);
                    if due {
                        self.last_acquire_log = Some(now);
                        warn!(worker = %self.name, attempt, error = %error, "Waiting for a connection");
                    }
                    if self.pool.is_closed() {
                        return None;
                    }
                    if attempt < self.config.acquire_retries
                        && !self.shutdown.sleep(backoff.next_delay()).await
                    {
                        return None;
                    }
                }
            }
        }

        self.metrics.record_error();
        self.summary.errors += 1;
        None
    }

    fn log_failure(&mut self, op: &'static str, error: &BackendError) {
        match self.throttle.admit(Instant::now()) {
            Some(0) => warn!(worker = %self.name, op, error = %error, "Transaction failed"),
            Some(suppressed) => warn!(
                worker = %self.name,
                op,
                error = %error,
                suppressed,
                "Transaction failed"
            ),
            None => debug!(worker = %self.name, op, error = %error, "Transaction failed"),
        }
    }
}
