//! Health-checked connection pool.
//!
//! The pool hands out [`PooledHandle`]s wrapping backend connections. It is
//! generic over the [`Backend`] port, so the same pool drives SQLite in
//! production and the in-memory backend in tests.
//!
//! # Lifecycle
//!
//! - [`warmup`](ConnectionPool::warmup) creates `min_size` connections and
//!   starts the health monitor
//! - [`acquire`](ConnectionPool::acquire) prefers the most recently used idle
//!   connection, grows the pool while below `max_size`, and otherwise waits
//!   for a release until the deadline
//! - [`release`](ConnectionPool::release) validates and requeues;
//!   [`discard`](ConnectionPool::discard) always destroys
//! - [`close_all`](ConnectionPool::close_all) stops the monitor and closes
//!   every idle connection
//!
//! # Locking
//!
//! All bookkeeping lives in one `parking_lot::Mutex` that is never held
//! across an `.await`. Connect, validate and close calls run with the lock
//! released. Waiters park on a `tokio::sync::Notify` signalled whenever a
//! connection or a slot frees up.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::PoolStats;
use crate::error::{PoolError, Result};
use crate::infrastructure::backoff::Backoff;
use crate::infrastructure::config::pool::PoolConfig;
use crate::port::Backend;

mod create;
mod handle;
mod health;
mod state;

pub use handle::{HandleId, PooledHandle};
pub use health::HealthReport;

use handle::Checkout;
use state::{PoolState, SharedCounters};

/// Validation failures tolerated by one `acquire` before the final attempt.
pub const ACQUIRE_ATTEMPTS: u32 = 3;

/// How long `close_all` waits for the health monitor to stop.
const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a connection is being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retire {
    Expired,
    Invalid,
    Discarded,
    Shrunk,
}

struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

enum Slot<C> {
    Idle(PooledHandle<C>),
    Reserved,
}

/// Bounded pool of backend connections with health checking, leak detection
/// and lifetime-based recycling.
pub struct ConnectionPool<B: Backend> {
    backend: Arc<B>,
    config: PoolConfig,
    state: Mutex<PoolState<B::Connection>>,
    counters: SharedCounters,
    next_id: AtomicU64,
    available: Notify,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl<B: Backend> ConnectionPool<B> {
    /// Create an empty pool. No connections are opened until
    /// [`warmup`](Self::warmup) or the first [`acquire`](Self::acquire).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - `max_size` is 0
    /// - `min_size` exceeds `max_size`
    /// - `idle_check_interval_secs` or `max_lifetime_secs` is 0
    #[must_use = "returns Result that must be checked"]
    pub fn new(backend: Arc<B>, config: PoolConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            backend,
            config,
            state: Mutex::new(PoolState::new()),
            counters: SharedCounters::default(),
            next_id: AtomicU64::new(0),
            available: Notify::new(),
            monitor: Mutex::new(None),
        }))
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Create up to `min_size` connections and start the health monitor.
    ///
    /// A slot whose creation exhausts its retries is skipped. Returns the
    /// number of connections created.
    pub async fn warmup(self: &Arc<Self>) -> usize {
        let target = self.config.min_size;
        let mut created = 0;
        for _ in 0..target {
            if self.replenish().await {
                created += 1;
            }
        }

        if created < target {
            warn!(
                created,
                min_size = target,
                backend = self.backend.name(),
                "Connection pool warmed up below minimum size"
            );
        } else {
            info!(
                created,
                min_size = target,
                max_size = self.config.max_size,
                "Connection pool warmed up"
            );
        }

        self.start_monitor();
        created
    }

    fn start_monitor(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() || self.state.lock().closed {
            return;
        }
        let (stop, task) = health::spawn(self);
        *monitor = Some(MonitorHandle { stop, task });
    }

    /// Check out a connection for `owner`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Timeout`] if the pool stayed exhausted until the deadline
    /// - [`PoolError::CreationFailed`] if growing the pool failed
    /// - [`PoolError::Unavailable`] if idle connections kept failing validation
    /// - [`PoolError::Closed`] after [`close_all`](Self::close_all)
    pub async fn acquire(
        &self,
        owner: &str,
        timeout: Duration,
    ) -> std::result::Result<PooledHandle<B::Connection>, PoolError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut backoff = Backoff::from_bounds(Backoff::RETRY);
        let mut invalid = 0u32;

        loop {
            let slot = match self.next_slot(deadline).await {
                Ok(slot) => slot,
                Err(PoolError::Timeout { .. }) => {
                    return Err(PoolError::Timeout {
                        waited: started.elapsed(),
                    })
                }
                Err(e) => return Err(e),
            };

            let handle = match slot {
                Slot::Reserved => self.create_reserved().await?,
                Slot::Idle(mut handle) => {
                    if handle.is_expired(self.config.max_lifetime(), Instant::now()) {
                        debug!(connection = %handle.id(), "Recycling expired connection");
                        self.retire(handle, Retire::Expired).await;
                        continue;
                    }
                    if !self.validate(&mut handle).await {
                        debug!(connection = %handle.id(), "Idle connection failed validation");
                        self.retire(handle, Retire::Invalid).await;
                        invalid += 1;
                        if invalid > ACQUIRE_ATTEMPTS {
                            return Err(PoolError::Unavailable { attempts: invalid });
                        }
                        if invalid < ACQUIRE_ATTEMPTS {
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            tokio::time::sleep(backoff.next_delay().min(remaining)).await;
                        }
                        continue;
                    }
                    handle
                }
            };

            return match self.check_out(handle, owner) {
                Ok(handle) => Ok(handle),
                Err(handle) => {
                    self.close_conn(handle).await;
                    Err(PoolError::Closed)
                }
            };
        }
    }

    /// Take an idle connection or reserve a slot, waiting for one to free up
    /// until `deadline`.
    async fn next_slot(
        &self,
        deadline: Instant,
    ) -> std::result::Result<Slot<B::Connection>, PoolError> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(slot) = self.try_slot()? {
                return Ok(slot);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PoolError::Timeout { waited: remaining });
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Err(PoolError::Timeout { waited: remaining });
            }
        }
    }

    fn try_slot(&self) -> std::result::Result<Option<Slot<B::Connection>>, PoolError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if let Some(handle) = state.idle.pop_back() {
            self.counters.publish(&state);
            return Ok(Some(Slot::Idle(handle)));
        }
        if state.try_reserve(self.config.max_size) {
            self.counters.publish(&state);
            return Ok(Some(Slot::Reserved));
        }
        Ok(None)
    }

    fn check_out(
        &self,
        mut handle: PooledHandle<B::Connection>,
        owner: &str,
    ) -> std::result::Result<PooledHandle<B::Connection>, PooledHandle<B::Connection>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(handle);
        }
        let now = Instant::now();
        handle.mark_acquired(owner, now);
        state.in_flight.insert(
            handle.id(),
            Checkout {
                acquired_at: now,
                acquired_by: owner.to_string(),
            },
        );
        state.active_count += 1;
        self.counters.publish(&state);
        Ok(handle)
    }

    /// Return a connection to the pool.
    ///
    /// Expired connections are recycled and replaced; others are validated
    /// and requeued if there is room.
    pub async fn release(&self, mut handle: PooledHandle<B::Connection>) {
        let closed = {
            let mut state = self.state.lock();
            state.check_in(handle.id());
            self.counters.publish(&state);
            state.closed
        };
        if closed {
            self.close_conn(handle).await;
            return;
        }

        if handle.is_expired(self.config.max_lifetime(), Instant::now()) {
            debug!(connection = %handle.id(), "Recycling expired connection on release");
            self.retire(handle, Retire::Expired).await;
            self.replenish().await;
            return;
        }

        if !self.validate(&mut handle).await {
            debug!(connection = %handle.id(), "Released connection failed validation");
            self.retire(handle, Retire::Invalid).await;
            return;
        }

        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some((handle, true))
            } else if state.idle.len() >= self.config.max_size {
                Some((handle, false))
            } else {
                handle.mark_released(Instant::now());
                state.idle.push_back(handle);
                self.counters.publish(&state);
                None
            }
        };

        match rejected {
            None => self.available.notify_one(),
            Some((handle, true)) => self.close_conn(handle).await,
            Some((handle, false)) => self.retire(handle, Retire::Shrunk).await,
        }
    }

    /// Destroy a connection the caller no longer trusts.
    pub async fn discard(&self, handle: PooledHandle<B::Connection>) {
        let closed = {
            let mut state = self.state.lock();
            state.check_in(handle.id());
            self.counters.publish(&state);
            state.closed
        };
        if closed {
            self.close_conn(handle).await;
        } else {
            debug!(connection = %handle.id(), "Discarding connection");
            self.retire(handle, Retire::Discarded).await;
        }
    }

    /// Stop the health monitor and close every idle connection.
    ///
    /// Connections still held by callers are closed when they come back.
    pub async fn close_all(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(MonitorHandle { stop, mut task }) = monitor {
            let _ = stop.send(true);
            if tokio::time::timeout(MONITOR_STOP_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }

        let (idle, outstanding) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle: Vec<_> = state.idle.drain(..).collect();
            let outstanding = state.in_flight.len();
            state.in_flight.clear();
            state.active_count = 0;
            state.current_size = 0;
            self.counters.publish(&state);
            (idle, outstanding)
        };
        self.available.notify_waiters();

        let closing = idle.len();
        for handle in idle {
            self.close_conn(handle).await;
        }
        info!(closed = closing, outstanding, "Connection pool closed");
    }

    /// Current occupancy and lifetime counters.
    ///
    /// Never blocks: under lock contention the figures come from atomic
    /// mirrors and `stale` is set.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        match self.state.try_lock() {
            Some(state) => self.counters.snapshot(Some(&*state)),
            None => self.counters.snapshot::<B::Connection>(None),
        }
    }

    /// Check a connection with the configured validation timeout.
    pub async fn validate(&self, handle: &mut PooledHandle<B::Connection>) -> bool {
        let timeout = self.config.validation_timeout();
        tokio::time::timeout(timeout, self.backend.validate(handle.conn_mut(), timeout))
            .await
            .unwrap_or(false)
    }

    /// Free the handle's slot, count the reason and close the connection.
    async fn retire(&self, handle: PooledHandle<B::Connection>, reason: Retire) {
        {
            let mut state = self.state.lock();
            state.free_slot();
            self.counters.publish(&state);
        }
        match reason {
            Retire::Expired => SharedCounters::bump(&self.counters.recycled),
            Retire::Discarded => SharedCounters::bump(&self.counters.discarded),
            Retire::Invalid | Retire::Shrunk => {}
        }
        self.available.notify_one();
        self.close_conn(handle).await;
    }

    /// Close a connection whose slot has already been accounted for.
    pub(super) async fn close_conn(&self, handle: PooledHandle<B::Connection>) {
        let id = handle.id();
        if let Err(e) = self.backend.close(handle.into_conn()).await {
            SharedCounters::bump(&self.counters.close_errors);
            debug!(connection = %id, error = %e, "Error closing connection");
        }
    }
}

impl<B: Backend> Drop for ConnectionPool<B> {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.get_mut().take() {
            monitor.task.abort();
        }
    }
}

#[cfg(test)]
mod tests;
