//! Background health monitor.
//!
//! Every `idle_check_interval` the monitor sweeps the idle queue:
//!
//! - **Expiry**: connections older than `max_lifetime` are recycled and replaced
//! - **Shrink-back**: connections idle past `idle_timeout` are closed while the
//!   pool stays at or above `min_size`
//! - **Keepalive**: connections idle past `keepalive_time` are validated, and
//!   replaced if the check fails
//!
//! It then tops the pool back up to `min_size` and reports checkouts held
//! longer than `leak_detection_threshold`. Leaks are never reclaimed.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::handle::{HandleId, PooledHandle};
use super::state::SharedCounters;
use super::{ConnectionPool, Retire};
use crate::port::Backend;

/// Outcome of one health sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub recycled: usize,
    pub shrunk: usize,
    pub keepalive_checked: usize,
    pub keepalive_failed: usize,
    pub created: usize,
    pub leaks: usize,
}

/// Spawn the monitor task for `pool`.
///
/// The task holds only a weak reference and exits when the pool is dropped
/// or the returned sender signals stop.
pub(super) fn spawn<B: Backend>(
    pool: &Arc<ConnectionPool<B>>,
) -> (watch::Sender<bool>, JoinHandle<()>) {
    let weak: Weak<ConnectionPool<B>> = Arc::downgrade(pool);
    let period = pool.config.idle_check_interval();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_secs = period.as_secs(), "Health monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_rx.changed() => break,
            }
            let Some(pool) = weak.upgrade() else {
                break;
            };
            let report = pool.run_health_check().await;
            if report != HealthReport::default() {
                debug!(
                    recycled = report.recycled,
                    shrunk = report.shrunk,
                    keepalive_checked = report.keepalive_checked,
                    keepalive_failed = report.keepalive_failed,
                    created = report.created,
                    leaks = report.leaks,
                    "Health check completed"
                );
            }
        }

        debug!("Health monitor stopped");
    });

    (stop_tx, task)
}

impl<B: Backend> ConnectionPool<B> {
    /// Run one maintenance sweep immediately.
    ///
    /// The background monitor calls this on every tick; it is public so
    /// callers and tests can force a sweep.
    pub async fn run_health_check(&self) -> HealthReport {
        let mut report = HealthReport::default();
        let now = Instant::now();
        let max_lifetime = self.config.max_lifetime();
        let idle_timeout = self.config.idle_timeout();
        let keepalive = self.config.keepalive_time();

        let mut expired = Vec::new();
        let mut shrunk = Vec::new();
        let mut to_check = Vec::new();
        {
            let mut state = self.state.lock();
            if state.closed {
                return report;
            }
            let idle = std::mem::take(&mut state.idle);
            let mut keep = VecDeque::with_capacity(idle.len());
            for handle in idle {
                if handle.is_expired(max_lifetime, now) {
                    state.free_slot();
                    expired.push(handle);
                } else if idle_timeout.is_some_and(|t| handle.idle_for(now) > t)
                    && state.current_size > self.config.min_size
                {
                    state.free_slot();
                    shrunk.push(handle);
                } else if keepalive.is_some_and(|k| handle.idle_for(now) > k) {
                    to_check.push(handle);
                } else {
                    keep.push_back(handle);
                }
            }
            state.idle = keep;
            self.counters.publish(&state);
        }

        report.recycled = expired.len();
        report.shrunk = shrunk.len();
        for handle in expired {
            SharedCounters::bump(&self.counters.recycled);
            debug!(connection = %handle.id(), "Recycling expired idle connection");
            self.available.notify_one();
            self.close_conn(handle).await;
        }
        for handle in shrunk {
            debug!(connection = %handle.id(), "Closing surplus idle connection");
            self.available.notify_one();
            self.close_conn(handle).await;
        }

        report.keepalive_checked = to_check.len();
        for mut handle in to_check {
            if self.validate(&mut handle).await {
                self.requeue_checked(handle).await;
            } else {
                debug!(connection = %handle.id(), "Keepalive validation failed");
                report.keepalive_failed += 1;
                self.retire(handle, Retire::Invalid).await;
            }
        }

        for _ in 0..report.recycled + report.keepalive_failed {
            if self.replenish().await {
                report.created += 1;
            }
        }
        while self.below_min_size() {
            if !self.replenish().await {
                break;
            }
            report.created += 1;
        }

        report.leaks = self.detect_leaks(Instant::now());
        report
    }

    /// Put a connection that passed keepalive back at the cold end of the
    /// idle queue.
    async fn requeue_checked(&self, mut handle: PooledHandle<B::Connection>) {
        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some(handle)
            } else {
                handle.touch(Instant::now());
                state.idle.push_front(handle);
                self.counters.publish(&state);
                None
            }
        };
        match rejected {
            Some(handle) => self.close_conn(handle).await,
            None => self.available.notify_one(),
        }
    }

    fn below_min_size(&self) -> bool {
        let state = self.state.lock();
        !state.closed && state.current_size < self.config.min_size
    }

    /// Warn once per checkout held past the leak threshold. Returns the
    /// number of warnings issued.
    fn detect_leaks(&self, now: Instant) -> usize {
        let threshold = self.config.leak_detection_threshold();
        if threshold.is_zero() {
            return 0;
        }

        let leaked: Vec<(HandleId, String, u64)> = {
            let state = self.state.lock();
            state
                .in_flight
                .iter()
                .filter(|(_, checkout)| checkout.held_for(now) > threshold)
                .map(|(id, checkout)| {
                    (
                        *id,
                        checkout.acquired_by.clone(),
                        checkout.held_for(now).as_secs(),
                    )
                })
                .collect()
        };

        for (id, owner, held_secs) in &leaked {
            SharedCounters::bump(&self.counters.leak_warnings);
            warn!(
                connection = %id,
                owner = %owner,
                held_secs,
                threshold_secs = threshold.as_secs(),
                "Possible connection leak"
            );
        }
        leaked.len()
    }
}
