//! Connection creation with bounded retries.

use std::sync::atomic::Ordering;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::handle::{HandleId, PooledHandle};
use super::state::SharedCounters;
use super::ConnectionPool;
use crate::error::{BackendError, PoolError};
use crate::infrastructure::backoff::Backoff;
use crate::port::Backend;

/// Connect attempts per creation before giving up.
pub(super) const CREATE_ATTEMPTS: u32 = 3;

impl<B: Backend> ConnectionPool<B> {
    /// Open one physical connection, retrying with backoff.
    ///
    /// The caller must already hold a reserved slot.
    pub(super) async fn open_with_backoff(
        &self,
    ) -> Result<PooledHandle<B::Connection>, PoolError> {
        let connect_timeout = self.config.connect_timeout();
        let mut backoff = Backoff::from_bounds(Backoff::CREATE);
        let mut last_error = BackendError::Closed;

        for attempt in 1..=CREATE_ATTEMPTS {
            let result = tokio::time::timeout(connect_timeout, self.backend.connect()).await;
            match result {
                Ok(Ok(conn)) => {
                    let id = HandleId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                    SharedCounters::bump(&self.counters.created);
                    debug!(connection = %id, attempt, "Connection created");
                    return Ok(PooledHandle::new(id, conn, Instant::now()));
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = BackendError::Timeout(connect_timeout),
            }

            if attempt < CREATE_ATTEMPTS {
                let delay = backoff.next_delay();
                debug!(
                    attempt,
                    error = %last_error,
                    retry_in_ms = delay.as_millis() as u64,
                    "Connection attempt failed"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            attempts = CREATE_ATTEMPTS,
            error = %last_error,
            backend = self.backend.name(),
            "Failed to create connection"
        );
        Err(PoolError::CreationFailed {
            attempts: CREATE_ATTEMPTS,
            source: last_error,
        })
    }

    /// Create a connection into an already reserved slot, releasing the slot
    /// on failure.
    pub(super) async fn create_reserved(
        &self,
    ) -> Result<PooledHandle<B::Connection>, PoolError> {
        match self.open_with_backoff().await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.release_slot();
                Err(e)
            }
        }
    }

    /// Add one idle connection if the pool has room.
    ///
    /// Returns `false` when no slot was free or creation failed.
    pub(super) async fn replenish(&self) -> bool {
        if !self.reserve_slot() {
            return false;
        }
        let Ok(mut handle) = self.create_reserved().await else {
            return false;
        };

        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some(handle)
            } else {
                handle.touch(Instant::now());
                state.idle.push_back(handle);
                self.counters.publish(&state);
                None
            }
        };

        match rejected {
            Some(handle) => {
                self.close_conn(handle).await;
                false
            }
            None => {
                self.available.notify_one();
                true
            }
        }
    }

    fn reserve_slot(&self) -> bool {
        let mut state = self.state.lock();
        let reserved = state.try_reserve(self.config.max_size);
        if reserved {
            self.counters.publish(&state);
        }
        reserved
    }

    pub(super) fn release_slot(&self) {
        {
            let mut state = self.state.lock();
            state.free_slot();
            self.counters.publish(&state);
        }
        self.available.notify_one();
    }
}
