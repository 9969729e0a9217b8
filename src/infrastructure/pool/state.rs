//! Connection pool internal state types.
//!
//! `PoolState` is only touched under the pool mutex. `SharedCounters` holds
//! lifetime counters plus lock-free mirrors of the occupancy figures so
//! `stats()` never has to block.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::handle::{Checkout, HandleId, PooledHandle};
use crate::domain::PoolStats;

pub(super) struct PoolState<C> {
    /// Most recently released at the back.
    pub(super) idle: VecDeque<PooledHandle<C>>,
    pub(super) in_flight: HashMap<HandleId, Checkout>,
    /// Live connections plus slots reserved for a creation in progress.
    pub(super) current_size: usize,
    pub(super) active_count: usize,
    pub(super) closed: bool,
}

impl<C> PoolState<C> {
    pub(super) fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            in_flight: HashMap::new(),
            current_size: 0,
            active_count: 0,
            closed: false,
        }
    }

    /// Reserve a slot for a new connection if the pool has room.
    pub(super) fn try_reserve(&mut self, max_size: usize) -> bool {
        if self.closed || self.current_size >= max_size {
            return false;
        }
        self.current_size += 1;
        true
    }

    /// Give a slot back after a destroyed connection or a failed creation.
    ///
    /// After `close_all` sizes are already zeroed and stay that way.
    pub(super) fn free_slot(&mut self) {
        if !self.closed {
            self.current_size = self.current_size.saturating_sub(1);
        }
    }

    /// Drop in-flight tracking for a handle coming back from a caller.
    pub(super) fn check_in(&mut self, id: HandleId) {
        if self.in_flight.remove(&id).is_some() {
            self.active_count = self.active_count.saturating_sub(1);
        }
    }
}

/// Shared counters updated atomically by callers and the health monitor.
#[derive(Debug, Default)]
pub(super) struct SharedCounters {
    pub(super) created: AtomicU64,
    /// Connections destroyed for exceeding their max lifetime.
    pub(super) recycled: AtomicU64,
    pub(super) discarded: AtomicU64,
    pub(super) leak_warnings: AtomicU64,
    pub(super) close_errors: AtomicU64,
    total: AtomicUsize,
    active: AtomicUsize,
    idle: AtomicUsize,
}

impl SharedCounters {
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Refresh the occupancy mirrors from the locked state.
    pub(super) fn publish<C>(&self, state: &PoolState<C>) {
        self.total.store(state.current_size, Ordering::Relaxed);
        self.active.store(state.active_count, Ordering::Relaxed);
        self.idle.store(state.idle.len(), Ordering::Relaxed);
    }

    pub(super) fn snapshot<C>(&self, state: Option<&PoolState<C>>) -> PoolStats {
        let (total, active, idle, stale) = match state {
            Some(state) => (
                state.current_size,
                state.active_count,
                state.idle.len(),
                false,
            ),
            None => (
                self.total.load(Ordering::Relaxed),
                self.active.load(Ordering::Relaxed),
                self.idle.load(Ordering::Relaxed),
                true,
            ),
        };
        PoolStats {
            total,
            active,
            idle,
            created: self.created.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            leak_warnings: self.leak_warnings.load(Ordering::Relaxed),
            close_errors: self.close_errors.load(Ordering::Relaxed),
            stale,
        }
    }
}
