//! Pooled connection handle and checkout metadata.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Pool-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(super) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A physical connection owned by the pool or by exactly one caller.
///
/// Handles are not `Clone`: ownership moves from the idle queue to the
/// caller on acquire and back on release or discard.
#[derive(Debug)]
pub struct PooledHandle<C> {
    id: HandleId,
    conn: C,
    created_at: Instant,
    acquired_at: Option<Instant>,
    acquired_by: Option<String>,
    last_used_at: Instant,
}

impl<C> PooledHandle<C> {
    pub(super) fn new(id: HandleId, conn: C, now: Instant) -> Self {
        Self {
            id,
            conn,
            created_at: now,
            acquired_at: None,
            acquired_by: None,
            last_used_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The underlying connection, for passing to the backend.
    pub fn conn_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn acquired_at(&self) -> Option<Instant> {
        self.acquired_at
    }

    #[must_use]
    pub fn acquired_by(&self) -> Option<&str> {
        self.acquired_by.as_deref()
    }

    #[must_use]
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at)
    }

    #[must_use]
    pub fn is_expired(&self, max_lifetime: Duration, now: Instant) -> bool {
        self.age(now) > max_lifetime
    }

    pub(super) fn mark_acquired(&mut self, owner: &str, now: Instant) {
        self.acquired_at = Some(now);
        self.acquired_by = Some(owner.to_string());
        self.last_used_at = now;
    }

    pub(super) fn mark_released(&mut self, now: Instant) {
        self.acquired_at = None;
        self.acquired_by = None;
        self.last_used_at = now;
    }

    pub(super) fn touch(&mut self, now: Instant) {
        self.last_used_at = now;
    }

    pub(super) fn into_conn(self) -> C {
        self.conn
    }
}

/// In-flight bookkeeping for a checked-out handle.
///
/// The caller owns the connection; the pool keeps only what leak detection
/// needs.
#[derive(Debug, Clone)]
pub(super) struct Checkout {
    pub(super) acquired_at: Instant,
    pub(super) acquired_by: String,
}

impl Checkout {
    pub(super) fn held_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.acquired_at)
    }
}
