//! Scriptable in-memory [`Backend`].
//!
//! Rows live in a shared `BTreeMap`; writes are visible immediately and
//! `rollback` only counts. Failures are injected through the `fail_*` and
//! `invalidate_*` knobs so pool and worker recovery paths can be driven
//! deterministically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use crate::domain::Row;
use crate::error::BackendError;
use crate::port::outbound::backend::{Backend, BackendResult};

/// A connection to the in-memory table.
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    generation: u64,
}

impl MemoryConnection {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// In-memory backend with failure injection and call counters.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Mutex<BTreeMap<i64, Row>>,
    next_row_id: AtomicU64,
    next_conn_id: AtomicU64,
    /// Connections created before this generation fail validation.
    generation: AtomicU64,
    op_latency: Mutex<Duration>,
    connect_latency: Mutex<Duration>,

    fail_connects_remaining: AtomicUsize,
    fail_all_connects: AtomicBool,
    fail_ops_remaining: AtomicUsize,
    fail_all_ops: AtomicBool,
    fail_validation: AtomicBool,
    fail_close: AtomicBool,
    corrupt_reads: AtomicBool,

    connects: AtomicUsize,
    connect_failures: AtomicUsize,
    validations: AtomicUsize,
    closes: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    op_calls: AtomicUsize,
    max_id_calls: AtomicUsize,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `count` rows.
    #[must_use]
    pub fn with_rows(self, count: usize) -> Self {
        {
            let mut rows = self.rows.lock();
            for _ in 0..count {
                let id = self.next_row_id.fetch_add(1, Ordering::Relaxed) as i64 + 1;
                rows.insert(
                    id,
                    Row {
                        id,
                        worker: "seed".into(),
                        payload: "seed".into(),
                    },
                );
            }
        }
        self
    }

    /// Every data operation sleeps this long first.
    #[must_use]
    pub fn with_op_latency(self, latency: Duration) -> Self {
        *self.op_latency.lock() = latency;
        self
    }

    #[must_use]
    pub fn with_connect_latency(self, latency: Duration) -> Self {
        *self.connect_latency.lock() = latency;
        self
    }

    // -- Failure injection --------------------------------------------------

    pub fn fail_next_connects(&self, count: usize) {
        self.fail_connects_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_connects_failing(&self, failing: bool) {
        self.fail_all_connects.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next_ops(&self, count: usize) {
        self.fail_ops_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_ops_failing(&self, failing: bool) {
        self.fail_all_ops.store(failing, Ordering::SeqCst);
    }

    pub fn set_validation_failing(&self, failing: bool) {
        self.fail_validation.store(failing, Ordering::SeqCst);
    }

    /// Make every connection opened so far fail validation.
    pub fn invalidate_existing(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_close_failing(&self, failing: bool) {
        self.fail_close.store(failing, Ordering::SeqCst);
    }

    /// Point reads return a row with a different id.
    pub fn set_corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    // -- Observation --------------------------------------------------------

    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn connect_failures(&self) -> usize {
        self.connect_failures.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.connects().saturating_sub(self.closes())
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn op_calls(&self) -> usize {
        self.op_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn max_id_calls(&self) -> usize {
        self.max_id_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn begin_op(&self) -> BackendResult<()> {
        self.op_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.op_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_all_ops.load(Ordering::SeqCst) || Self::take_one(&self.fail_ops_remaining) {
            return Err(BackendError::Query("injected failure".into()));
        }
        Ok(())
    }

    fn insert_row(&self, worker: &str, payload: &str) -> i64 {
        let id = self.next_row_id.fetch_add(1, Ordering::Relaxed) as i64 + 1;
        self.rows.lock().insert(
            id,
            Row {
                id,
                worker: worker.to_string(),
                payload: payload.to_string(),
            },
        );
        id
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn ddl(&self) -> &'static str {
        "-- in-memory table, no DDL"
    }

    async fn connect(&self) -> BackendResult<MemoryConnection> {
        let latency = *self.connect_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_all_connects.load(Ordering::SeqCst)
            || Self::take_one(&self.fail_connects_remaining)
        {
            self.connect_failures.fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::Connect("injected connect failure".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            id: self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1,
            generation: self.generation.load(Ordering::SeqCst),
        })
    }

    async fn validate(&self, conn: &mut MemoryConnection, _timeout: Duration) -> bool {
        self.validations.fetch_add(1, Ordering::SeqCst);
        !self.fail_validation.load(Ordering::SeqCst)
            && conn.generation >= self.generation.load(Ordering::SeqCst)
    }

    async fn close(&self, _conn: MemoryConnection) -> BackendResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BackendError::Connect("injected close failure".into()));
        }
        Ok(())
    }

    async fn insert(
        &self,
        _conn: &mut MemoryConnection,
        worker: &str,
        payload: &str,
    ) -> BackendResult<i64> {
        self.begin_op().await?;
        Ok(self.insert_row(worker, payload))
    }

    async fn batch_insert(
        &self,
        _conn: &mut MemoryConnection,
        worker: &str,
        count: usize,
    ) -> BackendResult<u64> {
        self.begin_op().await?;
        for _ in 0..count {
            self.insert_row(worker, "batch");
        }
        Ok(count as u64)
    }

    async fn select(&self, _conn: &mut MemoryConnection, id: i64) -> BackendResult<Option<Row>> {
        self.begin_op().await?;
        let row = self.rows.lock().get(&id).cloned();
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Ok(row.map(|r| Row { id: r.id + 1, ..r }));
        }
        Ok(row)
    }

    async fn random_select(
        &self,
        _conn: &mut MemoryConnection,
        max_id: i64,
    ) -> BackendResult<Option<Row>> {
        self.begin_op().await?;
        if max_id <= 0 {
            return Ok(None);
        }
        let id = rand::thread_rng().gen_range(1..=max_id);
        Ok(self.rows.lock().get(&id).cloned())
    }

    async fn update(&self, _conn: &mut MemoryConnection, id: i64) -> BackendResult<bool> {
        self.begin_op().await?;
        let mut rows = self.rows.lock();
        Ok(match rows.get_mut(&id) {
            Some(row) => {
                row.payload = "updated".into();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, _conn: &mut MemoryConnection, id: i64) -> BackendResult<bool> {
        self.begin_op().await?;
        Ok(self.rows.lock().remove(&id).is_some())
    }

    async fn max_id(&self, _conn: &mut MemoryConnection) -> BackendResult<i64> {
        self.max_id_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_op().await?;
        Ok(self.rows.lock().keys().next_back().copied().unwrap_or(0))
    }

    async fn commit(&self, _conn: &mut MemoryConnection) -> BackendResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _conn: &mut MemoryConnection) -> BackendResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn setup_schema(&self, _conn: &mut MemoryConnection) -> BackendResult<()> {
        Ok(())
    }

    async fn truncate(&self, _conn: &mut MemoryConnection) -> BackendResult<()> {
        self.rows.lock().clear();
        Ok(())
    }
}
