//! Workload operations.
//!
//! Each operation runs inside the held connection's transaction and commits
//! on success. Counters and latency are recorded only after the commit.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::time::Instant;

use super::Worker;
use crate::domain::{Operation, WorkloadMode};
use crate::error::BackendError;
use crate::port::Backend;

/// Characters of random payload per inserted row.
pub const PAYLOAD_LEN: usize = 500;

/// Result of one workload iteration.
#[derive(Debug)]
pub(super) enum Outcome {
    Committed,
    /// Nothing to do (no candidate row).
    Skipped,
    /// The full-cycle read-back did not match what was inserted.
    VerificationFailed { id: i64 },
    Failed {
        op: &'static str,
        error: BackendError,
    },
}

macro_rules! attempt {
    ($op:expr, $call:expr) => {
        match $call.await {
            Ok(value) => value,
            Err(error) => return Outcome::Failed { op: $op, error },
        }
    };
}

impl<B: Backend> Worker<B> {
    pub(super) async fn execute(&mut self, conn: &mut B::Connection) -> Outcome {
        match self.config.mode {
            WorkloadMode::Full => self.full_cycle(conn).await,
            WorkloadMode::InsertOnly => self.insert(conn).await,
            WorkloadMode::SelectOnly => self.select(conn).await,
            WorkloadMode::UpdateOnly => self.update(conn).await,
            WorkloadMode::DeleteOnly => self.delete(conn).await,
            WorkloadMode::Mixed => {
                let draw: f64 = self.rng.gen();
                match self.config.mix.pick(draw) {
                    Operation::Insert => self.insert(conn).await,
                    Operation::Select => self.select(conn).await,
                    Operation::Update => self.update(conn).await,
                    Operation::Delete => self.delete(conn).await,
                }
            }
        }
    }

    fn payload(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(PAYLOAD_LEN)
            .map(char::from)
            .collect()
    }

    fn random_id(&mut self) -> Option<i64> {
        (self.max_id > 0).then(|| self.rng.gen_range(1..=self.max_id))
    }

    async fn insert(&mut self, conn: &mut B::Connection) -> Outcome {
        let started = Instant::now();
        let mut inserted_id = None;
        let inserted = if self.config.batch_size > 1 {
            attempt!(
                "batch insert",
                self.backend
                    .batch_insert(conn, &self.name, self.config.batch_size)
            )
        } else {
            let payload = self.payload();
            let id = attempt!("insert", self.backend.insert(conn, &self.name, &payload));
            inserted_id = Some(id);
            1
        };
        attempt!("commit", self.backend.commit(conn));
        if let Some(id) = inserted_id {
            self.max_id = self.max_id.max(id);
        }

        self.metrics.record_operation(Operation::Insert, inserted);
        self.metrics.record_transaction(started.elapsed());
        Outcome::Committed
    }

    async fn select(&mut self, conn: &mut B::Connection) -> Outcome {
        let started = Instant::now();
        if self.max_id <= 0 {
            return Outcome::Skipped;
        }
        attempt!("select", self.backend.random_select(conn, self.max_id));
        attempt!("commit", self.backend.commit(conn));

        self.metrics.record_operation(Operation::Select, 1);
        self.metrics.record_transaction(started.elapsed());
        Outcome::Committed
    }

    async fn update(&mut self, conn: &mut B::Connection) -> Outcome {
        let started = Instant::now();
        let Some(id) = self.random_id() else {
            return Outcome::Skipped;
        };
        attempt!("update", self.backend.update(conn, id));
        attempt!("commit", self.backend.commit(conn));

        self.metrics.record_operation(Operation::Update, 1);
        self.metrics.record_transaction(started.elapsed());
        Outcome::Committed
    }

    async fn delete(&mut self, conn: &mut B::Connection) -> Outcome {
        let started = Instant::now();
        let Some(id) = self.random_id() else {
            return Outcome::Skipped;
        };
        attempt!("delete", self.backend.delete(conn, id));
        attempt!("commit", self.backend.commit(conn));

        self.metrics.record_operation(Operation::Delete, 1);
        self.metrics.record_transaction(started.elapsed());
        Outcome::Committed
    }

    /// Insert, commit, read back and verify, update, delete.
    async fn full_cycle(&mut self, conn: &mut B::Connection) -> Outcome {
        let started = Instant::now();
        let payload = self.payload();

        let id = attempt!("insert", self.backend.insert(conn, &self.name, &payload));
        attempt!("commit", self.backend.commit(conn));
        self.metrics.record_operation(Operation::Insert, 1);

        let row = attempt!("select", self.backend.select(conn, id));
        self.metrics.record_operation(Operation::Select, 1);
        match row {
            Some(row) if row.id == id && row.payload == payload => {}
            _ => {
                attempt!("commit", self.backend.commit(conn));
                return Outcome::VerificationFailed { id };
            }
        }

        attempt!("update", self.backend.update(conn, id));
        attempt!("commit", self.backend.commit(conn));
        self.metrics.record_operation(Operation::Update, 1);

        attempt!("delete", self.backend.delete(conn, id));
        attempt!("commit", self.backend.commit(conn));
        self.metrics.record_operation(Operation::Delete, 1);

        self.metrics.record_transaction(started.elapsed());
        Outcome::Committed
    }
}
