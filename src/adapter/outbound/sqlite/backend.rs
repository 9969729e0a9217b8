//! SQLite implementation of the [`Backend`] port.
//!
//! Every call runs the synchronous Diesel connection on Tokio's blocking
//! pool. The connection lives behind an `Arc<Mutex<_>>` only so it can move
//! into the blocking closure; the pool guarantees one user at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::database::connection::{Session, DDL};
use super::database::model::{LastInsertRowId, LoadRow, NewLoadRow};
use super::database::schema::load_test;
use crate::domain::Row;
use crate::error::BackendError;
use crate::infrastructure::config::database::DatabaseConfig;
use crate::port::outbound::backend::{Backend, BackendResult};

/// Characters of random payload written by batch inserts.
const BATCH_PAYLOAD_LEN: usize = 500;

/// A pooled SQLite connection.
pub struct SqliteConn {
    session: Arc<Mutex<Session>>,
}

/// SQLite load target.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: String,
    busy_timeout: Duration,
}

impl SqliteBackend {
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn query_error(e: diesel::result::Error) -> BackendError {
    BackendError::Query(e.to_string())
}

/// Run `f` against the connection on the blocking pool.
async fn blocking<T, F>(conn: &SqliteConn, f: F) -> BackendResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> BackendResult<T> + Send + 'static,
{
    let session = Arc::clone(&conn.session);
    tokio::task::spawn_blocking(move || f(&mut session.lock()))
        .await
        .map_err(|e| BackendError::Query(format!("blocking task failed: {e}")))?
}

fn find(conn: &mut SqliteConnection, id: i64) -> BackendResult<Option<Row>> {
    load_test::table
        .find(id)
        .select(LoadRow::as_select())
        .first(conn)
        .optional()
        .map(|row| row.map(Row::from))
        .map_err(query_error)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl Backend for SqliteBackend {
    type Connection = SqliteConn;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ddl(&self) -> &'static str {
        DDL
    }

    async fn connect(&self) -> BackendResult<SqliteConn> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let session = tokio::task::spawn_blocking(move || Session::open(&path, busy_timeout))
            .await
            .map_err(|e| BackendError::Connect(format!("blocking task failed: {e}")))??;
        Ok(SqliteConn {
            session: Arc::new(Mutex::new(session)),
        })
    }

    async fn validate(&self, conn: &mut SqliteConn, timeout: Duration) -> bool {
        let probe = blocking(conn, |session| Ok(session.ping()));
        matches!(tokio::time::timeout(timeout, probe).await, Ok(Ok(true)))
    }

    async fn close(&self, conn: SqliteConn) -> BackendResult<()> {
        blocking(&conn, Session::rollback).await
    }

    async fn insert(&self, conn: &mut SqliteConn, worker: &str, payload: &str) -> BackendResult<i64> {
        let worker = worker.to_string();
        let payload = payload.to_string();
        blocking(conn, move |session| {
            let c = session.conn()?;
            diesel::insert_into(load_test::table)
                .values(NewLoadRow::new(&worker, &payload, now()))
                .execute(c)
                .map_err(query_error)?;
            diesel::sql_query("SELECT last_insert_rowid() AS id")
                .get_result::<LastInsertRowId>(c)
                .map(|row| row.id)
                .map_err(query_error)
        })
        .await
    }

    async fn batch_insert(
        &self,
        conn: &mut SqliteConn,
        worker: &str,
        count: usize,
    ) -> BackendResult<u64> {
        let worker = worker.to_string();
        blocking(conn, move |session| {
            let payload: String = rand::thread_rng()
                .sample_iter(Alphanumeric)
                .take(BATCH_PAYLOAD_LEN)
                .map(char::from)
                .collect();
            let created_at = now();
            let rows: Vec<NewLoadRow<'_>> = (0..count)
                .map(|_| NewLoadRow::new(&worker, &payload, created_at.clone()))
                .collect();
            let inserted = diesel::insert_into(load_test::table)
                .values(&rows)
                .execute(session.conn()?)
                .map_err(query_error)?;
            Ok(inserted as u64)
        })
        .await
    }

    async fn select(&self, conn: &mut SqliteConn, id: i64) -> BackendResult<Option<Row>> {
        blocking(conn, move |session| find(session.conn()?, id)).await
    }

    async fn random_select(&self, conn: &mut SqliteConn, max_id: i64) -> BackendResult<Option<Row>> {
        if max_id <= 0 {
            return Ok(None);
        }
        let id = rand::thread_rng().gen_range(1..=max_id);
        self.select(conn, id).await
    }

    async fn update(&self, conn: &mut SqliteConn, id: i64) -> BackendResult<bool> {
        blocking(conn, move |session| {
            diesel::update(load_test::table.find(id))
                .set((
                    load_test::value_col.eq(format!("UPDATED_{id}")),
                    load_test::updated_at.eq(now()),
                ))
                .execute(session.conn()?)
                .map(|n| n > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn delete(&self, conn: &mut SqliteConn, id: i64) -> BackendResult<bool> {
        blocking(conn, move |session| {
            diesel::delete(load_test::table.find(id))
                .execute(session.conn()?)
                .map(|n| n > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn max_id(&self, conn: &mut SqliteConn) -> BackendResult<i64> {
        blocking(conn, |session| {
            load_test::table
                .select(diesel::dsl::max(load_test::id))
                .first::<Option<i64>>(session.conn()?)
                .map(|max| max.unwrap_or(0))
                .map_err(query_error)
        })
        .await
    }

    async fn commit(&self, conn: &mut SqliteConn) -> BackendResult<()> {
        blocking(conn, Session::commit).await
    }

    async fn rollback(&self, conn: &mut SqliteConn) -> BackendResult<()> {
        blocking(conn, Session::rollback).await
    }

    async fn setup_schema(&self, conn: &mut SqliteConn) -> BackendResult<()> {
        blocking(conn, |session| {
            diesel::sql_query(DDL)
                .execute(session.conn()?)
                .map(|_| ())
                .map_err(query_error)
        })
        .await
    }

    async fn truncate(&self, conn: &mut SqliteConn) -> BackendResult<()> {
        blocking(conn, |session| {
            diesel::delete(load_test::table)
                .execute(session.conn()?)
                .map(|_| ())
                .map_err(query_error)
        })
        .await
    }
}
