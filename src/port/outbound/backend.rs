//! Database backend port.
//!
//! A [`Backend`] is both the connection factory used by the pool and the
//! dialect-specific executor used by workers. The engine never inspects the
//! connection type; it only moves it between the pool and the adapter.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Row;
use crate::error::BackendError;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A relational database the load engine can drive.
///
/// Every data operation runs inside the connection's current transaction;
/// the worker decides when to [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// A single physical connection.
    type Connection: Send + 'static;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// DDL for the load table.
    fn ddl(&self) -> &'static str;

    /// Open a new physical connection.
    async fn connect(&self) -> BackendResult<Self::Connection>;

    /// Liveness check, bounded by `timeout`.
    async fn validate(&self, conn: &mut Self::Connection, timeout: Duration) -> bool;

    /// Close a connection. Errors are informational; the connection is gone
    /// either way.
    async fn close(&self, conn: Self::Connection) -> BackendResult<()>;

    /// Insert one row and return its generated id.
    async fn insert(
        &self,
        conn: &mut Self::Connection,
        worker: &str,
        payload: &str,
    ) -> BackendResult<i64>;

    /// Insert `count` rows and return how many were written.
    async fn batch_insert(
        &self,
        conn: &mut Self::Connection,
        worker: &str,
        count: usize,
    ) -> BackendResult<u64>;

    async fn select(&self, conn: &mut Self::Connection, id: i64) -> BackendResult<Option<Row>>;

    /// Read a random row with an id in `1..=max_id`.
    async fn random_select(
        &self,
        conn: &mut Self::Connection,
        max_id: i64,
    ) -> BackendResult<Option<Row>>;

    /// Returns whether a row was updated.
    async fn update(&self, conn: &mut Self::Connection, id: i64) -> BackendResult<bool>;

    /// Returns whether a row was deleted.
    async fn delete(&self, conn: &mut Self::Connection, id: i64) -> BackendResult<bool>;

    /// Highest id in the load table, `0` when empty.
    async fn max_id(&self, conn: &mut Self::Connection) -> BackendResult<i64>;

    async fn commit(&self, conn: &mut Self::Connection) -> BackendResult<()>;

    async fn rollback(&self, conn: &mut Self::Connection) -> BackendResult<()>;

    /// Create the load table if it does not exist.
    async fn setup_schema(&self, conn: &mut Self::Connection) -> BackendResult<()>;

    /// Remove every row from the load table.
    async fn truncate(&self, conn: &mut Self::Connection) -> BackendResult<()>;
}
