//! SQLite connection setup and explicit transaction control.
//!
//! Diesel's `SqliteConnection` is synchronous. A [`Session`] wraps one
//! connection together with its open-transaction flag so the backend can run
//! it on the blocking pool and keep `BEGIN`/`COMMIT` pairing across calls.

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::error::BackendError;

/// DDL for the load table.
pub const DDL: &str = "\
CREATE TABLE IF NOT EXISTS load_test (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    value_col TEXT,
    random_data TEXT,
    status TEXT DEFAULT 'ACTIVE',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
)";

/// One physical connection and its transaction state.
pub struct Session {
    conn: SqliteConnection,
    in_transaction: bool,
}

impl Session {
    /// Open `path` and apply the connection pragmas.
    ///
    /// # Errors
    /// Returns [`BackendError::Connect`] if the file cannot be opened or a
    /// pragma fails.
    pub fn open(path: &str, busy_timeout: Duration) -> Result<Self, BackendError> {
        let mut conn = SqliteConnection::establish(path)
            .map_err(|e| BackendError::Connect(e.to_string()))?;
        configure_sqlite_connection(&mut conn, busy_timeout)
            .map_err(|e| BackendError::Connect(e.to_string()))?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// The underlying connection, inside a transaction.
    ///
    /// # Errors
    /// Returns [`BackendError::Transaction`] if `BEGIN` fails.
    pub fn conn(&mut self) -> Result<&mut SqliteConnection, BackendError> {
        if !self.in_transaction {
            diesel::sql_query("BEGIN IMMEDIATE")
                .execute(&mut self.conn)
                .map_err(|e| BackendError::Transaction(e.to_string()))?;
            self.in_transaction = true;
        }
        Ok(&mut self.conn)
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Commit the open transaction, if any.
    ///
    /// # Errors
    /// Returns [`BackendError::Transaction`] if `COMMIT` fails.
    pub fn commit(&mut self) -> Result<(), BackendError> {
        self.finish("COMMIT")
    }

    /// Roll back the open transaction, if any.
    ///
    /// # Errors
    /// Returns [`BackendError::Transaction`] if `ROLLBACK` fails.
    pub fn rollback(&mut self) -> Result<(), BackendError> {
        self.finish("ROLLBACK")
    }

    fn finish(&mut self, statement: &str) -> Result<(), BackendError> {
        if !self.in_transaction {
            return Ok(());
        }
        // A failed COMMIT leaves SQLite's transaction state unknown, so the
        // flag is cleared either way and the next call starts fresh.
        self.in_transaction = false;
        diesel::sql_query(statement)
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(|e| BackendError::Transaction(e.to_string()))
    }

    /// Liveness probe outside any transaction.
    pub fn ping(&mut self) -> bool {
        diesel::sql_query("SELECT 1").execute(&mut self.conn).is_ok()
    }
}

/// Configure SQLite connection pragmas used under concurrent load.
///
/// # Errors
/// Returns an error if a pragma fails to apply.
pub fn configure_sqlite_connection(
    conn: &mut SqliteConnection,
    busy_timeout: Duration,
) -> QueryResult<()> {
    conn.batch_execute(&format!(
        "PRAGMA busy_timeout={}; PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;",
        busy_timeout.as_millis()
    ))
}
