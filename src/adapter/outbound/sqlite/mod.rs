//! SQLite load target.
//!
//! Provides the reference [`Backend`](crate::port::Backend) implementation
//! using Diesel ORM.

pub mod backend;
pub mod database;

pub use backend::{SqliteBackend, SqliteConn};
