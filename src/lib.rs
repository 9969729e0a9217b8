//! dbload - concurrent load generation for relational databases.
//!
//! Drives a configurable number of workers against a load table through a
//! health-checked connection pool, with optional rate limiting, staggered
//! ramp-up, live progress reporting and a JSON run report.
//!
//! # Architecture
//!
//! - **`domain`** - Workload modes, operation mix and statistics types
//! - **`port`** - The [`Backend`](port::Backend) trait every database implements
//! - **`infrastructure`** - Connection pool, rate limiter, metrics, config
//! - **`app`** - Workers, the run orchestrator and the progress reporter
//! - **`adapter`** - SQLite backend (Diesel) and the `dbload` CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dbload::adapter::outbound::sqlite::SqliteBackend;
//! use dbload::app::Orchestrator;
//! use dbload::infrastructure::config::settings::Config;
//!
//! # async fn demo() -> dbload::error::Result<()> {
//! let config = Config::default();
//! let backend = Arc::new(SqliteBackend::new(&config.database));
//! let report = Orchestrator::new(config, backend).run().await?;
//! println!("{} transactions", report.stats.total_transactions);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
