//! Infrastructure layer.
//!
//! Technical machinery the load engine runs on. Nothing here knows about
//! workload modes or row semantics.
//!
//! # Submodules
//!
//! - [`backoff`] - Exponential retry delays
//! - [`config`] - Configuration loading and validation
//! - [`limiter`] - Global token-bucket rate limiter
//! - [`metrics`] - Latency and throughput registry
//! - [`pool`] - Health-checked connection pool
//! - [`shutdown`] - Cooperative stop signal

pub mod backoff;
pub mod config;
pub mod limiter;
pub mod metrics;
pub mod pool;
pub mod shutdown;
