//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`backend`]: `MemoryBackend`, a scriptable in-memory
//!   [`Backend`](crate::port::Backend) with failure injection.
//! - [`config`]: canonical pool and run configurations.

pub mod backend;
pub mod config;

pub use backend::{MemoryBackend, MemoryConnection};
