//! Infrastructure configuration modules.

pub mod database;
pub mod logging;
pub mod pool;
pub mod reporting;
pub mod settings;
pub mod workload;
