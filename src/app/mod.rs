//! Application layer - load workers, run orchestration and reporting.

mod orchestrator;
pub mod reporter;
pub mod worker;

pub use orchestrator::{Orchestrator, RunReport};
pub use reporter::Reporter;
pub use worker::{Worker, WorkerConfig, WorkerSummary};
