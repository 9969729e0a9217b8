//! Backend-agnostic domain types.

mod mode;
mod stats;

pub use mode::{MixWeights, Operation, WorkloadMode};
pub use stats::{FinalStats, IntervalStats, LatencyStats, PoolStats, Row, Snapshot};
