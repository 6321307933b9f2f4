//! Incremental minute-matrix updates from point-of-interest changes

pub mod cells;
mod engine;
mod lock;
pub mod merge;
mod record;

pub use engine::{DeltaEngine, DeltaFailure, DeltaReport, RecomputeRequest};
pub use lock::MatrixLock;
pub use record::{read_deltas, Action, Delta};
