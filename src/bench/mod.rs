//! Benchmark engine module
//!
//! Progress estimation, the per-round write/read cycle, and the orchestrator
//! that repeats rounds and aggregates their samples.

pub mod orchestrator;
pub mod progress;
pub mod round;
pub mod sink;

// Re-export commonly used types
pub use orchestrator::{ensure_free_space, BenchmarkOrchestrator};
pub use progress::{ObservedProgress, ProgressEstimator, ProgressSnapshot, SyntheticProgress};
pub use round::{remove_artifact, RoundController, RoundState};
pub use sink::{NullSink, ProgressSink};
