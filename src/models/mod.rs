//! Data models module
//!
//! Round samples, aggregate results, performance tiers, and the host/volume
//! metadata recorded with a report.

pub mod result;
pub mod system;

// Re-export commonly used types
pub use result::{AggregateResult, BenchmarkReport, PerformanceTier, RoundSample};
pub use system::{SystemInfo, VolumeInfo};
