//! I/O operations module
//!
//! External bulk-copy runners, cache invalidation, and volume queries.

pub mod cache;
pub mod runner;
pub mod volume;

pub use cache::{CacheInvalidator, SystemCachePurger};
pub use runner::{DdRunner, ExitOutcome, IoRunner, PhaseHandle, PhaseMode};
pub use volume::{available_space, list_volumes, missing_tools};
