//! Utility functions module
//!
//! Helper functions for size, throughput and duration formatting.

pub mod units;

// Re-export commonly used functions
pub use units::{
    calculate_throughput_mbps, format_bytes, format_duration, format_mbps, parse_size, size_tag,
};
