//! diskspeed - sequential volume throughput benchmark
//!
//! Drives an external bulk-copy utility against a mounted volume, samples its
//! progress, and aggregates write/read throughput over repeated rounds.

use std::fmt;

pub mod bench;
pub mod config;
pub mod console;
pub mod io;
pub mod models;
pub mod report;
pub mod util;

use crate::io::runner::{ExitOutcome, PhaseMode};

/// Why a phase measurement could not produce a throughput number
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The external operation could not be started
    Spawn(String),
    /// The external operation exited unsuccessfully
    Exit(ExitOutcome),
    /// Waiting on the external operation failed
    Wait(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Spawn(msg) => write!(f, "failed to start: {}", msg),
            FailureReason::Exit(outcome) => write!(f, "{}", outcome),
            FailureReason::Wait(msg) => write!(f, "failed while waiting: {}", msg),
        }
    }
}

// Common error types
#[derive(Debug)]
pub enum DiskSpeedError {
    /// I/O operation failed
    IoError(std::io::Error),
    /// Configuration validation or parsing error
    ConfigError(String),
    /// The host operating system is not supported
    UnsupportedPlatform(String),
    /// Required external commands are not on PATH
    MissingTools(Vec<String>),
    /// Not enough free space on the target volume
    InsufficientSpace {
        /// Bytes needed (size times margin)
        required: u64,
        /// Bytes reported free
        available: u64,
    },
    /// A round's external operation failed
    MeasurementFailure {
        /// 1-based round index
        round: u32,
        /// Phase that failed
        phase: PhaseMode,
        /// What went wrong
        reason: FailureReason,
    },
    /// The operator interrupted the run
    Cancelled,
    /// Report persistence error
    PersistenceError(String),
}

impl DiskSpeedError {
    /// Whether this error reflects the environment rather than the volume
    pub fn is_configuration_error(&self) -> bool {
        match self {
            DiskSpeedError::ConfigError(_)
            | DiskSpeedError::UnsupportedPlatform(_)
            | DiskSpeedError::MissingTools(_) => true,
            DiskSpeedError::MeasurementFailure { reason, .. } => {
                matches!(reason, FailureReason::Spawn(_))
            }
            _ => false,
        }
    }
}

impl fmt::Display for DiskSpeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskSpeedError::IoError(err) => write!(f, "I/O error: {}", err),
            DiskSpeedError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DiskSpeedError::UnsupportedPlatform(os) => {
                write!(f, "Unsupported platform: {} (macOS or Linux required)", os)
            }
            DiskSpeedError::MissingTools(tools) => {
                write!(f, "Missing required commands: {}", tools.join(", "))
            }
            DiskSpeedError::InsufficientSpace { required, available } => write!(
                f,
                "Insufficient disk space: need at least {}, only {} available",
                util::units::format_bytes(*required),
                util::units::format_bytes(*available)
            ),
            DiskSpeedError::MeasurementFailure { round, phase, reason } => write!(
                f,
                "Measurement failed in round {} ({} phase): {}",
                round,
                phase.description().to_lowercase(),
                reason
            ),
            DiskSpeedError::Cancelled => write!(f, "Benchmark interrupted by user"),
            DiskSpeedError::PersistenceError(msg) => write!(f, "Report persistence error: {}", msg),
        }
    }
}

impl std::error::Error for DiskSpeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiskSpeedError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DiskSpeedError {
    fn from(err: std::io::Error) -> Self {
        DiskSpeedError::IoError(err)
    }
}

impl From<serde_json::Error> for DiskSpeedError {
    fn from(err: serde_json::Error) -> Self {
        DiskSpeedError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for DiskSpeedError {
    fn from(err: toml::de::Error) -> Self {
        DiskSpeedError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for DiskSpeedError {
    fn from(err: toml::ser::Error) -> Self {
        DiskSpeedError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for diskspeed operations
pub type Result<T> = std::result::Result<T, DiskSpeedError>;

/// Error handling utilities
pub mod error {
    use super::{DiskSpeedError, FailureReason};

    /// Process exit code for a fatal error
    pub fn exit_code(error: &DiskSpeedError) -> i32 {
        match error {
            // Operator abort is a normal way to leave the tool
            DiskSpeedError::Cancelled => 0,
            _ => 1,
        }
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &DiskSpeedError) -> String {
        match error {
            DiskSpeedError::InsufficientSpace { .. } => format!(
                "{}. Free up space or choose a smaller test size.",
                error
            ),
            DiskSpeedError::MissingTools(_) => {
                format!("{}. Install them and make sure they are on PATH.", error)
            }
            DiskSpeedError::MeasurementFailure {
                reason: FailureReason::Spawn(_),
                ..
            } => format!("{}. Check that dd is installed and executable.", error),
            DiskSpeedError::MeasurementFailure { .. } => format!(
                "{}. Check that the volume is writable and not full.",
                error
            ),
            DiskSpeedError::IoError(err)
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                "Permission denied. Choose a writable location or check permissions.".to_string()
            }
            DiskSpeedError::Cancelled => {
                "Benchmark interrupted by user; temporary files removed.".to_string()
            }
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "diskspeed";
pub const CONFIG_FILE: &str = "diskspeed.toml";
pub const TEMP_FILE_PREFIX: &str = "disk_speed_test_";
pub const REPORT_PREFIX: &str = "benchmark";
pub const DEFAULT_LOG_DIR: &str = "logs";
