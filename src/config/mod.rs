//! Configuration management module
//!
//! Holds the immutable per-run benchmark input, the tunable engine settings
//! and their TOML persistence, and the fixed test size presets.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::io::runner::MIN_BLOCK_SIZE;
use crate::util::units::parse_size;
use crate::{DiskSpeedError, Result, APP_NAME, CONFIG_FILE, DEFAULT_LOG_DIR};

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Input for a single benchmark run; never changes once the run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Existing directory on the volume under test
    pub target_path: PathBuf,
    /// Size of the transient artifact in bytes
    pub target_size: u64,
}

impl BenchmarkConfig {
    pub fn new(target_path: impl Into<PathBuf>, target_size: u64) -> Self {
        Self {
            target_path: target_path.into(),
            target_size,
        }
    }

    /// Validate the run input
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(DiskSpeedError::ConfigError(
                "Target size must be greater than 0".to_string(),
            ));
        }

        if self.target_size % MIN_BLOCK_SIZE != 0 {
            return Err(DiskSpeedError::ConfigError(format!(
                "Target size must be a multiple of {} bytes, got {}",
                MIN_BLOCK_SIZE, self.target_size
            )));
        }

        if !self.target_path.exists() {
            return Err(DiskSpeedError::ConfigError(format!(
                "Target path does not exist or is not accessible: {}",
                self.target_path.display()
            )));
        }

        if !self.target_path.is_dir() {
            return Err(DiskSpeedError::ConfigError(format!(
                "Target path is not a directory: {}",
                self.target_path.display()
            )));
        }

        Ok(())
    }
}

/// Engine tunables. Defaults match long-standing empirical values; none of
/// them is a hard invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    /// Number of write+read rounds per run
    pub rounds: u32,
    /// Progress sampling tick
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,
    /// Steps used to interpolate read progress
    pub synthetic_steps: u32,
    /// Pause between rounds
    #[serde(with = "duration_serde")]
    pub round_delay: Duration,
    /// Free space required as a multiple of the target size
    pub space_margin: u64,
    /// Directory receiving `.log` reports
    pub log_dir: PathBuf,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            rounds: 3,
            sample_interval: Duration::from_millis(100),
            synthetic_steps: 50,
            round_delay: Duration::from_secs(1),
            space_margin: 2,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl BenchmarkSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(DiskSpeedError::ConfigError(
                "Round count must be at least 1".to_string(),
            ));
        }

        if self.sample_interval.is_zero() {
            return Err(DiskSpeedError::ConfigError(
                "Sample interval must be greater than 0".to_string(),
            ));
        }

        if self.synthetic_steps == 0 {
            return Err(DiskSpeedError::ConfigError(
                "Synthetic progress steps must be at least 1".to_string(),
            ));
        }

        if self.space_margin == 0 {
            return Err(DiskSpeedError::ConfigError(
                "Space margin must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Set the number of rounds
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the progress sampling interval
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Set the pause between rounds
    pub fn with_round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }

    /// Set the free-space multiple
    pub fn with_space_margin(mut self, margin: u64) -> Self {
        self.space_margin = margin;
        self
    }

    /// Set the report directory
    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = dir;
        self
    }

    /// Load settings from the standard config file location
    /// Returns defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            DiskSpeedError::ConfigError(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let settings = Self::from_toml(&content).map_err(|e| {
            DiskSpeedError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the standard config file location
    pub fn save(&self) -> Result<()> {
        self.validate()?;

        let config_path = Self::config_file_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DiskSpeedError::ConfigError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(&config_path, content).map_err(|e| {
            DiskSpeedError::ConfigError(format!(
                "Failed to write config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/diskspeed/diskspeed.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DiskSpeedError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Fixed test sizes offered by the interactive selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizePreset {
    OneGiB,
    FiveGiB,
    TenGiB,
}

impl SizePreset {
    pub const ALL: [SizePreset; 3] = [SizePreset::OneGiB, SizePreset::FiveGiB, SizePreset::TenGiB];

    pub fn bytes(&self) -> u64 {
        match self {
            SizePreset::OneGiB => GIB,
            SizePreset::FiveGiB => 5 * GIB,
            SizePreset::TenGiB => 10 * GIB,
        }
    }

    /// Short tag used on the command line and in report names
    pub fn tag(&self) -> &'static str {
        match self {
            SizePreset::OneGiB => "1g",
            SizePreset::FiveGiB => "5g",
            SizePreset::TenGiB => "10g",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizePreset::OneGiB => "1GB - quick test",
            SizePreset::FiveGiB => "5GB - standard test",
            SizePreset::TenGiB => "10GB - thorough test",
        }
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SizePreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        SizePreset::ALL
            .into_iter()
            .find(|preset| preset.tag() == tag)
            .ok_or_else(|| format!("Unknown size preset: {}", s))
    }
}

/// Resolve a `--size` argument: a preset tag or any byte size string.
///
/// Free-form sizes are rounded down to whole MiB so `dd` always moves
/// 1 MiB blocks.
pub fn resolve_size(input: &str) -> Result<u64> {
    if let Ok(preset) = input.parse::<SizePreset>() {
        return Ok(preset.bytes());
    }

    let bytes = parse_size(input).map_err(DiskSpeedError::ConfigError)?;
    let aligned = bytes - bytes % MIB;
    if aligned == 0 {
        return Err(DiskSpeedError::ConfigError(format!(
            "Target size must be at least 1 MiB, got {}",
            input.trim()
        )));
    }
    Ok(aligned)
}

// Durations are stored as human-readable strings ("100ms", "1s")
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_validation() {
        let temp_dir = tempdir().unwrap();

        assert!(BenchmarkConfig::new(temp_dir.path(), 1024).validate().is_ok());

        let zero = BenchmarkConfig::new(temp_dir.path(), 0);
        assert!(matches!(zero.validate(), Err(DiskSpeedError::ConfigError(_))));

        let unaligned = BenchmarkConfig::new(temp_dir.path(), 100_000_001);
        assert!(matches!(unaligned.validate(), Err(DiskSpeedError::ConfigError(_))));

        let missing = BenchmarkConfig::new(temp_dir.path().join("nope"), 1024);
        assert!(matches!(missing.validate(), Err(DiskSpeedError::ConfigError(_))));

        let file_path = temp_dir.path().join("file");
        std::fs::write(&file_path, b"x").unwrap();
        let not_dir = BenchmarkConfig::new(&file_path, 1024);
        assert!(matches!(not_dir.validate(), Err(DiskSpeedError::ConfigError(_))));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = BenchmarkSettings::default();
        assert_eq!(settings.rounds, 3);
        assert_eq!(settings.sample_interval, Duration::from_millis(100));
        assert_eq!(settings.synthetic_steps, 50);
        assert_eq!(settings.round_delay, Duration::from_secs(1));
        assert_eq!(settings.space_margin, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        assert!(BenchmarkSettings::default().with_rounds(0).validate().is_err());
        assert!(BenchmarkSettings::default()
            .with_sample_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(BenchmarkSettings::default().with_space_margin(0).validate().is_err());
    }

    #[test]
    fn test_settings_toml() {
        let settings = BenchmarkSettings::default()
            .with_rounds(5)
            .with_sample_interval(Duration::from_millis(250));
        let toml_str = toml::to_string(&settings).expect("Failed to serialize to TOML");
        assert!(toml_str.contains("250ms"));

        let parsed = BenchmarkSettings::from_toml(&toml_str).expect("Failed to parse TOML");
        assert_eq!(parsed, settings);

        // Partial files fall back to defaults for missing keys
        let partial = BenchmarkSettings::from_toml("rounds = 7\nround_delay = \"2s\"\n").unwrap();
        assert_eq!(partial.rounds, 7);
        assert_eq!(partial.round_delay, Duration::from_secs(2));
        assert_eq!(partial.synthetic_steps, 50);

        assert!(BenchmarkSettings::from_toml("rounds = 0\n").is_err());
    }

    #[test]
    fn test_config_file_path() {
        let path = BenchmarkSettings::config_file_path();
        if let Ok(path) = path {
            assert!(path.to_string_lossy().contains("diskspeed.toml"));
        }
    }

    #[test]
    fn test_size_presets() {
        assert_eq!("1g".parse::<SizePreset>().unwrap(), SizePreset::OneGiB);
        assert_eq!("10G".parse::<SizePreset>().unwrap(), SizePreset::TenGiB);
        assert!("2g".parse::<SizePreset>().is_err());
        assert_eq!(SizePreset::FiveGiB.bytes(), 5 * GIB);
    }

    #[test]
    fn test_resolve_size() {
        assert_eq!(resolve_size("5g").unwrap(), 5 * GIB);
        assert_eq!(resolve_size("64MiB").unwrap(), 64 * 1024 * 1024);
        assert_eq!(resolve_size("100MB").unwrap(), 95 * 1024 * 1024);
        assert_eq!(resolve_size("1.5GB").unwrap(), 1430 * 1024 * 1024);
        assert!(resolve_size("0").is_err());
        assert!(resolve_size("512KiB").is_err());
        assert!(resolve_size("lots").is_err());
    }
}
