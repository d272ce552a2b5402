//! Benchmark result data models
//!
//! Per-round samples, the aggregate over a run, qualitative performance tiers
//! and the full report handed to the persistence sink.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::BenchmarkConfig;
use crate::models::system::{SystemInfo, VolumeInfo};

/// Throughput measured in one completed round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundSample {
    /// 1-based round index
    pub round: u32,
    /// Write throughput in MB/s
    pub write_mbps: f64,
    /// Read throughput in MB/s
    pub read_mbps: f64,
}

/// All round samples of a finished run, in completion order, with averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub samples: Vec<RoundSample>,
    pub average_write_mbps: f64,
    pub average_read_mbps: f64,
}

impl AggregateResult {
    /// Build the aggregate from a complete sample list
    pub fn from_samples(samples: Vec<RoundSample>) -> Self {
        let count = samples.len().max(1) as f64;
        let average_write_mbps = samples.iter().map(|s| s.write_mbps).sum::<f64>() / count;
        let average_read_mbps = samples.iter().map(|s| s.read_mbps).sum::<f64>() / count;

        Self {
            samples,
            average_write_mbps,
            average_read_mbps,
        }
    }

    pub fn write_tier(&self) -> PerformanceTier {
        PerformanceTier::classify(self.average_write_mbps)
    }

    pub fn read_tier(&self) -> PerformanceTier {
        PerformanceTier::classify(self.average_read_mbps)
    }

    /// Plain-language advice derived from the averages
    pub fn recommendations(&self) -> Vec<&'static str> {
        let write = self.average_write_mbps;
        let read = self.average_read_mbps;
        let mut advice = Vec::new();

        if write < 100.0 || read < 100.0 {
            advice.push("Consider upgrading to an SSD for better performance");
        }

        if write < 500.0 && read < 500.0 {
            advice.push("Check that the volume has enough free space");
            advice.push("Consider defragmenting or trimming the volume");
        }

        if (write - read).abs() > write * 0.5 {
            advice.push("Write and read speeds differ widely; the drive may have a problem");
        }

        if advice.is_empty() {
            advice.push("The drive is performing well; no tuning needed");
        }

        advice
    }
}

/// Qualitative speed rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Fair,
    Slow,
}

impl PerformanceTier {
    pub fn classify(mbps: f64) -> Self {
        if mbps >= 1000.0 {
            PerformanceTier::Excellent
        } else if mbps >= 500.0 {
            PerformanceTier::Good
        } else if mbps >= 100.0 {
            PerformanceTier::Fair
        } else {
            PerformanceTier::Slow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "excellent",
            PerformanceTier::Good => "good",
            PerformanceTier::Fair => "fair",
            PerformanceTier::Slow => "slow",
        }
    }

    pub fn range(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => ">1000 MB/s",
            PerformanceTier::Good => "500-1000 MB/s",
            PerformanceTier::Fair => "100-500 MB/s",
            PerformanceTier::Slow => "<100 MB/s",
        }
    }
}

/// Everything the persistence sink writes about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// When the run finished
    pub timestamp: DateTime<Local>,
    pub config: BenchmarkConfig,
    /// Size tag (`1g`, `512m`) used in the report name
    pub size_tag: String,
    pub volume: Option<VolumeInfo>,
    pub system_info: SystemInfo,
    pub result: AggregateResult,
}

impl BenchmarkReport {
    pub fn new(config: BenchmarkConfig, volume: Option<VolumeInfo>, result: AggregateResult) -> Self {
        let size_tag = crate::util::units::size_tag(config.target_size);
        Self {
            timestamp: Local::now(),
            config,
            size_tag,
            volume,
            system_info: SystemInfo::detect(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(round: u32, write_mbps: f64, read_mbps: f64) -> RoundSample {
        RoundSample {
            round,
            write_mbps,
            read_mbps,
        }
    }

    #[test]
    fn test_aggregate_means() {
        let result = AggregateResult::from_samples(vec![
            sample(1, 100.0, 300.0),
            sample(2, 200.0, 400.0),
            sample(3, 300.0, 500.0),
        ]);

        assert_eq!(result.samples.len(), 3);
        assert!((result.average_write_mbps - 200.0).abs() < 1e-9);
        assert!((result.average_read_mbps - 400.0).abs() < 1e-9);
        assert_eq!(result.samples[2].round, 3);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(PerformanceTier::classify(1000.0), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::classify(999.99), PerformanceTier::Good);
        assert_eq!(PerformanceTier::classify(500.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::classify(100.0), PerformanceTier::Fair);
        assert_eq!(PerformanceTier::classify(99.9), PerformanceTier::Slow);
        assert_eq!(PerformanceTier::classify(0.0), PerformanceTier::Slow);
    }

    #[test]
    fn test_tiers_are_independent_per_direction() {
        let result = AggregateResult::from_samples(vec![sample(1, 1500.0, 80.0)]);
        assert_eq!(result.write_tier(), PerformanceTier::Excellent);
        assert_eq!(result.read_tier(), PerformanceTier::Slow);
    }

    #[test]
    fn test_recommendations() {
        let slow = AggregateResult::from_samples(vec![sample(1, 50.0, 60.0)]);
        let advice = slow.recommendations();
        assert!(advice.iter().any(|a| a.contains("SSD")));
        assert!(advice.iter().any(|a| a.contains("free space")));

        let lopsided = AggregateResult::from_samples(vec![sample(1, 2000.0, 600.0)]);
        assert_eq!(lopsided.recommendations().len(), 1);
        assert!(lopsided.recommendations()[0].contains("differ"));

        let fast = AggregateResult::from_samples(vec![sample(1, 1500.0, 1600.0)]);
        assert_eq!(
            fast.recommendations(),
            vec!["The drive is performing well; no tuning needed"]
        );
    }

    #[test]
    fn test_serde_serialization() {
        let result = AggregateResult::from_samples(vec![sample(1, 512.0, 1024.0)]);
        let json = serde_json::to_string(&result).expect("Failed to serialize to JSON");
        let deserialized: AggregateResult =
            serde_json::from_str(&json).expect("Failed to deserialize from JSON");
        assert_eq!(result, deserialized);
    }
}
