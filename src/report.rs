//! Report persistence
//!
//! Writes a human-readable `.log` report per run, named
//! `benchmark_<pathTag>_<sizeTag>_<timestamp>.log`, and optionally the same
//! report as JSON.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::models::BenchmarkReport;
use crate::util::units::{format_bytes, format_mbps};
use crate::{DiskSpeedError, Result, REPORT_PREFIX};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const RULE: &str = "==================================================";

/// Reduce a path to `[A-Za-z0-9_]`, collapsing other runs to one `_`
pub fn sanitize_path_tag(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut tag = String::with_capacity(raw.len());

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            tag.push(ch);
        } else if !tag.ends_with('_') {
            tag.push('_');
        }
    }

    let tag = tag.trim_matches('_');
    if tag.is_empty() {
        "root".to_string()
    } else {
        tag.to_string()
    }
}

pub fn report_file_name(report: &BenchmarkReport) -> String {
    format!(
        "{}_{}_{}_{}.log",
        REPORT_PREFIX,
        sanitize_path_tag(&report.config.target_path),
        report.size_tag,
        report.timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Text body of the `.log` report
pub struct LogReport<'a>(pub &'a BenchmarkReport);

impl fmt::Display for LogReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let result = &report.result;
        let system = &report.system_info;

        writeln!(f, "Disk Speed Benchmark Report")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Test time: {}", report.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Test path: {}", report.config.target_path.display())?;
        writeln!(
            f,
            "Test size: {} ({})",
            format_bytes(report.config.target_size),
            report.size_tag
        )?;
        writeln!(f)?;

        writeln!(f, "System information")?;
        writeln!(f, "  OS:            {}", system.os)?;
        writeln!(f, "  Architecture:  {}", system.arch)?;
        writeln!(f, "  Total memory:  {}", format_bytes(system.memory_total))?;
        writeln!(f, "  Free memory:   {}", format_bytes(system.memory_available))?;
        writeln!(f)?;

        if let Some(volume) = &report.volume {
            writeln!(f, "Volume information")?;
            writeln!(f, "  Mount point:   {}", volume.mount_path.display())?;
            writeln!(f, "  Device:        {}", volume.device)?;
            writeln!(f, "  Media:         {}", volume.media_type)?;
            writeln!(f, "  File system:   {}", volume.filesystem)?;
            writeln!(f, "  Capacity:      {}", format_bytes(volume.capacity))?;
            writeln!(f, "  Available:     {}", format_bytes(volume.available))?;
            writeln!(f)?;
        }

        writeln!(f, "Results")?;
        for sample in &result.samples {
            writeln!(
                f,
                "  Round {}: write {}, read {}",
                sample.round,
                format_mbps(sample.write_mbps),
                format_mbps(sample.read_mbps)
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Average write: {}", format_mbps(result.average_write_mbps))?;
        writeln!(f, "Average read:  {}", format_mbps(result.average_read_mbps))?;
        writeln!(f)?;

        let write_tier = result.write_tier();
        let read_tier = result.read_tier();
        writeln!(f, "Assessment")?;
        writeln!(f, "  Write: {} ({})", write_tier.label(), write_tier.range())?;
        writeln!(f, "  Read:  {} ({})", read_tier.label(), read_tier.range())?;
        writeln!(f)?;

        writeln!(f, "Recommendations")?;
        for advice in result.recommendations() {
            writeln!(f, "  - {}", advice)?;
        }
        writeln!(f, "{}", RULE)
    }
}

/// Write the `.log` report into `dir`, creating it if needed
pub fn write_log_report(dir: &Path, report: &BenchmarkReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| {
        DiskSpeedError::PersistenceError(format!(
            "Failed to create report directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let path = dir.join(report_file_name(report));
    fs::write(&path, LogReport(report).to_string()).map_err(|e| {
        DiskSpeedError::PersistenceError(format!(
            "Failed to write report {}: {}",
            path.display(),
            e
        ))
    })?;

    info!("Report written to {}", path.display());
    Ok(path)
}

/// Export the report as pretty JSON
pub fn export_json(path: &Path, report: &BenchmarkReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(report)?;
    fs::write(path, content).map_err(|e| {
        DiskSpeedError::PersistenceError(format!(
            "Failed to write JSON export {}: {}",
            path.display(),
            e
        ))
    })?;

    info!("JSON report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchmarkConfig;
    use crate::models::{AggregateResult, RoundSample, SystemInfo, VolumeInfo};
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn create_test_report(path: &str) -> BenchmarkReport {
        BenchmarkReport {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            config: BenchmarkConfig::new(path, 1024 * 1024 * 1024),
            size_tag: "1g".to_string(),
            volume: Some(VolumeInfo {
                mount_path: PathBuf::from("/Volumes/Data"),
                capacity: 500 * 1024 * 1024 * 1024,
                available: 200 * 1024 * 1024 * 1024,
                device: "/dev/disk3s1".to_string(),
                media_type: "SSD".to_string(),
                filesystem: "apfs".to_string(),
            }),
            system_info: SystemInfo {
                os: "macos".to_string(),
                arch: "aarch64".to_string(),
                memory_total: 16 * 1024 * 1024 * 1024,
                memory_available: 8 * 1024 * 1024 * 1024,
            },
            result: AggregateResult::from_samples(vec![
                RoundSample {
                    round: 1,
                    write_mbps: 1200.0,
                    read_mbps: 2400.0,
                },
                RoundSample {
                    round: 2,
                    write_mbps: 1000.0,
                    read_mbps: 2600.0,
                },
            ]),
        }
    }

    #[test]
    fn test_sanitize_path_tag() {
        assert_eq!(sanitize_path_tag(Path::new("/Volumes/My Drive")), "Volumes_My_Drive");
        assert_eq!(sanitize_path_tag(Path::new("/mnt//data-1/")), "mnt_data_1");
        assert_eq!(sanitize_path_tag(Path::new("/")), "root");
        assert_eq!(sanitize_path_tag(Path::new("")), "root");
    }

    #[test]
    fn test_report_file_name() {
        let report = create_test_report("/Volumes/Data");
        assert_eq!(
            report_file_name(&report),
            "benchmark_Volumes_Data_1g_2024-03-09_14-05-07.log"
        );
    }

    #[test]
    fn test_log_report_content() {
        let text = LogReport(&create_test_report("/Volumes/Data")).to_string();

        assert!(text.contains("Test path: /Volumes/Data"));
        assert!(text.contains("Round 1: write 1200.00 MB/s, read 2400.00 MB/s"));
        assert!(text.contains("Average write: 1100.00 MB/s"));
        assert!(text.contains("Average read:  2500.00 MB/s"));
        assert!(text.contains("Write: excellent"));
        assert!(text.contains("File system:   apfs"));
        assert!(text.contains("differ widely"));
    }

    #[test]
    fn test_write_log_report_creates_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let report = create_test_report("/");

        let path = write_log_report(&logs, &report).unwrap();
        assert!(path.exists());
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "benchmark_root_1g_2024-03-09_14-05-07.log"
        );
        assert!(fs::read_to_string(&path).unwrap().contains("Recommendations"));
    }

    #[test]
    fn test_export_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let report = create_test_report("/Volumes/Data");

        export_json(&path, &report).unwrap();

        let loaded: BenchmarkReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.result, report.result);
        assert_eq!(loaded.config, report.config);
    }
}
