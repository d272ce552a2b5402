//! Units formatting and conversion utilities
//!
//! Human-readable sizes, throughput and durations, plus the size tags used in
//! report file names.

use std::time::Duration;

use byte_unit::Byte;

/// Bytes in one MB for throughput figures (binary convention)
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Format bytes into human-readable size with appropriate units
///
/// # Examples
/// ```
/// use diskspeed::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1073741824), "1.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Parse a size string such as `512MiB`, `2 GB` or `1048576` into bytes
pub fn parse_size(input: &str) -> Result<u64, String> {
    let byte = Byte::parse_str(input.trim(), true)
        .map_err(|e| format!("Invalid size '{}': {}", input.trim(), e))?;
    Ok(byte.as_u64())
}

/// Short tag for a size used in file names: `1g`, `512m`, `1000b`
pub fn size_tag(bytes: u64) -> String {
    if bytes >= GIB && bytes % GIB == 0 {
        format!("{}g", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{}m", bytes / MIB)
    } else {
        format!("{}b", bytes)
    }
}

/// Format duration into human-readable string
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use diskspeed::util::units::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 3600 {
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if total_secs >= 60 {
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("{}m {}s", minutes, seconds)
    } else if total_secs > 0 {
        if millis > 0 {
            format!("{}.{:02}s", total_secs, millis / 10)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        format!("{}ms", millis)
    }
}

/// Calculate throughput in MB/s (1 MB = 1024 * 1024 bytes)
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use diskspeed::util::units::calculate_throughput_mbps;
///
/// let throughput = calculate_throughput_mbps(1048576, Duration::from_secs(1));
/// assert!((throughput - 1.0).abs() < 0.01);
/// ```
pub fn calculate_throughput_mbps(bytes: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    bytes as f64 / BYTES_PER_MB / duration.as_secs_f64()
}

/// Format a throughput value the way reports print it: `512.00 MB/s`
pub fn format_mbps(mbps: f64) -> String {
    format!("{:.2} MB/s", mbps)
}
