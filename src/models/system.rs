//! Host and volume metadata recorded alongside results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// System information captured at benchmark time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Total system memory in bytes
    pub memory_total: u64,
    /// Available system memory in bytes at benchmark time
    pub memory_available: u64,
}

impl SystemInfo {
    /// Detect the current system
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            memory_total: detect_memory_total(),
            memory_available: detect_memory_available(),
        }
    }
}

/// A mounted volume the benchmark can target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Where the volume is mounted
    pub mount_path: PathBuf,
    /// Total capacity in bytes
    pub capacity: u64,
    /// Free space in bytes available to unprivileged users
    pub available: u64,
    /// Backing device, e.g. `/dev/disk3s1`
    pub device: String,
    /// Media description, e.g. `SSD`, `Apple SSD PCI-Express`
    pub media_type: String,
    /// File system kind, e.g. `apfs`, `ext4`
    pub filesystem: String,
}

#[cfg(unix)]
fn sysconf_bytes(pages_name: libc::c_int) -> u64 {
    // SAFETY: sysconf only reads process-independent system parameters
    let (pages, page_size) = unsafe { (libc::sysconf(pages_name), libc::sysconf(libc::_SC_PAGESIZE)) };
    if pages <= 0 || page_size <= 0 {
        0
    } else {
        pages as u64 * page_size as u64
    }
}

#[cfg(unix)]
fn detect_memory_total() -> u64 {
    sysconf_bytes(libc::_SC_PHYS_PAGES)
}

#[cfg(not(unix))]
fn detect_memory_total() -> u64 {
    0
}

#[cfg(target_os = "linux")]
fn detect_memory_available() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| parse_meminfo_available(&content))
        .unwrap_or_else(|| sysconf_bytes(libc::_SC_AVPHYS_PAGES))
}

#[cfg(target_os = "macos")]
fn detect_memory_available() -> u64 {
    let mut free_pages: u32 = 0;
    let mut len = std::mem::size_of::<u32>();
    // SAFETY: the name is NUL-terminated and `len` matches the out buffer
    let rc = unsafe {
        libc::sysctlbyname(
            b"vm.page_free_count\0".as_ptr() as *const libc::c_char,
            &mut free_pages as *mut u32 as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    // SAFETY: see sysconf_bytes
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if rc != 0 || page_size <= 0 {
        0
    } else {
        free_pages as u64 * page_size as u64
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn detect_memory_available() -> u64 {
    0
}

/// `MemAvailable` from /proc/meminfo, in bytes
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_available(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
