//! Volume discovery and free-space queries
//!
//! Volumes come from `df -kP`; file system and media details are filled in
//! from `diskutil info` on macOS and from /proc and sysfs on Linux. All text
//! parsing is split from the commands that produce it so it can be tested
//! with canned output.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::models::VolumeInfo;
use crate::{DiskSpeedError, Result};

/// Mount points that belong to the OS and make no sense as targets
const SYSTEM_MOUNT_PREFIXES: &[&str] = &[
    "/System/Volumes/VM",
    "/System/Volumes/Preboot",
    "/System/Volumes/Update",
    "/System/Volumes/xarts",
    "/System/Volumes/iSCPreboot",
    "/System/Volumes/Hardware",
    "/boot",
    "/snap/",
];

/// One data row of `df -kP`
#[derive(Debug, Clone, PartialEq)]
pub struct DfRow {
    pub device: String,
    pub capacity: u64,
    pub available: u64,
    pub mount_path: PathBuf,
}

/// Parse POSIX `df -kP` output, keeping rows backed by a `/dev/` device
pub fn parse_df_output(output: &str) -> Vec<DfRow> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 || !fields[0].starts_with("/dev/") {
                return None;
            }

            let capacity_kb = fields[1].parse::<u64>().ok()?;
            let available_kb = fields[3].parse::<u64>().ok()?;
            // Mount points may contain spaces
            let mount = fields[5..].join(" ");

            Some(DfRow {
                device: fields[0].to_string(),
                capacity: capacity_kb.saturating_mul(1024),
                available: available_kb.saturating_mul(1024),
                mount_path: PathBuf::from(mount),
            })
        })
        .collect()
}

pub fn is_system_volume(mount: &Path) -> bool {
    let mount = mount.to_string_lossy();
    SYSTEM_MOUNT_PREFIXES
        .iter()
        .any(|prefix| mount.starts_with(prefix))
}

/// Media and file system fields from `diskutil info <device>`
pub fn parse_diskutil_info(output: &str) -> (Option<String>, Option<String>) {
    let mut filesystem = None;
    let mut protocol = None;
    let mut media_name = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.trim() {
            "File System Personality" => filesystem = Some(value.to_string()),
            "Protocol" => protocol = Some(value.to_string()),
            "Media Name" => media_name = Some(value.to_string()),
            _ => {}
        }
    }

    let media = match (media_name, protocol) {
        (Some(name), Some(protocol)) => Some(format!("{} ({})", name, protocol)),
        (Some(name), None) => Some(name),
        (None, protocol) => protocol,
    };

    (media, filesystem)
}

/// Mount point to file system type, from /proc/mounts content
pub fn parse_proc_mounts(content: &str) -> HashMap<PathBuf, String> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount = fields.next()?;
            let fstype = fields.next()?;
            Some((PathBuf::from(unescape_mount(mount)), fstype.to_string()))
        })
        .collect()
}

/// Undo the octal escaping /proc/mounts applies to whitespace
fn unescape_mount(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// Media kind from a sysfs `queue/rotational` flag
pub fn media_from_rotational(flag: &str) -> Option<&'static str> {
    match flag.trim() {
        "0" => Some("SSD"),
        "1" => Some("HDD"),
        _ => None,
    }
}

/// Enumerate mounted volumes that can be benchmarked
pub fn list_volumes() -> Result<Vec<VolumeInfo>> {
    let output = Command::new("df").arg("-kP").output()?;
    if !output.status.success() {
        return Err(DiskSpeedError::IoError(io::Error::other(format!(
            "df exited with {}",
            output.status
        ))));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<DfRow> = parse_df_output(&stdout)
        .into_iter()
        .filter(|row| !is_system_volume(&row.mount_path))
        .collect();
    debug!("df reported {} candidate volumes", rows.len());

    let details = VolumeDetails::load();
    Ok(rows.into_iter().map(|row| details.describe(row)).collect())
}

/// Find the listed volume whose mount point contains `path`
pub fn volume_for_path<'a>(volumes: &'a [VolumeInfo], path: &Path) -> Option<&'a VolumeInfo> {
    volumes
        .iter()
        .filter(|v| path.starts_with(&v.mount_path))
        .max_by_key(|v| v.mount_path.components().count())
}

/// Platform-specific enrichment of `df` rows
struct VolumeDetails {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    mounts: HashMap<PathBuf, String>,
}

impl VolumeDetails {
    fn load() -> Self {
        #[cfg(target_os = "linux")]
        let mounts = match std::fs::read_to_string("/proc/mounts") {
            Ok(content) => parse_proc_mounts(&content),
            Err(e) => {
                warn!("Failed to read /proc/mounts: {}", e);
                HashMap::new()
            }
        };
        #[cfg(not(target_os = "linux"))]
        let mounts = HashMap::new();

        Self { mounts }
    }

    fn describe(&self, row: DfRow) -> VolumeInfo {
        let (media, filesystem) = self.lookup(&row);

        VolumeInfo {
            mount_path: row.mount_path,
            capacity: row.capacity,
            available: row.available,
            device: row.device,
            media_type: media.unwrap_or_else(|| "Unknown".to_string()),
            filesystem: filesystem.unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    #[cfg(target_os = "macos")]
    fn lookup(&self, row: &DfRow) -> (Option<String>, Option<String>) {
        match Command::new("diskutil").arg("info").arg(&row.device).output() {
            Ok(output) if output.status.success() => {
                parse_diskutil_info(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!("diskutil info {} exited with {}", row.device, output.status);
                (None, None)
            }
            Err(e) => {
                warn!("Failed to run diskutil for {}: {}", row.device, e);
                (None, None)
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn lookup(&self, row: &DfRow) -> (Option<String>, Option<String>) {
        let filesystem = self.mounts.get(&row.mount_path).cloned();
        (linux_media_type(&row.device), filesystem)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn lookup(&self, _row: &DfRow) -> (Option<String>, Option<String>) {
        (None, None)
    }
}

/// Partitions have no queue of their own; fall back to the parent disk's
#[cfg(target_os = "linux")]
fn linux_media_type(device: &str) -> Option<String> {
    let name = Path::new(device).file_name()?;
    let entry = Path::new("/sys/class/block").join(name).canonicalize().ok()?;

    [entry.join("queue/rotational"), entry.parent()?.join("queue/rotational")]
        .iter()
        .find_map(|flag| std::fs::read_to_string(flag).ok())
        .and_then(|flag| media_from_rotational(&flag))
        .map(str::to_string)
}

/// Bytes available to unprivileged users on the volume containing `path`
#[cfg(unix)]
pub fn available_space(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: c_path is NUL-terminated and stat is a valid out-parameter
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    #[allow(clippy::unnecessary_cast)]
    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free space query not supported on this platform",
    ))
}

/// Refuse to run anywhere but macOS and Linux
pub fn ensure_supported_platform() -> Result<()> {
    if cfg!(any(target_os = "macos", target_os = "linux")) {
        Ok(())
    } else {
        Err(DiskSpeedError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}

/// External programs this platform needs
pub fn required_tools() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["dd", "df", "diskutil"]
    } else {
        &["dd", "df"]
    }
}

/// Required tools that cannot be found on PATH
pub fn missing_tools() -> Vec<String> {
    required_tools()
        .iter()
        .filter(|tool| find_on_path(tool).is_none())
        .map(|tool| tool.to_string())
        .collect()
}

/// Fail with `MissingTools` when anything required is absent
pub fn ensure_tools_available() -> Result<()> {
    let missing = missing_tools();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DiskSpeedError::MissingTools(missing))
    }
}

pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF_LINUX: &str = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
udev               8110588         0   8110588       0% /dev
/dev/nvme0n1p2   490617784 211844684 253778620      46% /
tmpfs              1631224      2168   1629056       1% /run
/dev/nvme0n1p1      523248      6220    517028       2% /boot/efi
/dev/sdb1       1921802432 104857600 1719268352       6% /mnt/Backup Drive
";

    const DF_MACOS: &str = "\
Filesystem     1024-blocks      Used Available Capacity  Mounted on
/dev/disk3s1s1   971350180  10194272 620189292     2%    /
devfs                  199       199         0   100%    /dev
/dev/disk3s6     971350180   2097172 620189292     1%    /System/Volumes/VM
/dev/disk3s5     971350180 336966144 620189292    36%    /System/Volumes/Data
map auto_home            0         0         0   100%    /System/Volumes/Data/home
/dev/disk5s1     976101344 123456789 852644555    13%    /Volumes/External
";

    #[test]
    fn test_parse_df_linux() {
        let rows = parse_df_output(DF_LINUX);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].device, "/dev/nvme0n1p2");
        assert_eq!(rows[0].mount_path, PathBuf::from("/"));
        assert_eq!(rows[0].capacity, 490617784 * 1024);
        assert_eq!(rows[0].available, 253778620 * 1024);
        assert_eq!(rows[2].mount_path, PathBuf::from("/mnt/Backup Drive"));
    }

    #[test]
    fn test_system_volumes_filtered() {
        let kept: Vec<PathBuf> = parse_df_output(DF_MACOS)
            .into_iter()
            .filter(|row| !is_system_volume(&row.mount_path))
            .map(|row| row.mount_path)
            .collect();

        assert_eq!(
            kept,
            vec![
                PathBuf::from("/"),
                PathBuf::from("/System/Volumes/Data"),
                PathBuf::from("/Volumes/External"),
            ]
        );
        assert!(is_system_volume(Path::new("/boot/efi")));
        assert!(is_system_volume(Path::new("/snap/core/123")));
        assert!(!is_system_volume(Path::new("/snapshots")));
    }

    #[test]
    fn test_parse_diskutil_info() {
        let output = "\
   Device Identifier:         disk3s1
   Mount Point:               /
   File System Personality:   APFS
   Protocol:                  Apple Fabric
   Media Name:                APPLE SSD AP1024Z
   Solid State:               Yes
";
        let (media, filesystem) = parse_diskutil_info(output);
        assert_eq!(media.as_deref(), Some("APPLE SSD AP1024Z (Apple Fabric)"));
        assert_eq!(filesystem.as_deref(), Some("APFS"));

        assert_eq!(parse_diskutil_info("nothing useful"), (None, None));
    }

    #[test]
    fn test_parse_proc_mounts() {
        let content = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sdb1 /mnt/Backup\\040Drive xfs rw,relatime 0 0
";
        let mounts = parse_proc_mounts(content);
        assert_eq!(mounts.get(Path::new("/")).map(String::as_str), Some("ext4"));
        assert_eq!(
            mounts.get(Path::new("/mnt/Backup Drive")).map(String::as_str),
            Some("xfs")
        );
    }

    #[test]
    fn test_media_from_rotational() {
        assert_eq!(media_from_rotational("0\n"), Some("SSD"));
        assert_eq!(media_from_rotational("1"), Some("HDD"));
        assert_eq!(media_from_rotational(""), None);
    }

    #[test]
    fn test_volume_for_path_prefers_deepest_mount() {
        let volume = |mount: &str| VolumeInfo {
            mount_path: PathBuf::from(mount),
            capacity: 0,
            available: 0,
            device: "/dev/x".to_string(),
            media_type: "SSD".to_string(),
            filesystem: "ext4".to_string(),
        };
        let volumes = vec![volume("/"), volume("/mnt/data")];

        let found = volume_for_path(&volumes, Path::new("/mnt/data/bench")).unwrap();
        assert_eq!(found.mount_path, PathBuf::from("/mnt/data"));
        let found = volume_for_path(&volumes, Path::new("/home/user")).unwrap();
        assert_eq!(found.mount_path, PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_available_space_for_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(available_space(dir.path()).is_ok());
        assert!(available_space(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_find_on_path_rejects_unknown_program() {
        assert!(find_on_path("definitely-not-a-real-tool-4821").is_none());
    }

    #[cfg(any(target_os = "macos", target_os = "linux"))]
    #[test]
    fn test_supported_platform() {
        assert!(ensure_supported_platform().is_ok());
    }
}
