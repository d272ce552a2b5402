//! Best-effort file-system cache invalidation before each measurement.

use std::future::Future;

use tracing::debug;

/// Asks the OS to drop cached file data. Never fails.
pub trait CacheInvalidator {
    /// Must be cancel-safe: dropping the future abandons the purge.
    fn purge(&self) -> impl Future<Output = ()> + Send;
}

/// Uses the platform's own cache-drop mechanism
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCachePurger;

impl SystemCachePurger {
    pub fn new() -> Self {
        Self
    }
}

impl CacheInvalidator for SystemCachePurger {
    async fn purge(&self) {
        if let Err(reason) = purge_platform_cache().await {
            debug!("cache purge skipped: {}", reason);
        }
    }
}

#[cfg(target_os = "macos")]
async fn purge_platform_cache() -> Result<(), String> {
    // -n: never prompt for a password, fail instead
    run_quiet("sudo", &["-n", "purge"]).await
}

#[cfg(target_os = "linux")]
async fn purge_platform_cache() -> Result<(), String> {
    run_quiet("sync", &[]).await?;
    tokio::fs::write("/proc/sys/vm/drop_caches", b"3")
        .await
        .map_err(|e| format!("drop_caches: {}", e))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
async fn purge_platform_cache() -> Result<(), String> {
    Err("no cache purge mechanism on this platform".to_string())
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
async fn run_quiet(program: &str, args: &[&str]) -> Result<(), String> {
    use std::process::Stdio;
    use tokio::process::Command;

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| format!("{}: {}", program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("{} exited with {}", program, status))
    }
}
