use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

/// Direction of a phase measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseMode {
    /// Generate `size` bytes into the artifact and force them to stable storage
    Write,
    /// Read the artifact end-to-end and discard the content
    Read,
}

impl PhaseMode {
    pub fn description(&self) -> &'static str {
        match self {
            PhaseMode::Write => "Write",
            PhaseMode::Read => "Read",
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// How an external operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    /// Exit code, when the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, when the process was killed
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "terminated by signal {}", signal),
            (None, None) => write!(f, "terminated abnormally"),
        }
    }
}

/// Launches one bulk sequential copy per phase
pub trait IoRunner {
    type Handle: PhaseHandle;

    /// Start the operation. An error here means the operation never ran.
    fn start(&self, mode: PhaseMode, artifact: &Path, size: u64) -> io::Result<Self::Handle>;
}

/// A running external operation
pub trait PhaseHandle: Send {
    /// Whether the operation is still in flight
    fn is_running(&mut self) -> bool;

    /// Wait for the operation to finish. Must be cancel-safe.
    fn wait(&mut self) -> impl Future<Output = io::Result<ExitOutcome>> + Send;

    /// Terminate the operation abruptly and reap it
    fn kill(&mut self) -> impl Future<Output = ()> + Send;
}

/// Runs phases through the system `dd`
#[derive(Debug, Clone)]
pub struct DdRunner {
    program: PathBuf,
}

impl DdRunner {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("dd"),
        }
    }

    /// Use a specific `dd` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for DdRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRunner for DdRunner {
    type Handle = DdHandle;

    fn start(&self, mode: PhaseMode, artifact: &Path, size: u64) -> io::Result<DdHandle> {
        let child = Command::new(&self.program)
            .args(dd_args(mode, artifact, size)?)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(DdHandle { child })
    }
}

/// Handle to a running `dd` child
#[derive(Debug)]
pub struct DdHandle {
    child: Child,
}

impl PhaseHandle for DdHandle {
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn wait(&mut self) -> io::Result<ExitOutcome> {
        let status = self.child.wait().await?;
        Ok(ExitOutcome::from(status))
    }

    async fn kill(&mut self) {
        // Already-exited children report an error here; nothing to do then
        let _ = self.child.kill().await;
    }
}

/// Smallest block `dd` is ever asked to move; sizes must be a multiple of it
pub const MIN_BLOCK_SIZE: u64 = 512;

/// Largest transfer block that divides `size` exactly, so `count * bs == size`
pub fn block_size_for(size: u64) -> Option<u64> {
    const CANDIDATES: [u64; 4] = [1024 * 1024, 64 * 1024, 4 * 1024, MIN_BLOCK_SIZE];
    CANDIDATES.into_iter().find(|block| size % block == 0)
}

/// Operands for one `dd` invocation
pub fn dd_args(mode: PhaseMode, artifact: &Path, size: u64) -> io::Result<Vec<OsString>> {
    let block = block_size_for(size).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("size {} is not a multiple of {} bytes", size, MIN_BLOCK_SIZE),
        )
    })?;

    let operand = |key: &str, value: &std::ffi::OsStr| {
        let mut arg = OsString::from(key);
        arg.push(value);
        arg
    };

    Ok(match mode {
        PhaseMode::Write => vec![
            operand("if=", "/dev/zero".as_ref()),
            operand("of=", artifact.as_os_str()),
            OsString::from(format!("bs={}", block)),
            OsString::from(format!("count={}", size / block)),
            OsString::from("conv=fsync"),
        ],
        PhaseMode::Read => vec![
            operand("if=", artifact.as_os_str()),
            operand("of=", "/dev/null".as_ref()),
            OsString::from(format!("bs={}", block)),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_for() {
        assert_eq!(block_size_for(1024 * 1024 * 1024), Some(1024 * 1024));
        assert_eq!(block_size_for(3 * 64 * 1024), Some(64 * 1024));
        assert_eq!(block_size_for(4096 * 3), Some(4096));
        assert_eq!(block_size_for(1536), Some(512));
        assert_eq!(block_size_for(1000), None);
    }

    #[test]
    fn test_write_args_force_durability() {
        let args = dd_args(PhaseMode::Write, Path::new("/vol/t.tmp"), 5 * 1024 * 1024).unwrap();
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["if=/dev/zero", "of=/vol/t.tmp", "bs=1048576", "count=5", "conv=fsync"]
        );
    }

    #[test]
    fn test_read_args() {
        let args = dd_args(PhaseMode::Read, Path::new("/vol/t.tmp"), 1536).unwrap();
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["if=/vol/t.tmp", "of=/dev/null", "bs=512"]);
    }

    #[test]
    fn test_unaligned_size_is_rejected() {
        let err = dd_args(PhaseMode::Write, Path::new("/vol/t.tmp"), 100_000_000 + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_cli_sizes_always_use_whole_mebibyte_blocks() {
        for input in ["1g", "5g", "10g", "100MB", "250MB", "1.5GB", "2000100B", "64MiB"] {
            let size = crate::config::resolve_size(input).unwrap();
            let args = dd_args(PhaseMode::Write, Path::new("/vol/t.tmp"), size).unwrap();
            let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

            assert_eq!(args[2], "bs=1048576", "{input}");
            assert_eq!(args[3], format!("count={}", size / (1024 * 1024)), "{input}");
        }
    }

    #[test]
    fn test_exit_outcome_display() {
        assert!(ExitOutcome::from_code(0).success());
        assert!(!ExitOutcome::from_code(1).success());
        assert_eq!(ExitOutcome::from_code(2).to_string(), "exit code 2");

        let killed = ExitOutcome {
            code: None,
            signal: Some(9),
        };
        assert!(!killed.success());
        assert_eq!(killed.to_string(), "terminated by signal 9");
    }

    #[tokio::test]
    async fn test_spawn_error_for_missing_program() {
        let runner = DdRunner::with_program("/nonexistent/definitely-not-dd");
        let result = runner.start(PhaseMode::Write, Path::new("/tmp/x"), 1024);
        assert!(result.is_err());
    }
}
