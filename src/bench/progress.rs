//! In-flight progress estimation
//!
//! Neither direction exposes true progress from the running `dd`, so each
//! phase uses an estimator:
//!
//! * [`ObservedProgress`] (write) reports the artifact's current size on
//!   disk. The OS may buffer writes, so this can lag the real position.
//! * [`SyntheticProgress`] (read) is a linear interpolation that advances
//!   one step per tick regardless of actual I/O. It exists only to animate
//!   the progress indicator and is not telemetry.
//!
//! Throughput is never derived from these samples; it always comes from the
//! whole phase's wall-clock duration.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Progress of one phase at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes completed, never more than `total_bytes`
    pub bytes_completed: u64,
    /// Phase size
    pub total_bytes: u64,
    /// Time since the phase started
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Create a snapshot, clamping `bytes_completed` to `total_bytes`
    pub fn new(bytes_completed: u64, total_bytes: u64, elapsed: Duration) -> Self {
        Self {
            bytes_completed: bytes_completed.min(total_bytes),
            total_bytes,
            elapsed,
        }
    }

    /// Snapshot of a finished phase
    pub fn complete(total_bytes: u64, elapsed: Duration) -> Self {
        Self::new(total_bytes, total_bytes, elapsed)
    }

    /// Calculate completion percentage (0.0 to 100.0)
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            self.bytes_completed as f64 * 100.0 / self.total_bytes as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_completed >= self.total_bytes
    }
}

/// A per-phase progress source
pub trait ProgressEstimator {
    fn sample(&mut self) -> ProgressSnapshot;
}

/// Reports the artifact's size on disk
#[derive(Debug)]
pub struct ObservedProgress {
    path: PathBuf,
    total: u64,
    started: Instant,
}

impl ObservedProgress {
    pub fn new(path: impl Into<PathBuf>, total: u64, started: Instant) -> Self {
        Self {
            path: path.into(),
            total,
            started,
        }
    }
}

impl ProgressEstimator for ObservedProgress {
    fn sample(&mut self) -> ProgressSnapshot {
        // Not created yet counts as zero
        let on_disk = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        ProgressSnapshot::new(on_disk, self.total, self.started.elapsed())
    }
}

/// Linear interpolation over a fixed number of steps
#[derive(Debug)]
pub struct SyntheticProgress {
    total: u64,
    steps: u32,
    step: u32,
    started: Instant,
}

impl SyntheticProgress {
    pub fn new(total: u64, steps: u32, started: Instant) -> Self {
        Self {
            total,
            steps: steps.max(1),
            step: 0,
            started,
        }
    }
}

impl ProgressEstimator for SyntheticProgress {
    fn sample(&mut self) -> ProgressSnapshot {
        self.step = (self.step + 1).min(self.steps);
        let bytes = (self.total as u128 * self.step as u128 / self.steps as u128) as u64;
        ProgressSnapshot::new(bytes, self.total, self.started.elapsed())
    }
}

/// Tick `estimator` every `interval` and forward non-decreasing snapshots
/// until `stop` fires or the receiver goes away.
pub async fn sample_loop(
    mut estimator: Box<dyn ProgressEstimator + Send>,
    interval: Duration,
    tx: mpsc::Sender<ProgressSnapshot>,
    stop: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut high_water = 0u64;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut snapshot = estimator.sample();
        high_water = high_water.max(snapshot.bytes_completed);
        snapshot.bytes_completed = high_water;

        tokio::select! {
            _ = stop.cancelled() => break,
            sent = tx.send(snapshot) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_clamps_to_total() {
        let snapshot = ProgressSnapshot::new(2048, 1024, Duration::from_secs(1));
        assert_eq!(snapshot.bytes_completed, 1024);
        assert!(snapshot.is_complete());
        assert!((snapshot.percent() - 100.0).abs() < f64::EPSILON);

        let half = ProgressSnapshot::new(512, 1024, Duration::ZERO);
        assert!((half.percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_synthetic_progress_is_linear_and_clamped() {
        let mut estimator = SyntheticProgress::new(1000, 4, Instant::now());
        let samples: Vec<u64> = (0..6).map(|_| estimator.sample().bytes_completed).collect();
        assert_eq!(samples, vec![250, 500, 750, 1000, 1000, 1000]);
    }

    #[test]
    fn test_observed_progress_tracks_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artifact.tmp");
        let mut estimator = ObservedProgress::new(&path, 100, Instant::now());

        assert_eq!(estimator.sample().bytes_completed, 0);

        std::fs::write(&path, vec![0u8; 40]).unwrap();
        assert_eq!(estimator.sample().bytes_completed, 40);

        std::fs::write(&path, vec![0u8; 150]).unwrap();
        assert_eq!(estimator.sample().bytes_completed, 100);
    }

    /// Emits a scripted, non-monotonic sequence
    struct Scripted(Vec<u64>);

    impl ProgressEstimator for Scripted {
        fn sample(&mut self) -> ProgressSnapshot {
            let bytes = if self.0.is_empty() { 0 } else { self.0.remove(0) };
            ProgressSnapshot::new(bytes, 100, Duration::ZERO)
        }
    }

    #[tokio::test]
    async fn test_sample_loop_is_monotonic() {
        let (tx, mut rx) = mpsc::channel(16);
        let stop = CancellationToken::new();
        let estimator = Box::new(Scripted(vec![10, 30, 20, 50, 40]));

        let sampler = tokio::spawn(sample_loop(
            estimator,
            Duration::from_millis(1),
            tx,
            stop.clone(),
        ));

        let mut seen = Vec::new();
        while seen.len() < 5 {
            seen.push(rx.recv().await.unwrap().bytes_completed);
        }
        stop.cancel();
        sampler.await.unwrap();

        assert_eq!(seen, vec![10, 30, 30, 50, 50]);
    }

    #[tokio::test]
    async fn test_sample_loop_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let estimator = Box::new(SyntheticProgress::new(100, 10, Instant::now()));

        // Would never return if a closed channel were ignored
        sample_loop(estimator, Duration::from_millis(1), tx, CancellationToken::new()).await;
    }
}
