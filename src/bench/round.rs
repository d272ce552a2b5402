//! Round controller
//!
//! One round is a purge, a write phase, another purge, a read phase and
//! deletion of the artifact. Cleanup runs on every exit path out of
//! [`RoundController::run`].

use std::fmt;
use std::io;
use std::path::Path;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bench::progress::{
    sample_loop, ObservedProgress, ProgressEstimator, ProgressSnapshot, SyntheticProgress,
};
use crate::bench::sink::ProgressSink;
use crate::config::BenchmarkSettings;
use crate::io::cache::CacheInvalidator;
use crate::io::runner::{IoRunner, PhaseHandle, PhaseMode};
use crate::models::RoundSample;
use crate::util::units::calculate_throughput_mbps;
use crate::{DiskSpeedError, FailureReason, Result};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Where a round is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    PendingPurge,
    Writing,
    WriteDone,
    PendingPurge2,
    Reading,
    ReadDone,
    Cleanup,
    Complete,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::PendingPurge => "pending purge",
            RoundState::Writing => "writing",
            RoundState::WriteDone => "write done",
            RoundState::PendingPurge2 => "pending purge (read)",
            RoundState::Reading => "reading",
            RoundState::ReadDone => "read done",
            RoundState::Cleanup => "cleanup",
            RoundState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Runs single write+read rounds against one artifact path
pub struct RoundController<'a, R, C> {
    runner: &'a R,
    purger: &'a C,
    settings: &'a BenchmarkSettings,
    artifact: &'a Path,
    size: u64,
    cancel: &'a CancellationToken,
}

impl<'a, R, C> RoundController<'a, R, C>
where
    R: IoRunner,
    C: CacheInvalidator,
{
    pub fn new(
        runner: &'a R,
        purger: &'a C,
        settings: &'a BenchmarkSettings,
        artifact: &'a Path,
        size: u64,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            runner,
            purger,
            settings,
            artifact,
            size,
            cancel,
        }
    }

    /// Run one round. The artifact is gone when this returns, whatever the outcome.
    pub async fn run<S>(&self, round: u32, sink: &mut S) -> Result<RoundSample>
    where
        S: ProgressSink + ?Sized,
    {
        let measured = self.measure(round, sink).await;

        enter(round, RoundState::Cleanup);
        remove_artifact(self.artifact);

        let (write_mbps, read_mbps) = measured?;
        enter(round, RoundState::Complete);

        Ok(RoundSample {
            round,
            write_mbps,
            read_mbps,
        })
    }

    async fn measure<S>(&self, round: u32, sink: &mut S) -> Result<(f64, f64)>
    where
        S: ProgressSink + ?Sized,
    {
        enter(round, RoundState::PendingPurge);
        self.purge().await?;
        enter(round, RoundState::Writing);
        let write_mbps = self.phase(round, PhaseMode::Write, sink).await?;
        enter(round, RoundState::WriteDone);

        enter(round, RoundState::PendingPurge2);
        self.purge().await?;
        enter(round, RoundState::Reading);
        let read_mbps = self.phase(round, PhaseMode::Read, sink).await?;
        enter(round, RoundState::ReadDone);

        Ok((write_mbps, read_mbps))
    }

    async fn purge(&self) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DiskSpeedError::Cancelled),
            _ = self.purger.purge() => Ok(()),
        }
    }

    /// Run one phase and return its throughput in MB/s
    async fn phase<S>(&self, round: u32, phase: PhaseMode, sink: &mut S) -> Result<f64>
    where
        S: ProgressSink + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(DiskSpeedError::Cancelled);
        }

        sink.phase_started(round, phase, self.size);
        let started = Instant::now();

        let mut handle = self
            .runner
            .start(phase, self.artifact, self.size)
            .map_err(|e| measurement_failure(round, phase, FailureReason::Spawn(e.to_string())))?;

        let estimator: Box<dyn ProgressEstimator + Send> = match phase {
            PhaseMode::Write => Box::new(ObservedProgress::new(self.artifact, self.size, started)),
            PhaseMode::Read => Box::new(SyntheticProgress::new(
                self.size,
                self.settings.synthetic_steps,
                started,
            )),
        };

        let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let stop = self.cancel.child_token();
        let sampler = tokio::spawn(sample_loop(
            estimator,
            self.settings.sample_interval,
            tx,
            stop.clone(),
        ));

        let outcome = {
            let wait = handle.wait();
            tokio::pin!(wait);

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break None,
                    outcome = &mut wait => break Some(outcome),
                    Some(snapshot) = rx.recv() => sink.progress(phase, &snapshot),
                }
            }
        };
        let elapsed = started.elapsed();

        stop.cancel();
        drop(rx);
        if let Err(e) = sampler.await {
            debug!("progress sampler ended abnormally: {}", e);
        }

        let outcome = match outcome {
            None => {
                warn!("Round {} {} phase interrupted; stopping dd", round, phase);
                handle.kill().await;
                return Err(DiskSpeedError::Cancelled);
            }
            Some(Err(e)) => {
                handle.kill().await;
                return Err(measurement_failure(round, phase, FailureReason::Wait(e.to_string())));
            }
            Some(Ok(outcome)) => outcome,
        };

        if !outcome.success() {
            return Err(measurement_failure(round, phase, FailureReason::Exit(outcome)));
        }

        sink.progress(phase, &ProgressSnapshot::complete(self.size, elapsed));

        let mbps = calculate_throughput_mbps(self.size, elapsed);
        info!(
            "Round {} {}: {} bytes in {:.3}s ({:.2} MB/s)",
            round,
            phase,
            self.size,
            elapsed.as_secs_f64(),
            mbps
        );
        sink.phase_finished(round, phase, elapsed, mbps);

        Ok(mbps)
    }
}

fn enter(round: u32, state: RoundState) {
    debug!("round {}: {}", round, state);
}

fn measurement_failure(round: u32, phase: PhaseMode, reason: FailureReason) -> DiskSpeedError {
    DiskSpeedError::MeasurementFailure {
        round,
        phase,
        reason,
    }
}

/// Delete the artifact if present. Returns whether a file was removed.
///
/// Missing files are fine; any other failure is logged and ignored.
pub fn remove_artifact(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
