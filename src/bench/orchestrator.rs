//! Benchmark orchestrator
//!
//! Pre-checks free space, drives the configured number of rounds one at a
//! time, and aggregates the samples. Any failure aborts the run after a
//! final cleanup of the artifact; no partial aggregate is ever returned.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bench::round::{remove_artifact, RoundController};
use crate::bench::sink::ProgressSink;
use crate::config::{BenchmarkConfig, BenchmarkSettings};
use crate::io::cache::CacheInvalidator;
use crate::io::runner::IoRunner;
use crate::io::volume::available_space;
use crate::models::AggregateResult;
use crate::{DiskSpeedError, Result, TEMP_FILE_PREFIX};

/// Runs complete benchmarks with a given runner and cache purger
pub struct BenchmarkOrchestrator<R, C> {
    runner: R,
    purger: C,
    settings: BenchmarkSettings,
}

impl<R, C> BenchmarkOrchestrator<R, C>
where
    R: IoRunner,
    C: CacheInvalidator,
{
    /// Create a new orchestrator
    pub fn new(runner: R, purger: C, settings: BenchmarkSettings) -> Self {
        Self {
            runner,
            purger,
            settings,
        }
    }

    pub fn settings(&self) -> &BenchmarkSettings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn purger(&self) -> &C {
        &self.purger
    }

    /// Run every round against `config` and aggregate the samples
    pub async fn run<S>(
        &self,
        config: &BenchmarkConfig,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult>
    where
        S: ProgressSink + ?Sized,
    {
        config.validate()?;
        self.settings.validate()?;

        let available = available_space(&config.target_path)?;
        ensure_free_space(available, config.target_size, self.settings.space_margin)?;

        let artifact = artifact_path(&config.target_path);
        let rounds = self.settings.rounds;
        info!(
            "Benchmarking {} with {} bytes over {} rounds",
            config.target_path.display(),
            config.target_size,
            rounds
        );

        let controller = RoundController::new(
            &self.runner,
            &self.purger,
            &self.settings,
            &artifact,
            config.target_size,
            cancel,
        );

        let mut samples = Vec::with_capacity(rounds as usize);
        for round in 1..=rounds {
            sink.round_started(round, rounds);

            let sample = match controller.run(round, sink).await {
                Ok(sample) => sample,
                Err(e) => {
                    force_cleanup(&artifact);
                    return Err(e);
                }
            };
            sink.round_finished(&sample);
            samples.push(sample);

            if round < rounds {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!("Benchmark interrupted between rounds");
                        force_cleanup(&artifact);
                        return Err(DiskSpeedError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.settings.round_delay) => {}
                }
            }
        }

        Ok(AggregateResult::from_samples(samples))
    }
}

/// Fail unless `available` covers `size * margin` bytes
pub fn ensure_free_space(available: u64, size: u64, margin: u64) -> Result<()> {
    let required = size.saturating_mul(margin);
    if available >= required {
        Ok(())
    } else {
        Err(DiskSpeedError::InsufficientSpace {
            required,
            available,
        })
    }
}

/// Unique artifact path inside `target`
pub fn artifact_path(target: &Path) -> PathBuf {
    target.join(format!(
        "{}{}_{}.tmp",
        TEMP_FILE_PREFIX,
        std::process::id(),
        Local::now().timestamp_millis()
    ))
}

/// Remove the artifact after an aborted run, even if the round already did
pub fn force_cleanup(artifact: &Path) {
    if remove_artifact(artifact) {
        warn!("Removed leftover {}", artifact.display());
    }
}
