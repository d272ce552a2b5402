use std::time::Duration;

use crate::bench::progress::ProgressSnapshot;
use crate::io::runner::PhaseMode;
use crate::models::RoundSample;

/// Receives engine events for presentation
///
/// Every method has an empty default so sinks only implement what they show.
pub trait ProgressSink {
    fn round_started(&mut self, _round: u32, _total_rounds: u32) {}

    fn phase_started(&mut self, _round: u32, _phase: PhaseMode, _total_bytes: u64) {}

    fn progress(&mut self, _phase: PhaseMode, _snapshot: &ProgressSnapshot) {}

    fn phase_finished(&mut self, _round: u32, _phase: PhaseMode, _elapsed: Duration, _mbps: f64) {}

    fn round_finished(&mut self, _sample: &RoundSample) {}
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {}
