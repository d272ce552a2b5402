//! Terminal rendering of engine events with `indicatif`.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::bench::progress::ProgressSnapshot;
use crate::bench::sink::ProgressSink;
use crate::io::runner::PhaseMode;
use crate::models::RoundSample;
use crate::util::units::{calculate_throughput_mbps, format_duration, format_mbps};

const BAR_TEMPLATE: &str = "{prefix:>6} [{bar:40.cyan/blue}] {percent:>3}% {msg}";

/// Instantaneous throughput implied by a snapshot
pub fn instantaneous_mbps(snapshot: &ProgressSnapshot) -> f64 {
    calculate_throughput_mbps(snapshot.bytes_completed, snapshot.elapsed)
}

/// Remaining time extrapolated from the fraction done so far
pub fn estimate_remaining(snapshot: &ProgressSnapshot) -> Option<Duration> {
    let percent = snapshot.percent();
    if percent <= 0.0 {
        return None;
    }
    Some(snapshot.elapsed.mul_f64((100.0 - percent).max(0.0) / percent))
}

/// Draws one progress bar per phase
pub struct ConsoleSink {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            bar: None,
            hidden: false,
        }
    }

    /// Sink that tracks state without drawing, for non-terminal use
    pub fn hidden() -> Self {
        Self {
            bar: None,
            hidden: true,
        }
    }

    fn new_bar(&self, total_bytes: u64) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::with_draw_target(Some(total_bytes), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(total_bytes)
        };
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░ ");
        bar.set_style(style);
        bar
    }

    fn say(&self, line: String) {
        if !self.hidden {
            println!("{}", line);
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn round_started(&mut self, round: u32, total_rounds: u32) {
        self.say(format!("\nRound {}/{}", round, total_rounds));
    }

    fn phase_started(&mut self, _round: u32, phase: PhaseMode, total_bytes: u64) {
        let bar = self.new_bar(total_bytes);
        bar.set_prefix(phase.description());
        self.bar = Some(bar);
    }

    fn progress(&mut self, _phase: PhaseMode, snapshot: &ProgressSnapshot) {
        let Some(bar) = &self.bar else {
            return;
        };

        bar.set_position(snapshot.bytes_completed);
        let eta = estimate_remaining(snapshot)
            .map(format_duration)
            .unwrap_or_else(|| "--".to_string());
        bar.set_message(format!(
            "{}  ETA {}",
            format_mbps(instantaneous_mbps(snapshot)),
            eta
        ));
    }

    fn phase_finished(&mut self, _round: u32, _phase: PhaseMode, elapsed: Duration, mbps: f64) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} in {}", format_mbps(mbps), format_duration(elapsed)));
        }
    }

    fn round_finished(&mut self, sample: &RoundSample) {
        self.say(format!(
            "Round {} done: write {}, read {}",
            sample.round,
            format_mbps(sample.write_mbps),
            format_mbps(sample.read_mbps)
        ));
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        // Leave the terminal tidy if a phase was interrupted
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}
