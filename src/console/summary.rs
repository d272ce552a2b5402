use std::fmt;

use crate::models::AggregateResult;
use crate::util::units::format_mbps;

/// Final results table with averages and a tier per direction
pub struct Summary<'a>(pub &'a AggregateResult);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;

        writeln!(f, "\nResults")?;
        writeln!(f, "{:<8} {:>16} {:>16}", "Round", "Write", "Read")?;
        for sample in &result.samples {
            writeln!(
                f,
                "{:<8} {:>16} {:>16}",
                sample.round,
                format_mbps(sample.write_mbps),
                format_mbps(sample.read_mbps)
            )?;
        }
        writeln!(
            f,
            "{:<8} {:>16} {:>16}",
            "Average",
            format_mbps(result.average_write_mbps),
            format_mbps(result.average_read_mbps)
        )?;

        let write_tier = result.write_tier();
        let read_tier = result.read_tier();
        writeln!(f, "\nWrite performance: {} ({})", write_tier.label(), write_tier.range())?;
        writeln!(f, "Read performance:  {} ({})", read_tier.label(), read_tier.range())
    }
}
