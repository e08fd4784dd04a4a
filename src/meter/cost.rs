//! Cost calculation and the text rendering of a cost snapshot.

use std::io::{self, Write};
use std::time::Duration;

/// Prefix of every rendered cost line.
pub const COST_LABEL: &str = "The total current cost of this meeting is";

const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;

/// Cost of `elapsed` time at `hourly_rate` currency units per hour.
///
/// Fractional seconds count, so very short durations produce proportionally
/// small amounts. No rounding happens here.
pub fn cost(hourly_rate: f64, elapsed: Duration) -> f64 {
    let rate_per_second = hourly_rate / SECONDS_PER_HOUR;
    rate_per_second * elapsed.as_secs_f64()
}

/// Renders an amount with exactly two decimal places behind the label.
pub fn format_cost(amount: f64) -> String {
    format!("{COST_LABEL} ${amount:.2}")
}

/// Writes one cost line to `output`.
pub fn display_cost<W: Write + ?Sized>(output: &mut W, amount: f64) -> io::Result<()> {
    writeln!(output, "{}", format_cost(amount))
}
