//! Interactive collection of the combined hourly rate.

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::meter::stop_watch::is_token;

/// Prompts for one hourly rate per participant and returns their sum.
///
/// Collection ends at the stop token or at end of input. Entries that are not
/// non-negative numbers are reported and asked for again.
pub async fn collect_rate<R, W>(input: &mut R, output: &mut W, stop_token: &str) -> Result<f64>
where
    R: AsyncBufRead + Unpin,
    W: Write + ?Sized,
{
    let mut total = 0.0;
    let mut participants = 0usize;
    let mut line = String::new();

    writeln!(
        output,
        "Please enter the hourly rates of all participants, one at a time. ie. 150 OR 1000.50"
    )?;

    loop {
        writeln!(output, "Please enter the hourly rate of the next participant")?;
        writeln!(
            output,
            "If all meeting participants are accounted for, type {} and press enter to move on.",
            stop_token
        )?;
        output.flush()?;

        line.clear();
        let read = input
            .read_line(&mut line)
            .await
            .context("Failed to read hourly rate")?;
        if read == 0 {
            debug!("Input closed during rate collection");
            break;
        }
        if is_token(&line, stop_token) {
            break;
        }

        let entry = line.trim();
        match parse_rate(entry) {
            Some(rate) => {
                total += rate;
                participants += 1;
            }
            None => {
                writeln!(output, "Sorry, didn't understand {}. Please try again.", entry)?;
            }
        }
    }

    debug!(
        "Collected hourly rate {} from {} participant(s)",
        total, participants
    );
    Ok(total)
}

fn parse_rate(entry: &str) -> Option<f64> {
    entry
        .parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate >= 0.0)
}
