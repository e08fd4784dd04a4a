//! Wires the command line, configuration and terminal streams to the meter.

use crate::cli::Cli;
use crate::config::Config;
use crate::global;
use crate::meter::{cost, display_cost, StopStrategy, Ticker, TickerError};
use crate::rate::collect_rate;
use anyhow::{bail, Result};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, info, warn};

/// Settings for one meter run, merged from the command line and config file.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterOptions {
    pub rate: Option<f64>,
    pub duration: Option<Duration>,
    pub ticks: Option<Duration>,
    pub stop_token: String,
}

impl MeterOptions {
    /// Command line values win over config file defaults.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let ticks = match cli.ticks {
            Some(ticks) => Some(ticks),
            None => config.meter.default_ticks()?,
        };

        Ok(Self {
            rate: cli.rate.or(config.meter.default_rate),
            duration: cli.duration,
            ticks,
            stop_token: config.input.stop_token.clone(),
        })
    }

    /// Rejects settings that cannot produce a result, before anything is
    /// read or written.
    fn validate(&self) -> Result<()> {
        if let Some(rate) = self.rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(TickerError::InvalidRate(rate).into());
            }
        }
        match self.ticks {
            Some(ticks) if ticks.is_zero() => Err(TickerError::InvalidInterval.into()),
            Some(_) => Ok(()),
            None if self.duration.is_none() => {
                bail!("A meeting duration is required unless --ticks is given (e.g. --duration=1h)")
            }
            None => Ok(()),
        }
    }
}

pub async fn run_cli(cli: &Cli) -> Result<()> {
    let config = match global::config_file() {
        Ok(path) => Config::load_from(&path)?,
        Err(e) => {
            warn!("{}; using default settings", e);
            Config::default()
        }
    };

    let options = MeterOptions::resolve(cli, &config)?;
    let input = BufReader::new(tokio::io::stdin());
    run_meter(options, input, std::io::stdout()).await?;
    Ok(())
}

/// Runs the meter against the given streams and returns the output once done.
///
/// Without a rate the rates are collected from `input` first. With a tick
/// interval the running cost is written every interval until the duration
/// passes or, without a duration, until the stop token is read from `input`.
/// Otherwise the projected cost of the whole duration is written once.
pub async fn run_meter<R, W>(options: MeterOptions, mut input: R, mut output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write + Send + 'static,
{
    options.validate()?;

    let rate = match options.rate {
        Some(rate) if rate > 0.0 => rate,
        _ => collect_rate(&mut input, &mut output, &options.stop_token).await?,
    };
    debug!("Using hourly rate {}", rate);

    let Some(interval) = options.ticks else {
        let duration = options.duration.unwrap_or_default();
        info!("Projecting cost of a {:?} meeting", duration);
        display_cost(&mut output, cost(rate, duration))?;
        output.flush()?;
        return Ok(output);
    };

    let strategy = StopStrategy::from_target(options.duration, input, options.stop_token.as_str());
    if let StopStrategy::Sentinel { token, .. } = &strategy {
        writeln!(output, "Meeting started. Type {} and press enter to end it.", token)?;
        output.flush()?;
    }

    let output = Ticker::builder(rate, interval, output)
        .strategy(strategy)
        .build()?
        .run()
        .await?;
    Ok(output)
}
