use clap::{Parser, Subcommand};
use std::time::Duration;

use super::duration::parse_duration;

#[derive(Parser, Debug)]
#[command(name = "meter")]
#[command(about = "Shows what a meeting costs, optionally as a running total", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Combined hourly rate of all participants, e.g. 100 or 9.95.
    /// Prompted for when omitted
    #[arg(short, long)]
    pub rate: Option<f64>,

    /// Expected meeting duration, e.g. 1h or 150m
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Show the running cost every interval, e.g. 2s or 5m
    #[arg(short, long, value_parser = parse_duration)]
    pub ticks: Option<Duration>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Show the configuration file location and effective settings
    Config,
}
