use crate::config::Config;
use crate::global;
use anyhow::{Context, Result};

pub mod args;
pub mod duration;

pub use args::{Cli, CliCommand};
pub use duration::{parse_duration, DurationParseError};

pub fn handle_config_command() -> Result<()> {
    let path = global::config_file()?;
    let config = Config::load()?;
    let rendered = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    println!("Config file: {}", path.display());
    println!();
    print!("{}", rendered);

    Ok(())
}
