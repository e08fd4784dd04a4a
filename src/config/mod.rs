use crate::cli::parse_duration;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub meter: MeterConfig,
    pub input: InputConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Combined hourly rate used when `--rate` is not given.
    pub default_rate: Option<f64>,
    /// Tick interval used when `--ticks` is not given, e.g. "5s".
    pub default_ticks: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Line that ends rate entry and, without a duration, the running meter.
    pub stop_token: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            stop_token: "q".to_string(),
        }
    }
}

impl MeterConfig {
    pub fn default_ticks(&self) -> Result<Option<Duration>> {
        self.default_ticks
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid meter.default_ticks in config file")
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
