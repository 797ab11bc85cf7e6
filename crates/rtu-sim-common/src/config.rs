//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the simulator runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use strum::{Display, EnumString};
use tracing::debug;

use crate::logging::LogFormat;

/// Source tag printed in every emission line.
pub const DEFAULT_SOURCE_TAG: &str = "TCP_Client.py:171";

fn default_devices() -> IndexMap<String, DeviceConfig> {
    let mut devices = IndexMap::new();
    devices.insert(
        "INVERTER".to_owned(),
        DeviceConfig::new("data/hybrid_sim_2000.txt"),
    );
    devices.insert("BMS".to_owned(), DeviceConfig::new("data/bms_sim_2000.txt"));
    devices.insert(
        "SENSOR".to_owned(),
        DeviceConfig::new("data/sensor_sim_2000.txt"),
    );
    devices
}

fn default_log_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_response_delay_min() -> Duration {
    Duration::from_millis(200)
}

fn default_response_delay_max() -> Duration {
    Duration::from_millis(500)
}

fn default_seed() -> u64 {
    0xB175u64
}

fn default_source_tag() -> String {
    DEFAULT_SOURCE_TAG.to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub max_cycles: Option<u64>,
    #[serde(default = "default_devices")]
    pub devices: IndexMap<String, DeviceConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`SimulatorConfig`] was loaded from.
///
/// `source` is `None` when no file was found and the built-in defaults apply.
#[derive(Debug, Clone)]
pub struct LoadedSimulatorConfig {
    pub config: SimulatorConfig,
    pub source: Option<PathBuf>,
}

impl SimulatorConfig {
    pub const ENV_CONFIG_PATH: &str = "RTU_SIM_CONFIG";

    /// Load configuration together with its source, respecting the `RTU_SIM_CONFIG` override.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedSimulatorConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedSimulatorConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedSimulatorConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!(
            inspected = candidates.len(),
            "no configuration file found; using built-in defaults"
        );
        Ok(LoadedSimulatorConfig {
            config: Self::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<SimulatorConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a device configuration by name.
    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.get(name)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(anyhow!("configuration must contain at least one device"));
        }
        for (name, device) in &self.devices {
            device.validate(name)?;
        }
        self.timing.validate()?;
        if self.output.source_tag.trim().is_empty() {
            return Err(anyhow!("output source_tag cannot be empty"));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            devices: default_devices(),
            timing: TimingConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for SimulatorConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: SimulatorConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// A single simulated field device and the script it replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub path: PathBuf,
    /// Probability that a cycle's response is withheld.
    #[serde(default)]
    pub tx_drop_probability: f64,
}

impl DeviceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tx_drop_probability: 0.0,
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("device names cannot be empty"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(anyhow!("device '{}' must declare a script path", name));
        }
        if !(0.0..=1.0).contains(&self.tx_drop_probability) {
            return Err(anyhow!(
                "device '{}' tx_drop_probability {} must be within [0, 1]",
                name,
                self.tx_drop_probability
            ));
        }
        Ok(())
    }
}

/// How the response delay is chosen within its configured range.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DelayMode {
    #[default]
    Midpoint,
    Uniform,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause after each response before the next request.
    #[serde(default = "default_log_interval")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub log_interval: Duration,
    #[serde(default = "default_response_delay_min")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub response_delay_min: Duration,
    #[serde(default = "default_response_delay_max")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub response_delay_max: Duration,
    #[serde(default)]
    pub delay_mode: DelayMode,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl TimingConfig {
    /// Midpoint of the response delay range.
    pub fn response_delay_midpoint(&self) -> Duration {
        let span = self
            .response_delay_max
            .saturating_sub(self.response_delay_min);
        self.response_delay_min + span / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_interval.is_zero() {
            return Err(anyhow!("timing log_interval must be greater than zero"));
        }
        if self.response_delay_min > self.response_delay_max {
            return Err(anyhow!(
                "timing response_delay_min ({:?}) exceeds response_delay_max ({:?})",
                self.response_delay_min,
                self.response_delay_max
            ));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            log_interval: default_log_interval(),
            response_delay_min: default_response_delay_min(),
            response_delay_max: default_response_delay_max(),
            delay_mode: DelayMode::default(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            source_tag: default_source_tag(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
