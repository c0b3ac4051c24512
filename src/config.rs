use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Env var that overrides where the config file is read from.
pub const CONFIG_ENV: &str = "PCSGU_SAVER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "pcsgu_saver.json";
/// ~3 hours of frames at 1 Hz.
pub const DEFAULT_RAW_ROTATE_RECORDS: u32 = 10_800;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("raw_rotate_records must be greater than zero")]
    ZeroRotation,
    #[error("idle_tick_ms must be greater than zero")]
    ZeroIdleTick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Driver,
    Simulation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub source: SourceKind,
    pub driver_library: String,
    pub idle_sleep_ms: u64,
    pub idle_tick_ms: u64,
    pub raw_rotate_records: u32,
    pub simulation_interval_ms: u64,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            source: SourceKind::Driver,
            driver_library: "PCSGU250.dll".to_string(),
            idle_sleep_ms: 1,
            idle_tick_ms: 16_384,
            raw_rotate_records: DEFAULT_RAW_ROTATE_RECORDS,
            simulation_interval_ms: 1000,
            log_file: PathBuf::from("pcsgu_saver.log"),
        }
    }
}

impl Config {
    /// Read the config from `$PCSGU_SAVER_CONFIG` or the default file; a missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw_rotate_records == 0 {
            return Err(ConfigError::ZeroRotation);
        }
        if self.idle_tick_ms == 0 {
            return Err(ConfigError::ZeroIdleTick);
        }
        Ok(())
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms)
    }
}
