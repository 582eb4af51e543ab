use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

const APP_DIR: &str = "confab";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub encoder: EncoderConfig,
    pub visualizer: VisualizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mix bus sample rate in Hz.
    pub sample_rate: u32,
    /// How often the routing graph drains its sources, in milliseconds.
    pub pump_interval_ms: u64,
    /// Elapsed-time tick cadence, in milliseconds.
    pub clock_tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            pump_interval_ms: 50,
            clock_tick_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Chunk emission timeslice, in milliseconds.
    pub timeslice_ms: u64,
    /// Containers to try, in preference order.
    pub preferred_formats: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 1_000,
            preferred_formats: vec!["audio/wav".to_string(), "audio/L16".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Frame cadence, in milliseconds (~30fps by default).
    pub frame_interval_ms: u64,
    /// FFT window size for the spectrum. Must be a power of two.
    pub fft_size: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            fft_size: 256,
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_DIR));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }
    anyhow::bail!("Unable to determine data directory")
}

pub fn recordings_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("recordings"))
}

impl Config {
    /// Load configuration from the user config file, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_file()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {path:?}"))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}
