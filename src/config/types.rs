//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::listen::ListenConfig;
use super::session::SessionConfig;
use super::vhost::VhostConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and process-wide settings.
    pub server: ServerConfig,
    /// WebSocket listener.
    pub listen: ListenConfig,
    /// Settings applied to every session.
    #[serde(default)]
    pub session: SessionConfig,
    /// Vhosts created at startup.
    #[serde(default)]
    pub vhost: Vec<VhostConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, used in logs (e.g., "broker.straylight.net").
    pub name: String,
    /// Prometheus metrics HTTP port. Defaults to 9090; `0` disables the endpoint.
    pub metrics_port: Option<u16>,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format of the daemon.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}
