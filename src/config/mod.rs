//! Configuration module for the pulse relay
//!
//! This module handles relay configuration:
//! - Device selection (serial path and baud rate, or the built-in mock device)
//! - Per-stage pipeline settings (see [`settings`])
//! - The listen address of the observer surface
//!
//! # Config Location
//!
//! When no `--config` path is given, the relay looks for `relay.toml` in the
//! platform-appropriate config directory under `dev.pulse-relay`:
//!
//! - **Linux**: `~/.config/dev.pulse-relay/relay.toml`
//! - **macOS**: `~/Library/Application Support/dev.pulse-relay/relay.toml`
//! - **Windows**: `%APPDATA%\dev.pulse-relay\relay.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Example
//!
//! ```toml
//! [device]
//! path = "/dev/ttyACM0"
//! baud_rate = 115200
//!
//! [limiter]
//! min_burst_interval_ms = 100
//!
//! [server]
//! listen = "0.0.0.0:3001"
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.pulse-relay";

/// Config filename
pub const CONFIG_FILE: &str = "relay.toml";

/// Default serial baud rate of the reference firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default listen address for the observer surface
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3001";

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Which device the relay reads from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial device path (e.g. `/dev/ttyACM0`, `COM3`)
    pub path: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Use the synthetic mock device instead of a serial port
    pub mock: bool,
    /// Emission period of the mock device in milliseconds
    pub mock_period_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: None,
            baud_rate: DEFAULT_BAUD_RATE,
            mock: false,
            mock_period_ms: 100,
        }
    }
}

/// Network surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub lexer: LexerSettings,

    #[serde(default)]
    pub decoder: DecoderSettings,

    #[serde(default)]
    pub limiter: LimiterSettings,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub server: ServerConfig,
}

impl RelayConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            RelayError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load the file at `path` if given, else the default location if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {:?}", path);
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RelayError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            RelayError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.baud_rate == 0 {
            return Err(RelayError::Config("baud_rate must be non-zero".to_string()));
        }
        if self.decoder.sample_interval_ms <= 0 {
            return Err(RelayError::Config(
                "sample_interval_ms must be positive".to_string(),
            ));
        }
        if self.hub.observer_queue == 0 {
            return Err(RelayError::Config(
                "observer_queue must be non-zero".to_string(),
            ));
        }
        if self.lexer.max_line_len == 0 {
            return Err(RelayError::Config(
                "max_line_len must be non-zero".to_string(),
            ));
        }
        if !self.device.mock && self.device.path.is_none() {
            return Err(RelayError::Config(
                "no device path configured (set device.path or enable device.mock)".to_string(),
            ));
        }
        Ok(())
    }

    /// Human-readable identifier of the configured device
    pub fn device_identifier(&self) -> String {
        if self.device.mock {
            "mock".to_string()
        } else {
            self.device.path.clone().unwrap_or_default()
        }
    }
}
