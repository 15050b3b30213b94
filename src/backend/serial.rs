//! Serial port device source
//!
//! Opens a USB CDC / UART device (e.g. `/dev/ttyACM0`, `COM3`) that emits
//! newline-delimited text. The port is opened fresh on every `open` call so a
//! replugged board can be picked up by the retry trigger.

use super::device_trait::{DeviceSource, DeviceStream};
use crate::config::DeviceConfig;
use crate::error::{RelayError, Result, ResultExt};
use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;

pub struct SerialDevice {
    path: String,
    baud_rate: u32,
}

impl SerialDevice {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| RelayError::Config("no serial device path configured".to_string()))?;
        Ok(Self::new(path, config.baud_rate))
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait]
impl DeviceSource for SerialDevice {
    fn identifier(&self) -> String {
        self.path.clone()
    }

    async fn open(&self) -> Result<DeviceStream> {
        tracing::info!(
            "Opening serial port: {} at {} baud",
            self.path,
            self.baud_rate
        );

        let port = tokio_serial::new(&self.path, self.baud_rate)
            .open_native_async()
            .with_context(|| format!("Failed to open {}", self.path))?;

        tracing::info!("Serial port {} opened", self.path);
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_path() {
        let config = DeviceConfig::default();
        assert!(SerialDevice::from_config(&config).is_err());

        let config = DeviceConfig {
            path: Some("/dev/ttyACM0".to_string()),
            baud_rate: 9600,
            ..Default::default()
        };
        let device = SerialDevice::from_config(&config).unwrap();
        assert_eq!(device.identifier(), "/dev/ttyACM0");
        assert_eq!(device.baud_rate(), 9600);
    }

    #[tokio::test]
    async fn test_open_missing_port_is_configuration_error() {
        let device = SerialDevice::new("/dev/pulse-relay-does-not-exist", 115_200);
        match device.open().await {
            Err(err) => assert!(err.is_configuration()),
            Ok(_) => panic!("opening a missing port should fail"),
        }
    }
}
