//! Backend module for the device link
//!
//! This module owns everything between the physical device and the ingestion
//! pipeline: opening the byte stream and supervising the task that reads it.
//!
//! # Architecture
//!
//! - [`DeviceSource`] - Capability to open one device byte stream
//! - [`SerialDevice`] - tokio-serial implementation for real hardware
//! - [`MockDevice`] - Synthetic firmware output for testing without hardware
//! - [`LinkSupervisor`] - Lifecycle state machine and the single ingestion task
//!
//! # Example
//!
//! ```ignore
//! use pulse_relay::backend::{LinkSupervisor, SerialDevice};
//! use pulse_relay::broadcast::BroadcastHub;
//! use pulse_relay::clock::SystemClock;
//!
//! let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
//! let supervisor = LinkSupervisor::new(config, hub.clone(), Arc::new(SystemClock));
//!
//! supervisor.open(Arc::new(SerialDevice::new("/dev/ttyACM0", 115_200))).await?;
//!
//! // Later, after a fault
//! supervisor.reconnect(source).await?;
//! ```

pub mod device_trait;
pub mod mock_device;
pub mod serial;
pub mod supervisor;

pub use device_trait::{DeviceSource, DeviceStream};
pub use mock_device::{MockDevice, MockFault, MockPattern};
pub use serial::SerialDevice;
pub use supervisor::{LinkStatus, LinkSupervisor};

use crate::config::DeviceConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Build the device source described by `config`
pub fn source_from_config(config: &DeviceConfig) -> Result<Arc<dyn DeviceSource>> {
    if config.mock {
        tracing::info!("Using mock device ({} ms period)", config.mock_period_ms);
        return Ok(Arc::new(MockDevice::firmware(Duration::from_millis(
            config.mock_period_ms,
        ))));
    }
    Ok(Arc::new(SerialDevice::from_config(config)?))
}
