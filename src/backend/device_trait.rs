//! DeviceSource trait for the device byte stream
//!
//! The supervisor never locates devices itself. It is handed a
//! [`DeviceSource`] that knows how to open one particular stream and what to
//! call it in status reports. Both the serial port and the mock device
//! implement it.

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// An open, readable device byte stream. Dropping it releases the device.
pub type DeviceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Capability to open one device byte stream
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn DeviceSource> = Arc::new(SerialDevice::new("/dev/ttyACM0", 115_200));
/// supervisor.open(source).await?;
/// ```
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Path or name reported in status queries
    fn identifier(&self) -> String;

    /// Open the stream
    ///
    /// Failure here is a configuration error: the pipeline never starts.
    async fn open(&self) -> Result<DeviceStream>;
}
