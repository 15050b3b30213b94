//! # Pulse Relay: biosensor serial-stream relay
//!
//! Reads the text stream of a pulse-oximeter board over a serial link,
//! filters the firmware's diagnostic chatter, decodes JSON packets into typed
//! frames, and fans them out to any number of websocket observers.
//!
//! ## Architecture
//!
//! - **Backend**: Device sources (serial, mock) and the link supervisor that
//!   owns the single ingestion task
//! - **Pipeline**: Frame lexer, packet decoder and rate limiter, driven inline
//!   by the ingestion task
//! - **Broadcast**: Hub that serializes each frame once and delivers it to
//!   bounded per-observer queues
//! - **Server**: axum websocket surface plus status and retry endpoints
//!
//! ## Configuration
//!
//! Configuration is read from `relay.toml` in the platform-appropriate config
//! directory under `dev.pulse-relay`, or from the path given with `--config`.
//! See [`config`] for the format.
//!
//! ## Example
//!
//! ```ignore
//! use pulse_relay::{
//!     backend::{source_from_config, LinkSupervisor},
//!     broadcast::BroadcastHub,
//!     clock::SystemClock,
//!     config::RelayConfig,
//!     server::{router, RelayState},
//! };
//!
//! let config = RelayConfig::load_or_default(None)?;
//! let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
//! let source = source_from_config(&config.device)?;
//! let supervisor = Arc::new(LinkSupervisor::new(config, hub.clone(), Arc::new(SystemClock)));
//! supervisor.open(source.clone()).await?;
//!
//! let app = router(RelayState { supervisor, hub, source });
//! ```

pub mod backend;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use backend::{DeviceSource, LinkStatus, LinkSupervisor, MockDevice, SerialDevice};
pub use broadcast::{BroadcastHub, ObserverId};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use pipeline::IngestPipeline;
pub use types::{Frame, LinkState, ScalarReading, WaveformBurst};
