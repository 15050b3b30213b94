//! Link Supervisor
//!
//! Owns the device-connection lifecycle and the one ingestion task that runs
//! while the link is open.
//!
//! # State Machine
//!
//! ```text
//!              open()                 stream ok
//! Disconnected ──────► Opening ──────────────────► Open
//!      ▲                  │ open failed             │ EOF / I/O error
//!      │                  ▼                         ▼
//!      └─────────────── Faulted ◄───────────────────┘
//!          reset()
//! ```
//!
//! A panic inside the ingestion task is a link fault like EOF or an I/O
//! error. `close()` ends in Disconnected from any state. A failed open is
//! reported to the caller and recorded in [`LinkStatus::last_error`]; it is never
//! retried internally. Retrying is the job of an external trigger, usually
//! [`LinkSupervisor::reconnect`].
//!
//! # Status
//!
//! The current [`LinkStatus`] lives in a `watch` channel. The ingestion task
//! updates pipeline counters after every chunk it reads, and the supervisor
//! updates the state on each transition. [`LinkSupervisor::subscribe`] lets
//! callers await transitions.

use super::device_trait::{DeviceSource, DeviceStream};
use crate::broadcast::BroadcastHub;
use crate::clock::Clock;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::pipeline::IngestPipeline;
use crate::types::{HubStats, LinkState, PipelineStats};
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

/// Bytes requested per device read
const READ_BUFFER_SIZE: usize = 4096;

/// Snapshot of the link and its counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub state: LinkState,
    /// Identifier of the device last opened or attempted
    pub device: Option<String>,
    /// Message of the last open failure or link fault
    pub last_error: Option<String>,
    /// Counters of the current (or last) ingestion pipeline
    pub pipeline: PipelineStats,
    pub hub: HubStats,
    pub observers: usize,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Open
    }
}

struct ActiveLink {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct LinkSupervisor {
    config: RelayConfig,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
    status: Arc<watch::Sender<LinkStatus>>,
    active: Mutex<Option<ActiveLink>>,
}

impl LinkSupervisor {
    pub fn new(config: RelayConfig, hub: Arc<BroadcastHub>, clock: Arc<dyn Clock>) -> Self {
        let (status, _) = watch::channel(LinkStatus::default());
        Self {
            config,
            hub,
            clock,
            status: Arc::new(status),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LinkState {
        self.status.borrow().state
    }

    /// Current status, with live hub counters
    pub fn status(&self) -> LinkStatus {
        let mut status = self.status.borrow().clone();
        status.hub = self.hub.stats();
        status.observers = self.hub.observer_count();
        status
    }

    /// Receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    /// Open `source` and start ingesting from it.
    ///
    /// Only allowed from Disconnected. On failure the link is left Faulted
    /// and the error is returned unchanged.
    pub async fn open(&self, source: Arc<dyn DeviceSource>) -> Result<()> {
        let mut active = self.active.lock().await;

        let state = self.state();
        if state != LinkState::Disconnected {
            return Err(RelayError::InvalidState {
                expected: "Disconnected",
                found: state,
            });
        }

        let device = source.identifier();
        tracing::info!("Opening device link: {}", device);
        self.status.send_modify(|s| {
            s.state = LinkState::Opening;
            s.device = Some(device.clone());
            s.last_error = None;
            s.pipeline = PipelineStats::default();
        });

        let stream = match source.open().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to open {}: {}", device, e);
                self.status.send_modify(|s| {
                    s.state = LinkState::Faulted;
                    s.last_error = Some(e.to_string());
                });
                return Err(e);
            }
        };

        let pipeline = IngestPipeline::new(&self.config, self.clock.clone(), self.hub.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.status.send_modify(|s| s.state = LinkState::Open);
        tracing::info!("Device link open: {}", device);

        let task = tokio::spawn(supervise_link(
            stream,
            pipeline,
            shutdown_rx,
            self.status.clone(),
            device,
        ));
        *active = Some(ActiveLink {
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Stop ingestion and release the device. Always ends Disconnected.
    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        if let Some(link) = active.take() {
            // the task may already have ended on a fault
            let _ = link.shutdown.send(());
            if let Err(e) = link.task.await {
                tracing::error!("Ingestion task ended abnormally: {}", e);
            }
        }

        if self.state() != LinkState::Disconnected {
            tracing::info!("Device link closed");
        }
        self.status.send_modify(|s| s.state = LinkState::Disconnected);
    }

    /// Acknowledge a fault so the link can be opened again.
    ///
    /// No-op when already Disconnected. Refused while Opening or Open.
    pub async fn reset(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        match self.state() {
            LinkState::Disconnected => Ok(()),
            LinkState::Faulted => {
                if let Some(link) = active.take() {
                    if let Err(e) = link.task.await {
                        tracing::error!("Ingestion task ended abnormally: {}", e);
                    }
                }
                self.status.send_modify(|s| s.state = LinkState::Disconnected);
                tracing::info!("Device link reset");
                Ok(())
            }
            found => Err(RelayError::InvalidState {
                expected: "Faulted or Disconnected",
                found,
            }),
        }
    }

    /// Reset a faulted link and open `source` again.
    pub async fn reconnect(&self, source: Arc<dyn DeviceSource>) -> Result<()> {
        self.reset().await?;
        self.open(source).await
    }
}

/// Run the ingestion loop and fault the link if it panics.
async fn supervise_link(
    stream: DeviceStream,
    pipeline: IngestPipeline,
    shutdown: oneshot::Receiver<()>,
    status: Arc<watch::Sender<LinkStatus>>,
    device: String,
) {
    let link = run_link(stream, pipeline, shutdown, status.clone(), device.clone());
    // the link future, and the stream it owns, is gone before a fault is published
    let outcome = AssertUnwindSafe(link).catch_unwind().await;
    if let Err(panic) = outcome {
        let err = RelayError::LinkFault {
            device,
            message: format!("ingestion task panicked: {}", panic_message(panic.as_ref())),
        };
        tracing::error!("{}", err);
        status.send_modify(|s| {
            s.state = LinkState::Faulted;
            s.last_error = Some(err.to_string());
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Read the device until shutdown, EOF or an I/O error.
async fn run_link(
    mut stream: DeviceStream,
    mut pipeline: IngestPipeline,
    mut shutdown: oneshot::Receiver<()>,
    status: Arc<watch::Sender<LinkStatus>>,
    device: String,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let fault = loop {
        tokio::select! {
            _ = &mut shutdown => break None,
            read = stream.read(&mut buf) => match read {
                Ok(0) => break Some("device stream closed".to_string()),
                Ok(n) => {
                    pipeline.ingest(&buf[..n], Instant::now());
                    let stats = pipeline.stats();
                    status.send_modify(|s| s.pipeline = stats);
                }
                Err(e) => break Some(e.to_string()),
            },
        }
    };

    drop(stream);

    let stats = pipeline.stats();
    tracing::debug!(
        "Ingestion ended for {}: {} lines, {} frames published ({:.1}% yield)",
        device,
        stats.lines,
        stats.frames_published,
        stats.yield_rate()
    );

    if let Some(message) = fault {
        let err = RelayError::LinkFault { device, message };
        tracing::error!("{}", err);
        status.send_modify(|s| {
            s.state = LinkState::Faulted;
            s.last_error = Some(err.to_string());
            s.pipeline = stats;
        });
    }
}
