//! Mock Device Implementation for Testing
//!
//! This module provides a device source that can be used without real
//! hardware. Output is written into an in-memory pipe by a background task,
//! so the supervisor reads it exactly as it would a serial port.
//!
//! # Patterns
//!
//! - [`MockPattern::Firmware`] - Imitates the reference pulse-oximeter
//!   firmware: boot banner, SpO2 packets with uptime timestamps, raw
//!   red/IR bursts, and debug echo lines, one cycle per period
//! - [`MockPattern::Script`] - Emits a fixed list of lines, then either holds
//!   the stream open or closes it
//!
//! # Fault injection
//!
//! - [`MockDevice::failing`] makes every `open` fail like a missing port
//! - [`MockDevice::close_after`] ends the firmware stream after N cycles
//! - [`MockDevice::fail_read`] turns the end of output into an I/O error
//! - [`MockDevice::panic_on_read`] panics in the reader at the end of output
//!
//! [`MockDevice::released_count`] counts streams that have been dropped, so
//! tests can check the device is let go after a fault or close.

use super::device_trait::{DeviceSource, DeviceStream};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::oneshot;

/// Size of the in-memory pipe between the generator and the reader
const PIPE_CAPACITY: usize = 8 * 1024;

/// Number of raw samples per burst, as the firmware sends
const BURST_SAMPLES: usize = 5;

/// What the mock device writes
#[derive(Debug, Clone, PartialEq)]
pub enum MockPattern {
    /// Firmware-shaped output every `period`
    Firmware { period: Duration },
    /// Fixed lines; `hold_open` keeps the stream alive after the last one
    Script { lines: Vec<String>, hold_open: bool },
}

impl Default for MockPattern {
    fn default() -> Self {
        MockPattern::Firmware {
            period: Duration::from_millis(100),
        }
    }
}

/// What the reader does once the generator has finished
#[derive(Debug, Clone, PartialEq)]
pub enum MockFault {
    /// Return an I/O error instead of end of stream
    ReadError(String),
    /// Panic inside `poll_read`
    Panic(String),
}

pub struct MockDevice {
    name: String,
    pattern: MockPattern,
    fail_open: bool,
    close_after: Option<usize>,
    fault: Option<MockFault>,
    opens: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl MockDevice {
    pub fn new(pattern: MockPattern) -> Self {
        Self {
            name: "mock".to_string(),
            pattern,
            fail_open: false,
            close_after: None,
            fault: None,
            opens: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Firmware imitation emitting one cycle per `period`
    pub fn firmware(period: Duration) -> Self {
        Self::new(MockPattern::Firmware { period })
    }

    /// Emit `lines` and keep the stream open
    pub fn script<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MockPattern::Script {
            lines: lines.into_iter().map(Into::into).collect(),
            hold_open: true,
        })
    }

    /// A device that cannot be opened
    pub fn failing() -> Self {
        let mut device = Self::new(MockPattern::default());
        device.fail_open = true;
        device
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// End the stream after `cycles` firmware cycles, or after the script
    pub fn close_after(mut self, cycles: usize) -> Self {
        self.close_after = Some(cycles);
        if let MockPattern::Script { hold_open, .. } = &mut self.pattern {
            *hold_open = false;
        }
        self
    }

    /// Fail the read with `message` when the output ends
    pub fn fail_read(self, message: impl Into<String>) -> Self {
        self.end_with(MockFault::ReadError(message.into()))
    }

    /// Panic in the reader with `message` when the output ends
    pub fn panic_on_read(self, message: impl Into<String>) -> Self {
        self.end_with(MockFault::Panic(message.into()))
    }

    fn end_with(mut self, fault: MockFault) -> Self {
        self.fault = Some(fault);
        if let MockPattern::Script { hold_open, .. } = &mut self.pattern {
            *hold_open = false;
        }
        self
    }

    /// How many times `open` has been called
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many opened streams have been dropped
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceSource for MockDevice {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    async fn open(&self) -> Result<DeviceStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(RelayError::Config(format!(
                "mock device {} unavailable",
                self.name
            )));
        }

        let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
        let mut hold = None;
        match self.pattern.clone() {
            MockPattern::Firmware { period } => {
                tokio::spawn(run_firmware(writer, period, self.close_after));
            }
            MockPattern::Script { lines, hold_open } => {
                let held = if hold_open {
                    let (release, held) = oneshot::channel();
                    hold = Some(release);
                    Some(held)
                } else {
                    None
                };
                tokio::spawn(run_script(writer, lines, held));
            }
        }

        Ok(Box::new(MockStream {
            inner: reader,
            fault: self.fault.clone(),
            released: self.released.clone(),
            _hold: hold,
        }))
    }
}

/// Read half handed to the supervisor
struct MockStream {
    inner: DuplexStream,
    fault: Option<MockFault>,
    released: Arc<AtomicUsize>,
    /// Keeps a held-open script writer alive until the stream is dropped
    _hold: Option<oneshot::Sender<()>>,
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before => match &this.fault {
                Some(MockFault::ReadError(message)) => Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    message.clone(),
                ))),
                Some(MockFault::Panic(message)) => panic!("{}", message),
                None => Poll::Ready(Ok(())),
            },
            other => other,
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

async fn run_script(
    mut writer: DuplexStream,
    lines: Vec<String>,
    held: Option<oneshot::Receiver<()>>,
) {
    for line in lines {
        if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
            return;
        }
    }
    if let Some(held) = held {
        // resolves when the reader side is dropped
        let _ = held.await;
    }
}

async fn run_firmware(mut writer: DuplexStream, period: Duration, close_after: Option<usize>) {
    let banner = "I2C devices found: ['0x57']\nStarting SpO2 monitoring...\n";
    if writer.write_all(banner.as_bytes()).await.is_err() {
        return;
    }

    let start = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(period);
    let mut cycle = 0usize;
    loop {
        if close_after.is_some_and(|n| cycle >= n) {
            tracing::debug!("Mock device closing after {} cycles", cycle);
            return;
        }
        ticker.tick().await;
        let uptime_ms = start.elapsed().as_millis() as u64;
        let text = firmware_cycle(cycle, uptime_ms);
        if writer.write_all(text.as_bytes()).await.is_err() {
            return;
        }
        cycle += 1;
    }
}

/// One cycle of firmware output.
pub fn firmware_cycle(cycle: usize, uptime_ms: u64) -> String {
    let phase = cycle as f64 * 0.3;
    let spo2 = 97.0 + 1.5 * phase.sin();
    let mut out = format!(
        "{{\"type\": \"spo2\", \"timestamp\": {}, \"spo2\": {:.1}}}\n",
        uptime_ms, spo2
    );

    if (cycle + 1) % 10 == 0 {
        out.push_str(&format!("Collected {} valid samples\n", cycle + 1));
    }

    let red: Vec<String> = (0..BURST_SAMPLES)
        .map(|i| sample(cycle, i, 52_000.0).to_string())
        .collect();
    let ir: Vec<String> = (0..BURST_SAMPLES)
        .map(|i| sample(cycle, i, 61_000.0).to_string())
        .collect();
    out.push_str(&format!(
        "{{\"type\": \"raw\", \"timestamp\": {}, \"red\": [{}], \"ir\": [{}]}}\n",
        uptime_ms,
        red.join(", "),
        ir.join(", ")
    ));
    out.push_str("Debug - Raw data sent\n");
    out
}

fn sample(cycle: usize, index: usize, baseline: f64) -> i64 {
    let t = (cycle * BURST_SAMPLES + index) as f64 * 0.04;
    (baseline + 800.0 * (2.0 * std::f64::consts::PI * 1.2 * t).sin()) as i64
}
