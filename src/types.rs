//! Core data types for the pulse relay
//!
//! This module contains the typed event feed that the ingestion pipeline
//! produces and the broadcast hub consumes, plus the link lifecycle state
//! and the counters exposed through status queries.
//!
//! # Main Types
//!
//! - [`Frame`] - Tagged union of the two decoded data kinds
//! - [`ScalarReading`] - One instantaneous measurement (e.g. SpO2 percentage)
//! - [`WaveformBurst`] - A batch of raw two-channel samples with derived timestamps
//! - [`LinkState`] - Lifecycle status of the device connection
//! - [`PipelineStats`] / [`HubStats`] - Counters for observability
//!
//! # Timestamps
//!
//! Every frame carries a host-assigned wall-clock timestamp in milliseconds
//! since the Unix epoch. Device-reported uptime values are kept separately
//! on [`ScalarReading::device_timestamp`] and never used for ordering.

use serde::{Deserialize, Serialize};

/// One instantaneous measurement reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarReading {
    /// Timestamp as reported by the device, when it looked like uptime
    pub device_timestamp: Option<i64>,
    /// Wall-clock time in milliseconds assigned by the host
    pub host_timestamp: i64,
    /// The measured value
    pub value: f64,
}

/// A burst of consecutive raw samples from the two optical channels
///
/// `channel_a`, `channel_b` and `sample_timestamps` always have equal length.
/// Construct with [`WaveformBurst::new`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformBurst {
    /// Wall-clock time in milliseconds assigned by the host
    pub host_timestamp: i64,
    /// First channel (red LED on the reference firmware)
    pub channel_a: Vec<i64>,
    /// Second channel (infrared LED on the reference firmware)
    pub channel_b: Vec<i64>,
    /// Synthesized per-sample timestamps
    pub sample_timestamps: Vec<i64>,
}

impl WaveformBurst {
    /// Build a burst, truncating the longer channel and deriving sample times.
    ///
    /// Returns the burst and whether truncation happened.
    pub fn new(
        host_timestamp: i64,
        mut channel_a: Vec<i64>,
        mut channel_b: Vec<i64>,
        sample_interval_ms: i64,
    ) -> (Self, bool) {
        let len = channel_a.len().min(channel_b.len());
        let truncated = channel_a.len() != channel_b.len();
        channel_a.truncate(len);
        channel_b.truncate(len);

        let sample_timestamps = (0..len as i64)
            .map(|i| host_timestamp.saturating_add(i.saturating_mul(sample_interval_ms)))
            .collect();

        (
            Self {
                host_timestamp,
                channel_a,
                channel_b,
                sample_timestamps,
            },
            truncated,
        )
    }

    /// Number of samples in the burst
    pub fn len(&self) -> usize {
        self.sample_timestamps.len()
    }

    /// Whether the burst carries no samples
    pub fn is_empty(&self) -> bool {
        self.sample_timestamps.is_empty()
    }
}

/// One decoded, typed unit of sensor data ready for broadcast
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Scalar(ScalarReading),
    Waveform(WaveformBurst),
}

impl Frame {
    /// Host-assigned wall-clock timestamp of the frame
    pub fn host_timestamp(&self) -> i64 {
        match self {
            Frame::Scalar(s) => s.host_timestamp,
            Frame::Waveform(w) => w.host_timestamp,
        }
    }

    /// Short kind name, matching the wire discriminant
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Scalar(_) => "scalar",
            Frame::Waveform(_) => "waveform",
        }
    }

    pub fn is_waveform(&self) -> bool {
        matches!(self, Frame::Waveform(_))
    }
}

/// Represents the lifecycle state of the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// No device stream is held
    #[default]
    Disconnected,
    /// An open attempt is in progress
    Opening,
    /// The device stream is open and ingestion is running
    Open,
    /// The stream failed or could not be opened; waiting for a retry trigger
    Faulted,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Opening => write!(f, "Opening..."),
            LinkState::Open => write!(f, "Open"),
            LinkState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Counters from one ingestion pipeline instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    /// Total bytes read from the device
    pub bytes_read: u64,
    /// Complete lines seen by the lexer
    pub lines: u64,
    /// Lines classified as diagnostic chatter
    pub noise_lines: u64,
    /// Lines that were neither noise nor packets
    pub garbage_lines: u64,
    /// Packet lines that failed to parse
    pub decode_errors: u64,
    /// Packets with an unrecognised discriminant
    pub unknown_packets: u64,
    /// Waveform packets whose channels had to be truncated to equal length
    pub truncated_bursts: u64,
    /// Frames produced by the decoder
    pub frames_decoded: u64,
    /// Waveform bursts dropped by the rate limiter
    pub bursts_throttled: u64,
    /// Frames handed to the broadcast hub
    pub frames_published: u64,
}

impl PipelineStats {
    /// Fraction of complete lines that turned into frames, as a percentage
    pub fn yield_rate(&self) -> f64 {
        if self.lines == 0 {
            0.0
        } else {
            (self.frames_decoded as f64 / self.lines as f64) * 100.0
        }
    }
}

/// Counters from the broadcast hub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Frames published
    pub published: u64,
    /// Successful per-observer deliveries
    pub delivered: u64,
    /// Per-observer drops because the observer's queue was full
    pub lagged: u64,
    /// Observers removed because their channel had closed
    pub evicted: u64,
}
