//! Packet decoder: turns packet text into typed frames with host timestamps.
//!
//! The `type` field selects the frame kind. Discriminant names are
//! configurable so both the reference firmware (`spo2`, `raw`) and newer
//! device builds (`scalar`, `waveform`) decode. Unknown kinds are dropped
//! without error so new firmware packets do not fill the logs.
//!
//! # Timestamps
//!
//! Host timestamps never decrease in emission order: each one is clamped to
//! at least the previous one. A device timestamp below
//! [`EPOCH_THRESHOLD_MS`] is treated as device uptime and kept only as
//! metadata. A wall-clock device timestamp more than [`MAX_FUTURE_SKEW_MS`]
//! ahead of the host clock is ignored in favour of the host clock.

use crate::clock::Clock;
use crate::config::DecoderSettings;
use crate::pipeline::error::{DecodeError, DecodeResult};
use crate::types::{Frame, ScalarReading, WaveformBurst};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Device timestamps below this many milliseconds are uptime, not wall clock.
///
/// 10^12 ms is September 2001. The firmware reports `time.ticks_ms()`, which
/// stays far below this; anything above it is taken as a real epoch time.
pub const EPOCH_THRESHOLD_MS: i64 = 1_000_000_000_000;

/// How far ahead of the host clock a device wall-clock timestamp may be.
pub const MAX_FUTURE_SKEW_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketKind {
    Scalar,
    Waveform,
}

#[derive(Deserialize)]
struct ScalarPayload {
    #[serde(alias = "spo2")]
    value: f64,
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Deserialize)]
struct WaveformPayload {
    #[serde(default, rename = "channelA", alias = "red")]
    channel_a: Option<Vec<i64>>,
    #[serde(default, rename = "channelB", alias = "ir")]
    channel_b: Option<Vec<i64>>,
}

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub decoded: u64,
    pub errors: u64,
    pub unknown: u64,
    pub truncated: u64,
}

pub struct PacketDecoder {
    settings: DecoderSettings,
    clock: Arc<dyn Clock>,
    last_host_timestamp: i64,
    stats: DecoderStats,
}

impl PacketDecoder {
    pub fn new(settings: DecoderSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            last_host_timestamp: i64::MIN,
            stats: DecoderStats::default(),
        }
    }

    /// Decode one packet.
    ///
    /// Returns `Ok(None)` for packets of an unknown kind.
    pub fn decode(&mut self, text: &str) -> DecodeResult<Option<Frame>> {
        let result = self.decode_inner(text);
        match &result {
            Ok(Some(_)) => self.stats.decoded += 1,
            Ok(None) => self.stats.unknown += 1,
            Err(_) => self.stats.errors += 1,
        }
        result
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn decode_inner(&mut self, text: &str) -> DecodeResult<Option<Frame>> {
        let value: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

        let kind = match value.get("type").and_then(Value::as_str) {
            Some(discriminant) => self.kind_of(discriminant),
            None => None,
        };

        match kind {
            Some(PacketKind::Scalar) => {
                let payload: ScalarPayload =
                    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload {
                        kind: "scalar",
                        source,
                    })?;
                Ok(Some(Frame::Scalar(self.build_scalar(payload))))
            }
            Some(PacketKind::Waveform) => {
                let payload: WaveformPayload =
                    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload {
                        kind: "waveform",
                        source,
                    })?;
                Ok(Some(Frame::Waveform(self.build_waveform(payload))))
            }
            None => {
                tracing::trace!("Ignoring packet of unknown kind: {}", text);
                Ok(None)
            }
        }
    }

    fn kind_of(&self, discriminant: &str) -> Option<PacketKind> {
        if self.settings.scalar_types.iter().any(|t| t == discriminant) {
            Some(PacketKind::Scalar)
        } else if self.settings.waveform_types.iter().any(|t| t == discriminant) {
            Some(PacketKind::Waveform)
        } else {
            None
        }
    }

    fn build_scalar(&mut self, payload: ScalarPayload) -> ScalarReading {
        let now = self.clock.now_ms();
        let (device_timestamp, candidate) = match payload.timestamp.map(|t| t as i64) {
            None => (None, now),
            Some(ts) if ts < EPOCH_THRESHOLD_MS => (Some(ts), now),
            Some(ts) if ts <= now.saturating_add(MAX_FUTURE_SKEW_MS) => (None, ts),
            Some(ts) => {
                tracing::debug!("Ignoring device timestamp {} ahead of host clock {}", ts, now);
                (None, now)
            }
        };

        ScalarReading {
            device_timestamp,
            host_timestamp: self.stamp(candidate),
            value: payload.value,
        }
    }

    fn build_waveform(&mut self, payload: WaveformPayload) -> WaveformBurst {
        let host_timestamp = self.stamp(self.clock.now_ms());
        let (burst, truncated) = WaveformBurst::new(
            host_timestamp,
            payload.channel_a.unwrap_or_default(),
            payload.channel_b.unwrap_or_default(),
            self.settings.sample_interval_ms,
        );
        if truncated {
            self.stats.truncated += 1;
            tracing::debug!("Waveform channels differ in length; truncated to {}", burst.len());
        }
        burst
    }

    fn stamp(&mut self, candidate: i64) -> i64 {
        let ts = candidate.max(self.last_host_timestamp);
        self.last_host_timestamp = ts;
        ts
    }
}
