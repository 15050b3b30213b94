//! Per-stage settings for the ingestion pipeline and broadcast hub
//!
//! These are the knobs each pipeline stage reads when it is constructed.
//! They are grouped under [`crate::config::RelayConfig`] and serialized as
//! separate TOML tables (`[lexer]`, `[decoder]`, `[limiter]`, `[hub]`).
//!
//! # Main Types
//!
//! - [`LexerSettings`] - Diagnostic substrings, prefix markers, line length cap
//! - [`DecoderSettings`] - Discriminant names and the sample interval
//! - [`LimiterSettings`] - Minimum spacing between forwarded waveform bursts
//! - [`HubSettings`] - Per-observer queue depth

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default approximation of the device's sample period.
///
/// The reference firmware samples at 100 Hz with 4-sample averaging, so
/// consecutive FIFO entries are roughly 40 ms apart. This is not measured.
pub const DEFAULT_SAMPLE_INTERVAL_MS: i64 = 40;

/// Default minimum spacing between forwarded waveform bursts
pub const DEFAULT_MIN_BURST_INTERVAL_MS: u64 = 50;

/// Default cap on a single unterminated line
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Default per-observer outbound queue depth
pub const DEFAULT_OBSERVER_QUEUE: usize = 256;

/// Settings for the frame lexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerSettings {
    /// Substrings marking a line as diagnostic chatter
    pub noise_patterns: Vec<String>,
    /// Markers preceding structured content; everything through the marker is stripped
    pub prefix_markers: Vec<String>,
    /// Longest line kept in the partial-line buffer before it is dropped as garbage
    pub max_line_len: usize,
}

impl Default for LexerSettings {
    fn default() -> Self {
        Self {
            noise_patterns: [
                "I2C devices found",
                "Starting SpO2 monitoring",
                "Collected ",
                "Debug - Raw data sent",
                "MAX30102 sensor not found",
                "Please check your connections",
                "Error:",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            prefix_markers: vec!["Sent packet:".to_string()],
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// Settings for the packet decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// `type` values decoded as scalar readings
    pub scalar_types: Vec<String>,
    /// `type` values decoded as waveform bursts
    pub waveform_types: Vec<String>,
    /// Spacing used to synthesize per-sample timestamps
    pub sample_interval_ms: i64,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            scalar_types: vec![
                "scalar-like".to_string(),
                "scalar".to_string(),
                "spo2".to_string(),
            ],
            waveform_types: vec![
                "waveform-like".to_string(),
                "waveform".to_string(),
                "raw".to_string(),
            ],
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

/// Settings for the waveform rate limiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// A burst is forwarded only when strictly more than this has elapsed
    /// since the last forwarded burst
    pub min_burst_interval_ms: u64,
}

impl LimiterSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_burst_interval_ms)
    }
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            min_burst_interval_ms: DEFAULT_MIN_BURST_INTERVAL_MS,
        }
    }
}

/// Settings for the broadcast hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Frames buffered per observer before new ones are dropped for it
    pub observer_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            observer_queue: DEFAULT_OBSERVER_QUEUE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lexer_settings() {
        let settings = LexerSettings::default();
        assert!(settings
            .noise_patterns
            .iter()
            .any(|p| p == "I2C devices found"));
        assert_eq!(settings.prefix_markers, vec!["Sent packet:".to_string()]);
    }

    #[test]
    fn test_decoder_settings_accept_firmware_names() {
        let settings = DecoderSettings::default();
        assert!(settings.scalar_types.contains(&"spo2".to_string()));
        assert!(settings.waveform_types.contains(&"raw".to_string()));
        assert_eq!(settings.sample_interval_ms, 40);
    }

    #[test]
    fn test_limiter_interval() {
        let settings = LimiterSettings {
            min_burst_interval_ms: 75,
        };
        assert_eq!(settings.min_interval(), Duration::from_millis(75));
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let settings: DecoderSettings = toml::from_str("sample_interval_ms = 10").unwrap();
        assert_eq!(settings.sample_interval_ms, 10);
        assert_eq!(settings.scalar_types, DecoderSettings::default().scalar_types);
    }
}
