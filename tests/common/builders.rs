//! Test data builders for creating test objects

use pulse_relay::config::RelayConfig;

/// Builder for device output lines in the firmware's format
pub struct PacketBuilder {
    kind: String,
    fields: Vec<(String, serde_json::Value)>,
    prefix: Option<String>,
}

impl PacketBuilder {
    pub fn scalar(value: f64) -> Self {
        Self::new("scalar-like").field("value", value)
    }

    pub fn waveform(channel_a: &[i64], channel_b: &[i64]) -> Self {
        Self::new("waveform-like")
            .field("channelA", channel_a.to_vec())
            .field("channelB", channel_b.to_vec())
    }

    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            fields: Vec::new(),
            prefix: None,
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn timestamp(self, ts: i64) -> Self {
        self.field("timestamp", ts)
    }

    /// Prepend a marker such as `Sent packet:`
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// One newline-terminated line
    pub fn line(self) -> String {
        let mut object = serde_json::Map::new();
        object.insert("type".to_string(), self.kind.into());
        for (name, value) in self.fields {
            object.insert(name, value);
        }
        format!(
            "{}{}\n",
            self.prefix.unwrap_or_default(),
            serde_json::Value::Object(object)
        )
    }
}

/// Relay config using the mock device with the given burst interval
pub fn mock_config(min_burst_interval_ms: u64) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.device.mock = true;
    config.limiter.min_burst_interval_ms = min_burst_interval_ms;
    config
}
