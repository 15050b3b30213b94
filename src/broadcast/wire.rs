//! Outbound wire format.
//!
//! Each frame is one self-contained JSON text message:
//!
//! ```text
//! {"type":"scalar","timestamp":1700000000000,"value":97.4,"deviceTimestamp":12345}
//! {"type":"waveform","timestamp":1700000000000,"data":{"channelA":[..],"channelB":[..],"timestamps":[..]}}
//! ```
//!
//! `deviceTimestamp` is omitted when the device did not report an uptime value.

use crate::types::Frame;
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame<'a> {
    Scalar {
        timestamp: i64,
        value: f64,
        #[serde(rename = "deviceTimestamp", skip_serializing_if = "Option::is_none")]
        device_timestamp: Option<i64>,
    },
    Waveform {
        timestamp: i64,
        data: WaveformData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WaveformData<'a> {
    channel_a: &'a [i64],
    channel_b: &'a [i64],
    timestamps: &'a [i64],
}

impl<'a> From<&'a Frame> for WireFrame<'a> {
    fn from(frame: &'a Frame) -> Self {
        match frame {
            Frame::Scalar(s) => WireFrame::Scalar {
                timestamp: s.host_timestamp,
                value: s.value,
                device_timestamp: s.device_timestamp,
            },
            Frame::Waveform(w) => WireFrame::Waveform {
                timestamp: w.host_timestamp,
                data: WaveformData {
                    channel_a: &w.channel_a,
                    channel_b: &w.channel_b,
                    timestamps: &w.sample_timestamps,
                },
            },
        }
    }
}

/// Serialize a frame to its wire message
pub fn encode_frame(frame: &Frame) -> serde_json::Result<String> {
    serde_json::to_string(&WireFrame::from(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScalarReading, WaveformBurst};
    use serde_json::{json, Value};

    #[test]
    fn test_scalar_message() {
        let frame = Frame::Scalar(ScalarReading {
            device_timestamp: None,
            host_timestamp: 1_700_000_000_000,
            value: 97.4,
        });
        let msg: Value = serde_json::from_str(&encode_frame(&frame).unwrap()).unwrap();
        assert_eq!(
            msg,
            json!({"type": "scalar", "timestamp": 1_700_000_000_000i64, "value": 97.4})
        );
    }

    #[test]
    fn test_scalar_message_with_device_timestamp() {
        let frame = Frame::Scalar(ScalarReading {
            device_timestamp: Some(12_345),
            host_timestamp: 1_700_000_000_000,
            value: 95.0,
        });
        let msg: Value = serde_json::from_str(&encode_frame(&frame).unwrap()).unwrap();
        assert_eq!(msg["deviceTimestamp"], json!(12_345));
    }

    #[test]
    fn test_waveform_message() {
        let (burst, _) = WaveformBurst::new(1_000, vec![100, 101], vec![200, 201], 40);
        let msg: Value =
            serde_json::from_str(&encode_frame(&Frame::Waveform(burst)).unwrap()).unwrap();
        assert_eq!(
            msg,
            json!({
                "type": "waveform",
                "timestamp": 1_000,
                "data": {
                    "channelA": [100, 101],
                    "channelB": [200, 201],
                    "timestamps": [1_000, 1_040]
                }
            })
        );
    }
}
