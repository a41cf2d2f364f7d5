use drive_core::TelemetrySample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

/// Synchronous request: one response per id, always.
#[derive(Debug, Deserialize)]
pub struct CommandMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    pub id: u64,
    pub op: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Streamed target update: no response is ever produced for these.
#[derive(Debug, Deserialize)]
pub struct TargetMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct ResponseMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub id: u64,
    pub success: bool,
    pub message: String,
}

impl ResponseMsg {
    pub fn new(id: u64, success: bool, message: String) -> Self {
        Self {
            msg_type: "response",
            protocol_version: ProtocolVersion::v1(),
            id,
            success,
            message,
        }
    }
}

/// One telemetry line per sampled quantity, emitted at the publish interval.
#[derive(Debug, Serialize)]
pub struct TelemetryMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub channel: &'static str,
    pub timestamp_us: u64,
    pub value: f64,
}

impl TelemetryMsg {
    pub fn new(channel: &'static str, timestamp_us: u64, value: f64) -> Self {
        Self {
            msg_type: "telemetry",
            protocol_version: ProtocolVersion::v1(),
            channel,
            timestamp_us,
            value,
        }
    }
}

/// The six output channels, in emission order.
pub fn channel_values(sample: &TelemetrySample) -> [(&'static str, f64); 6] {
    [
        ("position", sample.position),
        ("velocity", sample.velocity),
        ("current_rms", sample.current_rms),
        ("temperature_c", sample.temperature_c),
        ("digital_inputs", sample.digital_inputs as f64),
        ("drive_status", sample.status.as_u32() as f64),
    ]
}

#[derive(Debug)]
pub enum IncomingMessage {
    Command(CommandMsg),
    Target(TargetMsg),
}

impl IncomingMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "command" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Command),
            "target" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Target),
            _ => None,
        }
    }
}
