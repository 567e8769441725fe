//! Wire format spoken by the sensor firmware.
//!
//! Device → client: one JSON object per text frame,
//! `{ "state": "...", "message": "...", "countdown"?: n, "uid_status"?: "..." }`.
//! No envelope, no sequence numbers.
//!
//! Client → device: `{ "command": "deactivate" }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Inbound ──────────────────────────────────────────────────────────

/// A validated sensor frame as sent by the device.
///
/// `state` is kept as a raw string here; classification into known
/// states happens in `rfidmon-core`. Unknown fields are ignored so newer
/// firmware does not break older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub state: String,

    pub message: String,

    /// Seconds remaining. Only sent while the device is counting down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,

    /// Tag describing the credential that was scanned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_status: Option<String>,
}

/// A sensor frame plus the client-side arrival timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: SensorFrame,
    pub received_at: DateTime<Utc>,
}

impl ReceivedFrame {
    /// Stamp a frame with the current client clock.
    pub fn now(frame: SensorFrame) -> Self {
        Self {
            frame,
            received_at: Utc::now(),
        }
    }
}

/// Parse and validate one text frame.
///
/// Wrong field types (a string countdown, a negative or fractional
/// countdown, a numeric message) are rejected by the schema; an empty
/// `state` is rejected by validation.
pub fn parse_frame(text: &str) -> Result<SensorFrame, Error> {
    let frame: SensorFrame =
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;

    if frame.state.trim().is_empty() {
        return Err(Error::InvalidFrame {
            field: "state",
            reason: "must not be empty".into(),
        });
    }

    Ok(frame)
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Commands the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum DeviceCommand {
    /// Silence an active alarm or cancel a running countdown.
    Deactivate,
}

impl DeviceCommand {
    /// Serialize to the JSON text frame sent over the socket.
    pub fn encode(self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self)?)
    }
}
