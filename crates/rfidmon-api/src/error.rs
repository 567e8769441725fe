use thiserror::Error;

/// Top-level error type for the `rfidmon-api` crate.
///
/// Covers every failure mode of the sensor transport: connection setup,
/// frame parsing, and outbound sends. `rfidmon-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// WebSocket connection failed (refused, DNS failure, handshake, ...).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed with a close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Connection attempt exceeded the configured timeout.
    #[error("Connection attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Outbound ────────────────────────────────────────────────────
    /// Send attempted while the connection is not open.
    #[error("Sensor connection is not open")]
    NotConnected,

    /// The session writer went away between the state check and the send.
    #[error("Failed to queue outbound frame: {0}")]
    Send(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Frame was not valid JSON or did not match the sensor schema.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Frame parsed but carried an unusable value.
    #[error("Invalid frame field `{field}`: {reason}")]
    InvalidFrame { field: &'static str, reason: String },

    /// Outbound command could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_error_reports_code_and_reason() {
        let err = Error::WebSocketClosed {
            code: 1011,
            reason: "internal".into(),
        };
        assert_eq!(err.to_string(), "WebSocket closed (code 1011): internal");
    }
}
