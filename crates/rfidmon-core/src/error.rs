// ── Core error types ──
//
// User-facing errors from rfidmon-core. Transport failures only surface
// here once the connection manager has given up; until then they are
// retried and only logged.

use thiserror::Error;
use url::Url;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to sensor at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Sensor connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Translate the transport error that ended a session loop.
    pub fn from_transport(url: &Url, err: &rfidmon_api::Error) -> Self {
        use rfidmon_api::Error as Api;

        match err {
            Api::Timeout { timeout_ms } => CoreError::Timeout {
                timeout_ms: *timeout_ms,
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid sensor URL: {e}"),
            },
            other => CoreError::ConnectionFailed {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://192.168.0.234:81/").unwrap()
    }

    #[test]
    fn refused_connection_keeps_url_and_reason() {
        let err = CoreError::from_transport(
            &url(),
            &rfidmon_api::Error::WebSocketConnect("Connection refused".into()),
        );
        assert!(matches!(
            err,
            CoreError::ConnectionFailed { ref url, .. } if url == "ws://192.168.0.234:81/"
        ));
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn timeout_keeps_duration() {
        let err =
            CoreError::from_transport(&url(), &rfidmon_api::Error::Timeout { timeout_ms: 2500 });
        assert!(matches!(err, CoreError::Timeout { timeout_ms: 2500 }));
        assert_eq!(err.to_string(), "Sensor connection timed out after 2500ms");
    }

    #[test]
    fn abnormal_close_is_a_connection_failure() {
        let err = CoreError::from_transport(
            &url(),
            &rfidmon_api::Error::WebSocketClosed {
                code: 1011,
                reason: "restarting".into(),
            },
        );
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
