// ── Runtime connection configuration ──
//
// Describes *where* the sensor lives and how to stay connected to it.
// Never touches disk: the CLI builds a `MonitorConfig` from its profile
// and hands it in.

use url::Url;

use crate::error::CoreError;
use crate::store::Retention;
use rfidmon_api::ReconnectConfig;

/// Factory-default sensor address.
pub const DEFAULT_HOST: &str = "192.168.0.234";
pub const DEFAULT_PORT: u16 = 81;

/// Configuration for monitoring a single sensor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sensor host name or IP address.
    pub host: String,
    pub port: u16,
    /// Request path of the WebSocket endpoint (e.g. `/`).
    pub path: String,
    pub reconnect: ReconnectConfig,
    /// In-memory retention for the event log and transition history.
    pub retention: Retention,
}

impl MonitorConfig {
    /// Build the `ws://` endpoint for this sensor.
    pub fn ws_url(&self) -> Result<Url, CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::Config {
                message: "sensor host must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(CoreError::Config {
                message: "sensor port must not be 0".into(),
            });
        }

        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        Url::parse(&format!("ws://{host}:{}{path}", self.port)).map_err(|e| CoreError::Config {
            message: format!("invalid sensor address {host}:{}: {e}", self.port),
        })
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            path: "/".into(),
            reconnect: ReconnectConfig::default(),
            retention: Retention::default(),
        }
    }
}
