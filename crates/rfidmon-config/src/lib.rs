//! Shared configuration for rfidmon.
//!
//! TOML profiles, layered loading (defaults, file, environment), and
//! translation to `rfidmon_core::MonitorConfig`. The CLI adds flag-aware
//! overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rfidmon_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use rfidmon_core::{Backoff, MonitorConfig, ReconnectConfig, Retention};

/// Prefix for environment overrides, e.g.
/// `RFIDMON_PROFILES__LAB__IP=10.0.0.7`.
pub const ENV_PREFIX: &str = "RFIDMON_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named sensor profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve the profile to use.
    ///
    /// An explicit `name` must exist, except `"default"`, which falls back
    /// to factory settings. Without a name the `default_profile` is used,
    /// again falling back to factory settings when it is not defined.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let wanted = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());

        match self.profiles.get(&wanted) {
            Some(profile) => Ok((wanted, profile.clone())),
            None if name.is_none() || wanted == "default" => Ok((wanted, Profile::default())),
            None => Err(ConfigError::UnknownProfile { name: wanted }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for the link before a one-shot command gives up.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named sensor profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Sensor IP address or host name.
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket request path.
    #[serde(default = "default_path")]
    pub path: String,

    /// Delay before reconnecting after the link drops.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Ceiling for exponential backoff.
    pub max_reconnect_delay_ms: Option<u64>,

    /// "fixed" or "exponential".
    #[serde(default = "default_backoff")]
    pub backoff: String,

    /// Give up after this many consecutive failures. Unset retries forever.
    pub max_reconnect_attempts: Option<u32>,

    /// Limit on a single connection attempt.
    pub connect_timeout_ms: Option<u64>,

    /// Events kept in memory (oldest evicted first).
    pub log_capacity: Option<usize>,

    /// State transitions kept in memory.
    pub history_capacity: Option<usize>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            path: default_path(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_delay_ms: None,
            backoff: default_backoff(),
            max_reconnect_attempts: None,
            connect_timeout_ms: None,
            log_capacity: None,
            history_capacity: None,
        }
    }
}

fn default_ip() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_path() -> String {
    "/".into()
}
fn default_reconnect_interval_ms() -> u64 {
    5000
}
fn default_backoff() -> String {
    "fixed".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "rfidmon", "rfidmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("rfidmon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` (usually [`config_path()`]) plus the environment.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to pretty TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile translation ─────────────────────────────────────────────

pub fn parse_backoff(raw: &str) -> Result<Backoff, ConfigError> {
    match raw {
        "fixed" => Ok(Backoff::Fixed),
        "exponential" => Ok(Backoff::Exponential),
        other => Err(invalid(
            "backoff",
            format!("expected 'fixed' or 'exponential', got '{other}'"),
        )),
    }
}

fn nonzero_capacity(field: &str, value: Option<usize>) -> Result<Option<usize>, ConfigError> {
    match value {
        Some(0) => Err(invalid(field, "must be at least 1")),
        other => Ok(other),
    }
}

/// Build a `MonitorConfig` from a profile, validating every field.
pub fn profile_to_monitor_config(profile: &Profile) -> Result<MonitorConfig, ConfigError> {
    if profile.ip.trim().is_empty() {
        return Err(invalid("ip", "must not be empty"));
    }
    if profile.port == 0 {
        return Err(invalid("port", "must not be 0"));
    }
    if profile.reconnect_interval_ms == 0 {
        return Err(invalid("reconnect_interval_ms", "must be greater than 0"));
    }

    let backoff = parse_backoff(&profile.backoff)?;
    let initial_delay = Duration::from_millis(profile.reconnect_interval_ms);
    let defaults = ReconnectConfig::default();
    let max_delay = profile
        .max_reconnect_delay_ms
        .map_or(defaults.max_delay, Duration::from_millis)
        .max(initial_delay);

    let retention_defaults = Retention::default();
    let retention = Retention {
        log_capacity: nonzero_capacity("log_capacity", profile.log_capacity)?
            .or(retention_defaults.log_capacity),
        history_capacity: nonzero_capacity("history_capacity", profile.history_capacity)?
            .or(retention_defaults.history_capacity),
    };

    let config = MonitorConfig {
        host: profile.ip.trim().to_owned(),
        port: profile.port,
        path: profile.path.clone(),
        reconnect: ReconnectConfig {
            initial_delay,
            max_delay,
            backoff,
            max_retries: profile.max_reconnect_attempts,
            connect_timeout: profile.connect_timeout_ms.map(Duration::from_millis),
        },
        retention,
    };

    // Surface URL problems at load time rather than at connect time.
    config
        .ws_url()
        .map_err(|e| invalid("ip", e.to_string()))?;
    Ok(config)
}
