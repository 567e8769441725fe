//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use rfidmon_config::ConfigError;
use rfidmon_core::CoreError;

/// Process exit codes. Success is 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to sensor at {url}")]
    #[diagnostic(
        code(rfidmon::connection_failed),
        help(
            "Check that the sensor is powered and on the same network.\n\
             URL: {url}\n\
             Override the address with --device and --port."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Sensor at {url} is not connected; deactivate was not sent")]
    #[diagnostic(
        code(rfidmon::not_connected),
        help("The link dropped before the command could be queued. Try again.")
    )]
    NotConnected { url: String },

    #[error("Deactivate could not be queued for {url}")]
    #[diagnostic(
        code(rfidmon::command_failed),
        help("The link is up but busy. Run with -v for details and try again.")
    )]
    CommandFailed { url: String },

    #[error("No event from the sensor within {seconds}s")]
    #[diagnostic(
        code(rfidmon::timeout),
        help("Increase the wait with --timeout or check that the sensor is publishing.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rfidmon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(rfidmon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: rfidmon config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(rfidmon::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("{0}")]
    #[diagnostic(code(rfidmon::config))]
    Config(ConfigError),

    #[error("{0}")]
    #[diagnostic(code(rfidmon::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(rfidmon::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::ConfigExists { .. }
            | Self::Config(ConfigError::Validation { .. } | ConfigError::UnknownProfile { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_ms } => CliError::Timeout {
                seconds: timeout_ms.div_ceil(1000),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "sensor address".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
