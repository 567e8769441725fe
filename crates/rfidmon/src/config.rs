//! CLI configuration: thin wrapper around `rfidmon_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--device,
//! --port, --reconnect-interval-ms, --config).

use std::path::PathBuf;

use rfidmon_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use rfidmon_config::{Config, Profile};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` if given, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(rfidmon_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(rfidmon_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile and apply flag overrides on top of it.
pub fn resolve_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let (name, mut profile) = match cfg.resolve_profile(global.profile.as_deref()) {
        Ok(found) => found,
        Err(rfidmon_config::ConfigError::UnknownProfile { name }) => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            let available = if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            };
            return Err(CliError::ProfileNotFound { name, available });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref device) = global.device {
        profile.ip.clone_from(device);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(interval) = global.reconnect_interval_ms {
        profile.reconnect_interval_ms = interval;
    }

    Ok((name, profile))
}

/// Build the `MonitorConfig` for this invocation.
pub fn monitor_config(global: &GlobalOpts, cfg: &Config) -> Result<MonitorConfig, CliError> {
    let (name, profile) = resolve_profile(global, cfg)?;
    tracing::debug!(profile = %name, ip = %profile.ip, port = profile.port, "resolved profile");
    Ok(rfidmon_config::profile_to_monitor_config(&profile)?)
}
