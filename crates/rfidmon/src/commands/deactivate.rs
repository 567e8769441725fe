//! `deactivate`: connect, send the deactivate command, disconnect.

use std::time::Duration;

use serde::Serialize;

use rfidmon_core::{CommandOutcome, Monitor, SensorSource};

use crate::cli::{DeactivateArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DeactivateReport {
    url: String,
    command: &'static str,
    sent: bool,
}

pub async fn handle(args: DeactivateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config(global)?;
    let timeout_secs = args.timeout.unwrap_or(cfg.defaults.timeout);
    let monitor = Monitor::new(config::monitor_config(global, &cfg)?)?;
    let url = monitor.url().to_string();

    monitor.start().await;
    let connected =
        tokio::time::timeout(Duration::from_secs(timeout_secs), monitor.wait_connected()).await;
    if !matches!(connected, Ok(true)) {
        monitor.shutdown().await;
        return Err(CliError::ConnectionFailed {
            url,
            reason: format!("no connection within {timeout_secs}s"),
        });
    }

    let outcome = monitor.deactivate();
    // Shutdown flushes the queued command before closing the socket.
    monitor.shutdown().await;

    for warning in monitor.take_warnings() {
        tracing::warn!(%warning, "deactivate");
    }
    match outcome {
        CommandOutcome::Sent => {}
        CommandOutcome::NotConnected => return Err(CliError::NotConnected { url }),
        CommandOutcome::Failed => return Err(CliError::CommandFailed { url }),
    }

    let report = DeactivateReport {
        url,
        command: "deactivate",
        sent: outcome.is_sent(),
    };
    let rendered = output::render_single(
        global.output,
        &report,
        |r| format!("Deactivate command sent to {}", r.url),
        |r| r.url.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
