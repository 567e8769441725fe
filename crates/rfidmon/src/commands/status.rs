//! `status`: one-shot read of the sensor's current state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use rfidmon_core::{ConnectionState, Monitor, SensorEvent, SensorSource};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

#[derive(Debug, Serialize)]
struct StatusReport {
    url: String,
    #[serde(flatten)]
    event: SensorEvent,
    countdown_progress: Option<u8>,
}

fn detail(report: &StatusReport, painter: Painter) -> String {
    use std::fmt::Write;

    let event = &report.event;
    let mut out = String::new();
    let _ = writeln!(out, "Sensor:     {}", report.url);
    let _ = writeln!(out, "State:      {}", painter.state(&event.state).trim_end());
    let _ = writeln!(out, "Message:    {}", event.message);
    if let (Some(secs), Some(pct)) = (event.countdown, report.countdown_progress) {
        let _ = writeln!(out, "Countdown:  {secs}s ({pct}%)");
    }
    if let Some(ref uid) = event.uid_status {
        let _ = writeln!(out, "UID:        {uid}");
    }
    let _ = write!(out, "Received:   {}", output::local_time(event.received_at));
    out
}

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config(global)?;
    let timeout_secs = args.timeout.unwrap_or(cfg.defaults.timeout);
    let monitor = Monitor::new(config::monitor_config(global, &cfg)?)?;
    let url = monitor.url().to_string();

    monitor.start().await;
    let mut current = monitor.store().subscribe_current();
    let first = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
        loop {
            if let Some(event) = current.current().clone() {
                return Some(event);
            }
            current.changed().await?;
        }
    })
    .await;
    let connected_at_some_point = monitor.manager().frames_parsed() > 0
        || monitor.current_connection_state() == ConnectionState::Connected;
    monitor.shutdown().await;

    let event: Arc<SensorEvent> = match first {
        Ok(Some(event)) => event,
        Ok(None) => return Err(CliError::Internal("sensor store closed".into())),
        Err(_) if connected_at_some_point => return Err(CliError::Timeout { seconds: timeout_secs }),
        Err(_) => {
            return Err(CliError::ConnectionFailed {
                url,
                reason: format!("no connection within {timeout_secs}s"),
            });
        }
    };

    let report = StatusReport {
        url,
        countdown_progress: event.countdown_progress(),
        event: event.as_ref().clone(),
    };
    let painter = Painter::new(output::should_color(global.color));
    let rendered = output::render_single(
        global.output,
        &report,
        |r| detail(r, painter),
        |r| output::plain_event(&r.event),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
