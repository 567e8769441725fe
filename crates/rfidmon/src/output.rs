//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits tab-separated lines. Live
//! feeds print one line (or document) per event.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use rfidmon_core::{ConnectionState, SensorEvent, SensorState, StateTransition};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Applies the state palette, or nothing when color is off.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn state(self, state: &SensorState) -> String {
        let label = format!("{:<10}", state.as_str());
        if !self.enabled {
            return label;
        }
        match state {
            SensorState::Sensing => label.cyan().to_string(),
            SensorState::Countdown => label.yellow().bold().to_string(),
            SensorState::Alarm => label.red().bold().to_string(),
            SensorState::Authorized => label.green().bold().to_string(),
            SensorState::Other(_) => label.magenta().to_string(),
        }
    }

    pub fn connection(self, state: ConnectionState) -> String {
        let label = state.to_string();
        if !self.enabled {
            return label;
        }
        match state {
            ConnectionState::Connected => label.green().to_string(),
            ConnectionState::Connecting => label.yellow().to_string(),
            ConnectionState::Disconnected => label.red().to_string(),
        }
    }

    pub fn dim(self, text: &str) -> String {
        if self.enabled {
            text.dimmed().to_string()
        } else {
            text.to_owned()
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// - `table`: `detail_fn` returns a pre-formatted block
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: `plain_fn` returns tab-separated lines
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(plain_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Print a status line to stderr, respecting quiet mode.
pub fn print_status(line: &str, quiet: bool) {
    if quiet {
        return;
    }
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Render(e.to_string()))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

// ── Sensor-specific rendering ────────────────────────────────────────

pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn countdown_suffix(event: &SensorEvent) -> String {
    match (event.countdown, event.countdown_progress()) {
        (Some(secs), Some(pct)) => format!("  [{secs}s, {pct}%]"),
        _ => String::new(),
    }
}

/// One event from a live feed. Structured formats emit a self-contained
/// record per event so the stream stays parseable line by line.
pub fn render_event(
    format: OutputFormat,
    event: &SensorEvent,
    painter: Painter,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let uid = event
                .uid_status
                .as_deref()
                .map(|uid| format!("  uid={uid}"))
                .unwrap_or_default();
            Ok(format!(
                "{}  {}  {}{}{}",
                painter.dim(&local_time(event.received_at)),
                painter.state(&event.state),
                event.message,
                countdown_suffix(event),
                painter.dim(&uid),
            ))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => render_json(event, true),
        OutputFormat::Yaml => Ok(format!("---\n{}", render_yaml(event)?.trim_end())),
        OutputFormat::Plain => Ok(plain_event(event)),
    }
}

pub fn plain_event(event: &SensorEvent) -> String {
    format!(
        "{}\t{}\t{}",
        event.received_at.to_rfc3339(),
        event.state,
        event.message
    )
}

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct TransitionRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Since")]
    pub since: String,
}

#[derive(Tabled)]
pub struct StateCountRow {
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Entered")]
    pub count: usize,
    #[tabled(rename = "Activity")]
    pub activity: String,
}

fn activity_bar(state: &SensorState) -> String {
    let level = usize::from(state.activity_level());
    format!("{:<5} {level}", "#".repeat(level))
}

// ── Session summary ──────────────────────────────────────────────────

/// Totals printed when a `watch` or `demo` session ends.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub source: String,
    pub connection: ConnectionState,
    pub total_events: u64,
    pub countdown_progress: u8,
    pub last_update: Option<DateTime<Utc>>,
    pub current: Option<SensorEvent>,
    pub history: Vec<StateTransition>,
    pub state_counts: BTreeMap<String, usize>,
}

pub fn render_summary(
    format: OutputFormat,
    summary: &Summary,
    painter: Painter,
) -> Result<String, CliError> {
    render_single(
        format,
        summary,
        |s| summary_detail(s, painter),
        |s| {
            format!(
                "events\t{}\ntransitions\t{}\nprogress\t{}",
                s.total_events,
                s.history.len(),
                s.countdown_progress
            )
        },
    )
}

fn summary_detail(summary: &Summary, painter: Painter) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "Source:       {}", summary.source);
    let _ = writeln!(out, "Connection:   {}", painter.connection(summary.connection));
    let _ = writeln!(out, "Events:       {}", summary.total_events);
    let _ = writeln!(out, "Transitions:  {}", summary.history.len());
    let _ = writeln!(out, "Countdown:    {}%", summary.countdown_progress);
    if let Some(at) = summary.last_update {
        let _ = writeln!(out, "Last update:  {}", local_time(at));
    }
    if let Some(ref current) = summary.current {
        let _ = writeln!(
            out,
            "Current:      {} {}",
            painter.state(&current.state),
            current.message
        );
    }

    if !summary.history.is_empty() {
        let rows: Vec<TransitionRow> = summary
            .history
            .iter()
            .enumerate()
            .map(|(i, t)| TransitionRow {
                index: i + 1,
                state: t.state.to_string(),
                since: local_time(t.occurred_at),
            })
            .collect();
        let _ = writeln!(out, "\n{}", render_table(&rows));

        let counts: Vec<StateCountRow> = summary
            .state_counts
            .iter()
            .map(|(state, count)| {
                let parsed = SensorState::from(state.as_str());
                StateCountRow {
                    state: state.clone(),
                    count: *count,
                    activity: activity_bar(&parsed),
                }
            })
            .collect();
        let _ = write!(out, "\n{}", render_table(&counts));
    }

    out.trim_end().to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> SensorEvent {
        SensorEvent::new("COUNTDOWN", "Unknown card")
            .with_countdown(7)
            .with_uid_status("UNKNOWN_UID_789ABC")
    }

    #[test]
    fn table_event_line_without_color() {
        let line = render_event(OutputFormat::Table, &sample(), Painter::new(false)).unwrap();
        assert!(line.contains("COUNTDOWN "));
        assert!(line.contains("Unknown card  [7s, 30%]"));
        assert!(line.ends_with("uid=UNKNOWN_UID_789ABC"));
    }

    #[test]
    fn json_event_is_single_line() {
        let line = render_event(OutputFormat::Json, &sample(), Painter::new(false)).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["state"], "COUNTDOWN");
        assert_eq!(value["countdown"], 7);
    }

    #[test]
    fn yaml_event_is_a_document() {
        let doc = render_event(OutputFormat::Yaml, &sample(), Painter::new(false)).unwrap();
        assert!(doc.starts_with("---\n"));
        assert!(doc.contains("state: COUNTDOWN"));
    }

    #[test]
    fn plain_event_is_tab_separated() {
        let line = plain_event(&SensorEvent::new("ALARM", "intruder"));
        let fields: Vec<_> = line.split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "ALARM");
    }

    #[test]
    fn activity_bar_scales_with_level() {
        assert_eq!(activity_bar(&SensorState::Alarm), "##### 5");
        assert_eq!(activity_bar(&SensorState::Other("X".into())), "      0");
    }
}
