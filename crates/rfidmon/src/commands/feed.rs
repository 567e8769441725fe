//! Live feed shared by `watch` and `demo`: prints every new log entry and
//! every connection change until told to stop, then the session summary.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rfidmon_core::{ConnectionState, SensorEvent, SensorSource};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Painter, Summary};

#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    pub format: OutputFormat,
    pub painter: Painter,
    pub quiet: bool,
}

impl FeedOptions {
    pub fn from_global(global: &GlobalOpts) -> Self {
        Self {
            format: global.output,
            painter: Painter::new(output::should_color(global.color)),
            quiet: global.quiet,
        }
    }
}

/// Resolves on Ctrl-C, or after `duration_secs` if given.
pub async fn until_stopped(duration_secs: Option<u64>) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; rely on the duration alone.
            std::future::pending::<()>().await;
        }
    };

    match duration_secs {
        Some(secs) => {
            tokio::select! {
                () = ctrl_c => {}
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => ctrl_c.await,
    }
}

/// Print the source's feed until `stop` resolves or the source goes away.
pub async fn follow<S>(
    source: &S,
    opts: FeedOptions,
    stop: impl Future<Output = ()>,
) -> Result<(), CliError>
where
    S: SensorSource + ?Sized,
{
    let mut log = source.store().subscribe_log();
    let mut connection = source.connection_state();
    let mut last_printed: Option<Arc<SensorEvent>> = None;

    print_connection(*connection.current(), opts);
    print_new(log.current(), &mut last_printed, opts)?;

    tokio::pin!(stop);
    loop {
        tokio::select! {
            biased;
            () = &mut stop => break,
            snapshot = log.changed() => {
                let Some(snapshot) = snapshot else { break };
                print_new(&snapshot, &mut last_printed, opts)?;
            }
            state = connection.changed() => {
                let Some(state) = state else { break };
                print_connection(state, opts);
            }
        }

        for warning in source.take_warnings() {
            output::print_status(&format!("warning: {warning}"), opts.quiet);
        }
    }

    Ok(())
}

/// Print the entries after `last_printed`. If it is no longer in the
/// snapshot (evicted, or the log was reset) everything is new.
fn print_new(
    snapshot: &[Arc<SensorEvent>],
    last_printed: &mut Option<Arc<SensorEvent>>,
    opts: FeedOptions,
) -> Result<(), CliError> {
    let start = last_printed
        .as_ref()
        .and_then(|prev| snapshot.iter().rposition(|e| Arc::ptr_eq(e, prev)))
        .map_or(0, |i| i + 1);

    for event in snapshot.iter().skip(start) {
        let line = output::render_event(opts.format, event, opts.painter)?;
        output::print_output(&line, opts.quiet);
    }

    if let Some(last) = snapshot.last() {
        *last_printed = Some(Arc::clone(last));
    }
    Ok(())
}

fn print_connection(state: ConnectionState, opts: FeedOptions) {
    let line = format!("{} {}", opts.painter.dim("connection:"), opts.painter.connection(state));
    output::print_status(&line, opts.quiet);
}

/// Snapshot the source's views for the end-of-session summary.
pub fn summarize<S>(source: &S) -> Summary
where
    S: SensorSource + ?Sized,
{
    let store = source.store();
    Summary {
        source: source.description().to_owned(),
        connection: source.connection_state().latest(),
        total_events: store.total_events(),
        countdown_progress: store.countdown_progress(),
        last_update: store.last_update(),
        current: store.current().map(|e| e.as_ref().clone()),
        history: store.history_snapshot().as_ref().clone(),
        state_counts: store
            .state_counts()
            .into_iter()
            .map(|(state, count)| (state.to_string(), count))
            .collect(),
    }
}

pub fn print_summary(summary: &Summary, opts: FeedOptions) -> Result<(), CliError> {
    let mut rendered = output::render_summary(opts.format, summary, opts.painter)?;
    if opts.format == OutputFormat::Table {
        rendered.insert(0, '\n');
    }
    output::print_output(&rendered, opts.quiet);
    Ok(())
}
