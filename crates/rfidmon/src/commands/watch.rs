//! `watch`: follow a live sensor.

use rfidmon_core::Monitor;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::feed::{self, FeedOptions};

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config(global)?;
    let monitor = Monitor::new(config::monitor_config(global, &cfg)?)?;
    let opts = FeedOptions::from_global(global);

    output::print_status(&format!("Watching {} (Ctrl-C to stop)", monitor.url()), opts.quiet);
    monitor.start().await;

    // Stop on Ctrl-C, the duration, or the link being abandoned.
    let stop = async {
        tokio::select! {
            () = feed::until_stopped(args.duration) => {}
            _ = monitor.wait_failure() => {}
        }
    };
    let followed = feed::follow(&monitor, opts, stop).await;
    let summary = feed::summarize(&monitor);
    let failure = monitor.failure();
    monitor.shutdown().await;
    followed?;

    tracing::debug!(
        frames_parsed = monitor.manager().frames_parsed(),
        frames_rejected = monitor.manager().frames_rejected(),
        reconnects = monitor.manager().reconnects_scheduled(),
        "watch finished"
    );

    if !args.no_summary {
        feed::print_summary(&summary, opts)?;
    }
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
