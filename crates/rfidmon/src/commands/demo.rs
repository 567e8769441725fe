//! `demo`: play the scripted sensor through the same feed as `watch`.

use std::time::Duration;

use rfidmon_core::{Retention, SensorSource, SimulatedSource};

use crate::cli::{DemoArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::feed::{self, FeedOptions};

pub async fn handle(args: DemoArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let opts = FeedOptions::from_global(global);
    let sim = SimulatedSource::new(Retention::default());

    output::print_status("Demo mode: simulated sensor (Ctrl-C to stop)", opts.quiet);
    sim.start();

    let deactivator = args.deactivate_after.map(|secs| {
        let sim = sim.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let outcome = sim.deactivate();
            tracing::info!(?outcome, "scheduled demo deactivate");
        })
    });

    let followed = feed::follow(&sim, opts, feed::until_stopped(args.duration)).await;
    if let Some(task) = deactivator {
        task.abort();
    }
    let summary = feed::summarize(&sim);
    sim.stop();
    followed?;

    if !args.no_summary {
        feed::print_summary(&summary, opts)?;
    }
    Ok(())
}
