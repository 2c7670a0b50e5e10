//! Recurring serialized invocation of the run pipeline.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::feed::CrimeFeed;
use crate::notify::AlertSink;
use crate::pipeline::{self, RunOutcome};
use crate::storage::Store;

/// Main polling loop. Each tick runs the pipeline to completion before the
/// next tick is taken, so at most one run is ever in flight against the
/// store. A failed run is logged and left for the next tick to reattempt;
/// the unchanged checkpoint guarantees the same window is retried.
pub async fn run_poll_loop<F>(
    config: RunConfig,
    feed: &F,
    store: &Store,
    sink: &dyn AlertSink,
    interval: Duration,
) where
    F: CrimeFeed + ?Sized,
{
    info!(interval_secs = interval.as_secs(), "Poll loop started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        match pipeline::run(&config, feed, store).await {
            Ok(RunOutcome::NoNewData {
                upstream_last_updated,
            }) => {
                info!(last_updated = %upstream_last_updated.date_naive(), "Nothing new upstream");
            }
            Ok(RunOutcome::Completed(report)) => {
                if report.alerts.is_empty() {
                    info!(run = %report.run_id, categories = report.figures.len(), "All categories within threshold");
                } else {
                    warn!(run = %report.run_id, alerts = report.alerts.len(), "Deviations detected");
                    if let Err(e) = sink.deliver(&report.alerts) {
                        error!(run = %report.run_id, "Failed to deliver alerts: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Run failed: {}", e);
            }
        }
    }
}
