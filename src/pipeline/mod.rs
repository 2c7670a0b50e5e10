//! The run pipeline: update gate -> window plan -> fetch -> aggregate ->
//! detect, with state persisted so the next invocation resumes correctly.

pub mod gate;
pub mod window;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ConfigError, RunConfig};
use crate::detect::{baseline, deviation, AlertSet, CategoryFigures, DetectError};
use crate::feed::{self, CrimeFeed, MonthKey, TransportError};
use crate::storage::{CacheError, Store};

/// Single failure value surfaced to the invoking caller. Any of these
/// aborts the run before the checkpoint is touched.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("upstream fetch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("state persistence failed: {0}")]
    Cache(#[from] CacheError),

    #[error("aggregation failed: {0}")]
    Detect(#[from] DetectError),
}

/// What a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Upstream "last updated" date this run processed.
    pub data_as_of: DateTime<Utc>,
    /// Months covered, most-recent first.
    pub months: Vec<MonthKey>,
    pub figures: CategoryFigures,
    pub alerts: AlertSet,
}

/// Outcome of one pipeline invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// Gate closed: upstream has published nothing newer than the
    /// checkpoint. No fetches were issued, nothing was persisted.
    NoNewData { upstream_last_updated: DateTime<Utc> },
    Completed(RunReport),
}

/// Diagnostics envelope persisted after every completed run. Read back by
/// the `figures` CLI command; never consumed by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiguresRecord {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub data_as_of: DateTime<Utc>,
    pub months: Vec<MonthKey>,
    pub figures: CategoryFigures,
}

/// Execute one run. Each invocation constructs fresh state and terminates;
/// callers must not overlap invocations against the same store (the
/// checkpoint-write-after-success discipline is not safe under concurrent
/// runs).
pub async fn run<F>(config: &RunConfig, feed: &F, store: &Store) -> Result<RunOutcome, RunError>
where
    F: CrimeFeed + ?Sized,
{
    config.validate()?;
    let run_id = Uuid::new_v4();

    info!(%run_id, "checking upstream for new data");
    let upstream = feed.last_updated().await?;
    let checkpoint = store.read_checkpoint()?;

    if !gate::should_run(upstream, checkpoint) {
        info!(%run_id, last_updated = %upstream, "no new data since last run");
        return Ok(RunOutcome::NoNewData {
            upstream_last_updated: upstream,
        });
    }

    let months = window::plan(upstream.date_naive(), config.month_count);
    info!(
        %run_id,
        months = months.len(),
        data_as_of = %upstream.date_naive(),
        "fetching snapshot window"
    );
    let snapshots = feed::fetch_window(feed, config.location, &months).await?;

    let Some(most_recent) = snapshots.first() else {
        return Err(DetectError::EmptyWindow.into());
    };

    debug!(%run_id, "aggregating rolling averages");
    let averages = baseline::rolling_averages(&snapshots)?;

    debug!(%run_id, categories = averages.len(), "detecting deviations");
    let (figures, alerts) = deviation::evaluate(most_recent, &averages, config.threshold_percent);

    // Diagnostics first; the checkpoint write is the last side effect of a
    // successful run, so any failure leaves the old checkpoint in place and
    // the next run reattempts the same window.
    store.write_figures(&FiguresRecord {
        run_id,
        generated_at: Utc::now(),
        data_as_of: upstream,
        months: months.clone(),
        figures: figures.clone(),
    })?;
    store.write_checkpoint(upstream)?;

    info!(%run_id, alerts = alerts.len(), "run complete");
    Ok(RunOutcome::Completed(RunReport {
        run_id,
        data_as_of: upstream,
        months,
        figures,
        alerts,
    }))
}
