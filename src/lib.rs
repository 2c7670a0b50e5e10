//! Crimewatch -- street-crime anomaly monitor for the data.police.uk API.
//!
//! This crate polls the upstream feed for new monthly datasets, maintains a
//! rolling per-category baseline over a configurable window of months, and
//! flags categories whose latest figures deviate from that baseline by more
//! than a configured percentage.

pub mod config;
pub mod detect;
pub mod feed;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod storage;

use std::time::Duration;

use anyhow::Result;

use config::Settings;
use feed::PoliceClient;
use notify::LogSink;
use pipeline::RunOutcome;
use storage::Store;

/// Open storage, build the feed client, and execute a single pipeline run.
pub async fn run_once(settings: &Settings) -> Result<RunOutcome> {
    let run_config = settings.watch.resolve()?;

    tracing::info!(db_path = %settings.storage.db_path.display(), "Initializing database");
    let pool = storage::open_pool(&settings.storage.db_path)?;
    let store = Store::new(pool);

    let feed = PoliceClient::new(
        settings.upstream.base_url.clone(),
        Duration::from_secs(settings.upstream.timeout_secs),
    );

    Ok(pipeline::run(&run_config, &feed, &store).await?)
}

/// Start the crimewatch daemon: storage, feed client, and the poll loop.
pub async fn serve(settings: &Settings) -> Result<()> {
    let run_config = settings.watch.resolve()?;

    tracing::info!(db_path = %settings.storage.db_path.display(), "Initializing database");
    let pool = storage::open_pool(&settings.storage.db_path)?;
    let store = Store::new(pool);

    let feed = PoliceClient::new(
        settings.upstream.base_url.clone(),
        Duration::from_secs(settings.upstream.timeout_secs),
    );
    let sink = LogSink;

    scheduler::run_poll_loop(
        run_config,
        &feed,
        &store,
        &sink,
        Duration::from_secs(settings.scheduler.poll_interval_secs),
    )
    .await;

    Ok(())
}
