//! End-to-end pipeline tests against a scripted feed and a real SQLite store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use crimewatch::config::RunConfig;
use crimewatch::detect::Deviation;
use crimewatch::feed::{CrimeFeed, Location, MonthKey, Snapshot, TransportError};
use crimewatch::pipeline::{self, RunError, RunOutcome};
use crimewatch::storage::{open_pool, Store};

/// Feed serving a fixed last-updated date and canned monthly counts.
struct ScriptedFeed {
    last_updated: DateTime<Utc>,
    months: BTreeMap<String, BTreeMap<String, u64>>,
    failing_month: Option<String>,
    snapshot_calls: AtomicUsize,
}

impl ScriptedFeed {
    fn new(last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            months: BTreeMap::new(),
            failing_month: None,
            snapshot_calls: AtomicUsize::new(0),
        }
    }

    fn with_month(mut self, key: &str, counts: &[(&str, u64)]) -> Self {
        self.months.insert(
            key.to_string(),
            counts.iter().map(|(c, n)| (c.to_string(), *n)).collect(),
        );
        self
    }

    fn with_failing_month(mut self, key: &str) -> Self {
        self.failing_month = Some(key.to_string());
        self
    }

    fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CrimeFeed for ScriptedFeed {
    async fn last_updated(&self) -> Result<DateTime<Utc>, TransportError> {
        Ok(self.last_updated)
    }

    async fn monthly_snapshot(
        &self,
        _location: Location,
        month: MonthKey,
    ) -> Result<Snapshot, TransportError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);

        let key = month.to_string();
        if self.failing_month.as_deref() == Some(key.as_str()) {
            return Err(TransportError::Payload {
                message: format!("scripted failure for {key}"),
            });
        }

        let counts = self.months.get(&key).cloned().unwrap_or_default();
        Ok(Snapshot { month, counts })
    }
}

fn config(month_count: u32, threshold_percent: f64) -> RunConfig {
    RunConfig {
        location: Location {
            latitude: 51.5074,
            longitude: -0.1278,
        },
        month_count,
        threshold_percent,
    }
}

fn store_in(dir: &tempfile::TempDir) -> Store {
    Store::new(open_pool(&dir.path().join("state.db")).unwrap())
}

fn march() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_first_run_processes_the_full_window() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);

    // burglary: (18 + 9 + 0) / 3 = 9 -> +100%
    // drugs: steady at 2 -> 0%
    let feed = ScriptedFeed::new(march())
        .with_month("2024-03", &[("burglary", 18), ("drugs", 2)])
        .with_month("2024-02", &[("burglary", 9), ("drugs", 2)])
        .with_month("2024-01", &[("drugs", 2)]);

    let outcome = pipeline::run(&config(3, 99.9), &feed, &store).await.unwrap();

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(feed.snapshot_calls(), 3);
    let months: Vec<String> = report.months.iter().map(|m| m.to_string()).collect();
    assert_eq!(months, vec!["2024-03", "2024-02", "2024-01"]);

    assert_eq!(report.figures.len(), 2);
    assert_eq!(report.figures["burglary"].average, 9.0);
    assert_eq!(
        report.alerts.get("burglary"),
        Some(&Deviation::Relative { percent: 100.0 })
    );
    assert!(!report.alerts.contains_key("drugs"));

    // Checkpoint advanced to the processed dataset's date.
    assert_eq!(store.read_checkpoint().unwrap(), Some(march()));

    // Figures persisted as diagnostics, matching what the run returned.
    let record = store.read_figures().unwrap().unwrap();
    assert_eq!(record.run_id, report.run_id);
    assert_eq!(record.data_as_of, march());
    assert_eq!(record.figures, report.figures);
}

#[tokio::test]
async fn test_gate_closed_run_issues_no_fetches() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);
    store.write_checkpoint(march()).unwrap();

    let feed = ScriptedFeed::new(march()).with_month("2024-03", &[("burglary", 18)]);

    let outcome = pipeline::run(&config(3, 50.0), &feed, &store).await.unwrap();

    assert!(matches!(outcome, RunOutcome::NoNewData { .. }));
    assert_eq!(feed.snapshot_calls(), 0);
    assert!(store.read_figures().unwrap().is_none());
    assert_eq!(store.read_checkpoint().unwrap(), Some(march()));
}

#[tokio::test]
async fn test_completed_run_makes_the_next_one_a_noop() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);

    let feed = ScriptedFeed::new(march())
        .with_month("2024-03", &[("burglary", 5)])
        .with_month("2024-02", &[("burglary", 5)]);

    let first = pipeline::run(&config(2, 10.0), &feed, &store).await.unwrap();
    assert!(matches!(first, RunOutcome::Completed(_)));
    assert_eq!(feed.snapshot_calls(), 2);

    let second = pipeline::run(&config(2, 10.0), &feed, &store).await.unwrap();
    assert!(matches!(second, RunOutcome::NoNewData { .. }));
    assert_eq!(feed.snapshot_calls(), 2);
}

#[tokio::test]
async fn test_one_failed_month_aborts_the_whole_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);

    let feed = ScriptedFeed::new(march())
        .with_month("2024-03", &[("burglary", 18)])
        .with_month("2024-01", &[("burglary", 9)])
        .with_failing_month("2024-02");

    let err = pipeline::run(&config(3, 50.0), &feed, &store)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Transport(_)));
    // No partial state: checkpoint untouched, no diagnostics, so the next
    // run reattempts the same window.
    assert_eq!(store.read_checkpoint().unwrap(), None);
    assert!(store.read_figures().unwrap().is_none());
}

#[tokio::test]
async fn test_category_vanishing_from_latest_month_alerts() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);

    let feed = ScriptedFeed::new(march())
        .with_month("2024-03", &[("drugs", 3)])
        .with_month("2024-02", &[("drugs", 3), ("robbery", 6)])
        .with_month("2024-01", &[("drugs", 3), ("robbery", 6)]);

    let outcome = pipeline::run(&config(3, 99.0), &feed, &store).await.unwrap();

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    // robbery: average 4, latest 0 -> -100%
    assert_eq!(
        report.alerts.get("robbery"),
        Some(&Deviation::Relative { percent: -100.0 })
    );
    assert!(!report.alerts.contains_key("drugs"));
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_io() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);
    let feed = ScriptedFeed::new(march());

    let err = pipeline::run(&config(0, 50.0), &feed, &store)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Config(_)));
    assert_eq!(feed.snapshot_calls(), 0);
    assert_eq!(store.read_checkpoint().unwrap(), None);
}

#[tokio::test]
async fn test_checkpoint_reset_forces_reprocessing() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_in(&dir);

    let feed = ScriptedFeed::new(march()).with_month("2024-03", &[("burglary", 4)]);

    let first = pipeline::run(&config(1, 50.0), &feed, &store).await.unwrap();
    assert!(matches!(first, RunOutcome::Completed(_)));

    store.clear_checkpoint().unwrap();

    let again = pipeline::run(&config(1, 50.0), &feed, &store).await.unwrap();
    assert!(matches!(again, RunOutcome::Completed(_)));
    assert_eq!(feed.snapshot_calls(), 2);
}
