//! Upstream crime feed -- trait seam, monthly snapshots, window fetching.

pub mod police;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use police::PoliceClient;

/// Errors from the upstream feed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (network, non-2xx, JSON decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was syntactically valid but not what the feed promises.
    #[error("malformed upstream payload: {message}")]
    Payload { message: String },
}

/// A point the upstream API accepts as a street-level query location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A `YYYY-MM` query key for one calendar month of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One raw incident record as returned by the street-crime endpoint.
/// The upstream object carries many more fields; only the category matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct CrimeRecord {
    pub category: String,
}

/// Per-category incident counts for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub month: MonthKey,
    pub counts: BTreeMap<String, u64>,
}

impl Snapshot {
    /// Reduce a raw incident list to per-category counts. Categories never
    /// seen before become new entries; a month with no records for a
    /// category simply has no entry (read back as zero via [`Self::count`]).
    pub fn from_records(month: MonthKey, records: &[CrimeRecord]) -> Self {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in records {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }
        Self { month, counts }
    }

    /// Count for a category, absent meaning zero.
    pub fn count(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }
}

/// The upstream feed the pipeline consumes. Production uses
/// [`PoliceClient`]; tests script their own implementation.
#[async_trait::async_trait]
pub trait CrimeFeed: Send + Sync {
    /// Date of the most recent dataset published upstream.
    async fn last_updated(&self) -> Result<DateTime<Utc>, TransportError>;

    /// Fetch one month of street-crime data and reduce it to a snapshot.
    async fn monthly_snapshot(
        &self,
        location: Location,
        month: MonthKey,
    ) -> Result<Snapshot, TransportError>;
}

/// Fetch every month in `months` concurrently. The returned order matches
/// the input order (most-recent first); the first failure fails the whole
/// window. No retries here -- a deviation computed from a partial window
/// would be worse than none.
pub async fn fetch_window<F>(
    feed: &F,
    location: Location,
    months: &[MonthKey],
) -> Result<Vec<Snapshot>, TransportError>
where
    F: CrimeFeed + ?Sized,
{
    let fetches = months
        .iter()
        .map(|&month| feed.monthly_snapshot(location, month));
    futures::future::try_join_all(fetches).await
}
