use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CrimeFeed, CrimeRecord, Location, MonthKey, Snapshot, TransportError};

/// Default public instance of the UK police open data API.
pub const DEFAULT_BASE_URL: &str = "https://data.police.uk";

/// Body of `GET /api/crime-last-updated`.
#[derive(Debug, Deserialize)]
struct LastUpdated {
    date: String,
}

/// HTTP client for the data.police.uk street-crime endpoints.
pub struct PoliceClient {
    client: Client,
    base_url: String,
}

impl PoliceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl CrimeFeed for PoliceClient {
    async fn last_updated(&self) -> Result<DateTime<Utc>, TransportError> {
        let url = format!("{}/api/crime-last-updated", self.base_url);
        let body: LastUpdated = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_feed_date(&body.date).ok_or_else(|| TransportError::Payload {
            message: format!("unparseable last-updated date '{}'", body.date),
        })
    }

    async fn monthly_snapshot(
        &self,
        location: Location,
        month: MonthKey,
    ) -> Result<Snapshot, TransportError> {
        let url = format!("{}/api/crimes-street/all-crime", self.base_url);
        debug!(%month, lat = location.latitude, lng = location.longitude, "fetching street-crime data");

        let records: Vec<CrimeRecord> = self
            .client
            .get(&url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lng", location.longitude.to_string()),
                ("date", month.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Snapshot::from_records(month, &records))
    }
}

/// The live endpoint returns a bare ISO date; some mirrors return a full
/// RFC 3339 timestamp. Accept both, reading a bare date as midnight UTC.
fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}
