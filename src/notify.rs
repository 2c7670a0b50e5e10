//! Alert delivery.

use anyhow::Result;
use tracing::warn;

use crate::detect::AlertSet;

/// Where a run's alerts go. The pipeline returns the alert set by value
/// and stays independent of any delivery transport; callers pick the sink.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alerts: &AlertSet) -> Result<()>;
}

/// Sink that emits one structured warning per alerting category.
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, alerts: &AlertSet) -> Result<()> {
        for (category, deviation) in alerts {
            warn!(%category, %deviation, "crime level outside baseline");
        }
        Ok(())
    }
}
