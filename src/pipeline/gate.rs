use chrono::{DateTime, Utc};

/// Whether a run should proceed: strictly newer upstream data only. An
/// equal timestamp means the dataset was already processed. A missing
/// checkpoint (first-ever run) compares as the minimum representable
/// timestamp so the gate always opens.
///
/// The caller persists the new checkpoint only after the full pipeline
/// succeeds; advancing it early and then failing downstream would silently
/// skip real data on the next run.
pub fn should_run(upstream_last_updated: DateTime<Utc>, checkpoint: Option<DateTime<Utc>>) -> bool {
    upstream_last_updated > checkpoint.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_newer_upstream_opens_gate() {
        assert!(should_run(ts(2024, 7, 1), Some(ts(2024, 6, 1))));
    }

    #[test]
    fn test_equal_timestamps_keep_gate_closed() {
        assert!(!should_run(ts(2024, 6, 1), Some(ts(2024, 6, 1))));
    }

    #[test]
    fn test_older_upstream_keeps_gate_closed() {
        assert!(!should_run(ts(2024, 5, 1), Some(ts(2024, 6, 1))));
    }

    #[test]
    fn test_missing_checkpoint_always_opens() {
        assert!(should_run(ts(1971, 1, 1), None));
    }
}
