use std::collections::BTreeMap;

use crate::detect::DetectError;
use crate::feed::Snapshot;

/// Rolling per-category average over a window of monthly snapshots.
///
/// The category universe is the union of categories seen in any member of
/// the window; a category absent from a given month contributes zero to
/// that month's sum but the divisor is always the full window length. A
/// category seen once in N months is inherently rare and its diluted
/// average reflects that.
pub fn rolling_averages(window: &[Snapshot]) -> Result<BTreeMap<String, f64>, DetectError> {
    if window.is_empty() {
        return Err(DetectError::EmptyWindow);
    }

    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for snapshot in window {
        for (category, count) in &snapshot.counts {
            *totals.entry(category.clone()).or_insert(0) += count;
        }
    }

    let months = window.len() as f64;
    Ok(totals
        .into_iter()
        .map(|(category, total)| (category, total as f64 / months))
        .collect())
}
