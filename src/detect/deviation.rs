use std::collections::BTreeMap;

use crate::detect::{AlertSet, CategoryFigure, CategoryFigures, Deviation};
use crate::feed::Snapshot;

/// Compare the most recent snapshot against the rolling averages.
///
/// Iterates the averages' category universe (already the union over the
/// window, so nothing diverges between aggregation and detection) and
/// returns both the full figure set for diagnostics and the filtered
/// alert set. Pure; neither input is mutated.
pub fn evaluate(
    most_recent: &Snapshot,
    averages: &BTreeMap<String, f64>,
    threshold_percent: f64,
) -> (CategoryFigures, AlertSet) {
    let mut figures = CategoryFigures::new();
    let mut alerts = AlertSet::new();

    for (category, &average) in averages {
        let current = most_recent.count(category);

        let deviation = if average > 0.0 {
            Deviation::Relative {
                percent: (current as f64 - average) / average * 100.0,
            }
        } else if current > 0 {
            Deviation::NewActivity
        } else {
            Deviation::Relative { percent: 0.0 }
        };

        if deviation.exceeds(threshold_percent) {
            alerts.insert(category.clone(), deviation);
        }
        figures.insert(category.clone(), CategoryFigure { average, deviation });
    }

    (figures, alerts)
}
