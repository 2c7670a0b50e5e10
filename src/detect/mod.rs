//! Baseline aggregation and deviation detection.

pub mod baseline;
pub mod deviation;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("cannot aggregate an empty snapshot window")]
    EmptyWindow,
}

/// How a category's latest count relates to its rolling average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deviation {
    /// Signed percentage difference against a nonzero average.
    Relative { percent: f64 },
    /// Nonzero count against a zero average -- an unbounded relative
    /// increase, always worth alerting on.
    NewActivity,
}

impl Deviation {
    /// Strict comparison on magnitudes, so a configured threshold of -50
    /// behaves exactly like +50 and a deviation equal to the threshold is
    /// not included.
    pub fn exceeds(&self, threshold_percent: f64) -> bool {
        match self {
            Deviation::Relative { percent } => percent.abs() > threshold_percent.abs(),
            Deviation::NewActivity => true,
        }
    }
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deviation::Relative { percent } => write!(f, "{:+.1}%", percent),
            Deviation::NewActivity => write!(f, "new activity (no baseline)"),
        }
    }
}

/// Rolling average and latest deviation for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFigure {
    pub average: f64,
    pub deviation: Deviation,
}

/// Per-category figures for a whole window, persisted as a diagnostic
/// reference after each completed run.
pub type CategoryFigures = BTreeMap<String, CategoryFigure>;

/// Categories whose deviation magnitude crossed the threshold. This is the
/// run's externally visible output.
pub type AlertSet = BTreeMap<String, Deviation>;
