//! TOML configuration with layered defaults.
//!
//! Sections carry compiled-in defaults; the watch target itself (where to
//! look and how sensitive to be) has none and must be resolved from the
//! config file or CLI flags before a run can start.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::feed::police::DEFAULT_BASE_URL;
use crate::feed::Location;

/// A setting that blocks execution when missing or out of range.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid setting '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Root configuration for the crimewatch process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub watch: WatchConfig,
    pub upstream: UpstreamConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

impl Settings {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(settings)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `CRIMEWATCH_CONFIG` environment variable.
    /// 2. `/etc/crimewatch/crimewatch.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("CRIMEWATCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(settings) => return settings,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CRIMEWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/crimewatch/crimewatch.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(settings) => return settings,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

/// What to watch and how sensitive to be. Coordinates and threshold have no
/// sensible defaults and must come from the file or CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Latitude of the watched location.
    pub latitude: Option<f64>,
    /// Longitude of the watched location.
    pub longitude: Option<f64>,
    /// How many months of history feed the rolling baseline.
    pub month_count: u32,
    /// Alert when |deviation| strictly exceeds this percentage.
    pub threshold_percent: Option<f64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            month_count: 6,
            threshold_percent: None,
        }
    }
}

impl WatchConfig {
    /// Resolve into a fully-specified, validated [`RunConfig`].
    pub fn resolve(&self) -> Result<RunConfig, ConfigError> {
        let latitude = self.latitude.ok_or(ConfigError::Missing("watch.latitude"))?;
        let longitude = self
            .longitude
            .ok_or(ConfigError::Missing("watch.longitude"))?;
        let threshold_percent = self
            .threshold_percent
            .ok_or(ConfigError::Missing("watch.threshold_percent"))?;

        let config = RunConfig {
            location: Location {
                latitude,
                longitude,
            },
            month_count: self.month_count,
            threshold_percent,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Upstream API endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the police open data API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Local state storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database holding checkpoint and diagnostics.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/crimewatch.db"),
        }
    }
}

/// Recurring invocation configuration for `serve` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between pipeline invocations. The upstream dataset updates
    /// monthly, so most ticks close the gate and cost one request.
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 6 * 60 * 60,
        }
    }
}

/// Fully-specified parameters for one run. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    pub location: Location,
    pub month_count: u32,
    pub threshold_percent: f64,
}

impl RunConfig {
    /// Range checks on an already fully-specified config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.month_count == 0 {
            return Err(ConfigError::Invalid {
                name: "watch.month_count",
                reason: "must be a positive number of months".to_string(),
            });
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(ConfigError::Invalid {
                name: "watch.latitude",
                reason: format!("{} is outside -90..=90", self.location.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(ConfigError::Invalid {
                name: "watch.longitude",
                reason: format!("{} is outside -180..=180", self.location.longitude),
            });
        }
        if !self.threshold_percent.is_finite() {
            return Err(ConfigError::Invalid {
                name: "watch.threshold_percent",
                reason: "must be a finite percentage".to_string(),
            });
        }
        Ok(())
    }
}
