//! JSON configuration for decomposition and summaries.
//!
//! ```json
//! {
//!   "decomposition": {
//!     "bands": [
//!       {"label": "seasonal", "lower_hours": 720, "upper_hours": "unbounded"},
//!       {"label": "daily", "lower_hours": 4, "upper_hours": 24}
//!     ],
//!     "remove_dc": true,
//!     "strategy": "cumulative_low_pass"
//!   },
//!   "summary": {"confidence_level": 0.95, "leap_day": "fold_into_feb28"}
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationMode;
use crate::calendar::LeapDayPolicy;
use crate::error::ConfigError;
use crate::spectral::DecompositionConfig;
use crate::stats::{default_percentiles, DEFAULT_CONFIDENCE_LEVEL};

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

/// Settings for the year-over-year summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default)]
    pub leap_day: LeapDayPolicy,
    #[serde(default)]
    pub aggregation: AggregationMode,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        SummaryConfig {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            percentiles: default_percentiles(),
            leap_day: LeapDayPolicy::default(),
            aggregation: AggregationMode::default(),
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::ConfidenceLevel(self.confidence_level));
        }
        if let Some(&p) = self.percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
            return Err(ConfigError::Percentile(p));
        }
        Ok(())
    }
}

/// Contents of a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub decomposition: DecompositionConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in config {}", path.display()))
    }

    /// Parse and validate. Band problems surface during deserialization.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text).context("parsing config JSON")?;
        config.summary.validate()?;
        Ok(config)
    }
}
