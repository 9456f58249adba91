//! Declarative run configuration, loaded from TOML.
//!
//! ```toml
//! [score]
//! window = 20
//! weights = { price = 1.0, volume = 1.0, range = 1.0 }
//!
//! [exit]
//! stop_loss_atr = 0.5
//! take_profit_atr = 0.8
//! max_holding_bars = 5
//! path_policy = "worst_case"
//!
//! [[datasets]]
//! instrument = "XAUUSD"
//! timeframe = "5min"
//! path = "data/xauusd_5min"
//! period = "2024"
//! ```
//!
//! Every section is optional and falls back to its defaults. Unknown keys are
//! rejected so typos surface at load time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use maniplab_core::domain::Timeframe;
use maniplab_core::error::InputError;
use maniplab_core::exit::ExitRuleConfig;
use maniplab_core::factor::ManipScoreConfig;
use maniplab_core::indicators::AtrSmoothing;
use maniplab_core::signals::ExtremeReversalConfig;

use crate::metrics::EndOfDataPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [{section}] section: {source}")]
    Invalid {
        section: &'static str,
        #[source]
        source: InputError,
    },

    #[error("invalid config: {0}")]
    Other(String),
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub score: ManipScoreConfig,
    pub exit: ExitRuleConfig,
    pub atr: AtrConfig,
    pub signal: ExtremeReversalConfig,
    pub annualization: AnnualizationConfig,
    pub aggregation: AggregationConfig,
    pub post_manip: PostManipConfig,
    pub datasets: Vec<DatasetConfig>,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn section(name: &'static str) -> impl Fn(InputError) -> ConfigError {
            move |source| ConfigError::Invalid {
                section: name,
                source,
            }
        }
        self.score.validate().map_err(section("score"))?;
        self.exit.validate().map_err(section("exit"))?;
        self.signal.validate().map_err(section("signal"))?;
        if self.atr.period == 0 {
            return Err(ConfigError::Invalid {
                section: "atr",
                source: InputError::InvalidWindow { got: 0, min: 1 },
            });
        }
        self.annualization.validate()?;
        self.aggregation.validate()?;
        self.post_manip.validate()?;
        for dataset in &self.datasets {
            if let (Some(start), Some(end)) = (dataset.start, dataset.end) {
                if start > end {
                    return Err(ConfigError::Other(format!(
                        "dataset {}: start {start} is after end {end}",
                        dataset.label()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AtrConfig {
    pub period: usize,
    pub smoothing: AtrSmoothing,
}

impl Default for AtrConfig {
    fn default() -> Self {
        Self {
            period: 10,
            smoothing: AtrSmoothing::Simple,
        }
    }
}

/// Calendar used to turn a bar interval into bars per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnualizationConfig {
    pub days_per_year: u32,
    pub minutes_per_day: u32,
}

impl Default for AnnualizationConfig {
    /// 252 trading days of 24 hours: 72 576 five-minute bars a year.
    fn default() -> Self {
        Self {
            days_per_year: 252,
            minutes_per_day: 1_440,
        }
    }
}

impl AnnualizationConfig {
    pub fn bars_per_year(&self, timeframe: Timeframe) -> f64 {
        timeframe.bars_per_year(self.minutes_per_day, self.days_per_year)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.days_per_year == 0 || self.minutes_per_day == 0 || self.minutes_per_day > 1_440 {
            return Err(ConfigError::Other(format!(
                "annualization needs days_per_year > 0 and 0 < minutes_per_day <= 1440, got {} / {}",
                self.days_per_year, self.minutes_per_day
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    pub end_of_data: EndOfDataPolicy,
    pub initial_equity: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            end_of_data: EndOfDataPolicy::Include,
            initial_equity: 1.0,
        }
    }
}

impl AggregationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(ConfigError::Other(format!(
                "initial_equity must be finite and > 0, got {}",
                self.initial_equity
            )));
        }
        Ok(())
    }
}

/// Forward-return study after scored bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostManipConfig {
    pub horizons: Vec<usize>,
    /// Bucket edges over [0, 1]; buckets are `[e_k, e_k+1)`, the last one closed.
    pub edges: Vec<f64>,
}

impl Default for PostManipConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 3, 5, 10, 20],
            edges: vec![0.0, 0.3, 0.5, 0.7, 1.0],
        }
    }
}

impl PostManipConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.horizons.is_empty() || self.horizons.contains(&0) {
            return Err(ConfigError::Other(
                "post_manip.horizons must be non-empty and > 0".into(),
            ));
        }
        let ordered = self.edges.windows(2).all(|w| w[0] < w[1]);
        if self.edges.len() < 2 || !ordered || self.edges.iter().any(|e| !e.is_finite()) {
            return Err(ConfigError::Other(
                "post_manip.edges needs at least two strictly increasing finite values".into(),
            ));
        }
        Ok(())
    }
}

/// One instrument/timeframe partition to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub instrument: String,
    pub timeframe: Timeframe,
    /// A bar file, or a directory of bar files read in name order.
    pub path: PathBuf,
    /// Free-form label for reports, e.g. a year.
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
}

impl DatasetConfig {
    /// `INSTRUMENT/timeframe[/period]`.
    pub fn label(&self) -> String {
        match &self.period {
            Some(p) => format!("{}/{}/{}", self.instrument, self.timeframe, p),
            None => format!("{}/{}", self.instrument, self.timeframe),
        }
    }
}
