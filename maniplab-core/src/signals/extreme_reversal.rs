//! Extreme reversal: fade an extreme move that coincides with a high score.
//!
//! Trend strength `TS = R_past / sigma`, where `R_past` is the `lookback`-bar
//! close-to-close return and `sigma` the sample std of 1-bar returns over
//! `vol_window` bars. When `|TS|` and the score both clear their thresholds,
//! an up-move yields a short and a down-move a long.
//!
//! Quantile thresholds are computed over the whole series (in-sample).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Signal, SignalGenerator};
use crate::domain::{Bar, Direction};
use crate::error::InputError;
use crate::factor::ManipScores;
use crate::indicators::{pct_change, quantile, rolling_std};

/// A threshold given as an absolute level or as a quantile of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Absolute(f64),
    Quantile(f64),
}

impl Threshold {
    /// Resolve against the finite values of `values`. `None` when a quantile
    /// is requested over a series without finite values.
    pub fn resolve(self, values: &[f64]) -> Option<f64> {
        match self {
            Threshold::Absolute(v) => Some(v),
            Threshold::Quantile(q) => quantile(values, q),
        }
    }

    fn validate(self, name: &str) -> Result<(), InputError> {
        match self {
            Threshold::Absolute(v) if v.is_finite() => Ok(()),
            Threshold::Quantile(q) if (0.0..=1.0).contains(&q) => Ok(()),
            other => Err(InputError::InvalidConfig(format!(
                "{name} threshold out of range: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtremeReversalConfig {
    pub lookback: usize,
    pub vol_window: usize,
    pub trend_threshold: Threshold,
    pub manip_threshold: Threshold,
    /// Optional floor on `|R_past|`, e.g. 0.005 for a 0.5% move.
    pub min_abs_return: Option<f64>,
}

impl Default for ExtremeReversalConfig {
    fn default() -> Self {
        Self {
            lookback: 5,
            vol_window: 20,
            trend_threshold: Threshold::Quantile(0.9),
            manip_threshold: Threshold::Quantile(0.9),
            min_abs_return: None,
        }
    }
}

impl ExtremeReversalConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.lookback < 1 {
            return Err(InputError::InvalidWindow { got: 0, min: 1 });
        }
        if self.vol_window < 2 {
            return Err(InputError::InvalidWindow {
                got: self.vol_window,
                min: 2,
            });
        }
        self.trend_threshold.validate("trend")?;
        self.manip_threshold.validate("manip")
    }
}

/// Per-bar trend features, NaN where undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFeatures {
    pub r_past: Vec<f64>,
    pub sigma: Vec<f64>,
    pub ts: Vec<f64>,
}

impl TrendFeatures {
    pub fn compute(bars: &[Bar], lookback: usize, vol_window: usize) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let r_past = pct_change(&closes, lookback);
        let returns = pct_change(&closes, 1);
        let sigma = rolling_std(&returns, vol_window, 1);
        let ts = r_past
            .iter()
            .zip(&sigma)
            .map(|(&r, &s)| if s > 0.0 { r / s } else { f64::NAN })
            .collect();
        Self { r_past, sigma, ts }
    }
}

#[derive(Debug, Clone)]
pub struct ExtremeReversal {
    config: ExtremeReversalConfig,
}

impl ExtremeReversal {
    pub fn new(config: ExtremeReversalConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtremeReversalConfig {
        &self.config
    }
}

impl SignalGenerator for ExtremeReversal {
    fn name(&self) -> &str {
        "extreme_reversal"
    }

    fn warmup_bars(&self) -> usize {
        self.config.lookback.max(self.config.vol_window)
    }

    fn generate(&self, bars: &[Bar], scores: &ManipScores) -> Vec<Signal> {
        let n = bars.len().min(scores.len());
        if n < 2 {
            return Vec::new();
        }
        let features =
            TrendFeatures::compute(&bars[..n], self.config.lookback, self.config.vol_window);
        let abs_ts: Vec<f64> = features.ts.iter().map(|t| t.abs()).collect();
        let score_series = scores.to_series();

        let (trend_thr, manip_thr) = match (
            self.config.trend_threshold.resolve(&abs_ts),
            self.config.manip_threshold.resolve(&score_series[..n]),
        ) {
            (Some(t), Some(m)) => (t, m),
            _ => return Vec::new(),
        };
        debug!(trend_thr, manip_thr, "extreme reversal thresholds");

        (0..n - 1)
            .filter_map(|i| {
                let ts = features.ts[i];
                let score = scores.get(i)?;
                if !ts.is_finite() || ts.abs() < trend_thr || score < manip_thr {
                    return None;
                }
                if let Some(floor) = self.config.min_abs_return {
                    if features.r_past[i].abs() < floor {
                        return None;
                    }
                }
                let direction = if features.r_past[i] > 0.0 {
                    Direction::Short
                } else if features.r_past[i] < 0.0 {
                    Direction::Long
                } else {
                    return None;
                };
                Some(Signal {
                    signal_index: i,
                    entry_index: i + 1,
                    direction,
                    score,
                    strength: ts.abs(),
                })
            })
            .collect()
    }
}
