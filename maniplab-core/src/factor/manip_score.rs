//! ManipScore: a bounded per-bar anomaly score in `[0, 1]`.
//!
//! For bar `i` the trailing window is `[i - W + 1, i]`, current bar included.
//! Three components are measured on every bar of the window:
//!
//! - price: `|close / open - 1|`, the body return magnitude
//! - volume: raw volume
//! - range: true range (previous close included), compared against the
//!   window's average true range
//!
//! Each component is z-scored against the window (population std), clipped
//! to `[-z_clip, z_clip]` and rescaled to `[0, 1]`. A component whose window
//! std is zero maps to [`NEUTRAL_SCORE`]. The score is the weighted mean of the
//! three components. Bars inside the warm-up have no score at all, which is
//! distinct from a score of 0.

use serde::{Deserialize, Serialize};

use crate::domain::{validate_bars, Bar};
use crate::error::{InputError, StatError};
use crate::indicators::true_range;

/// Component value when the window shows no dispersion.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Conventional "high manipulation risk" cut-off.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Window std below this is treated as zero.
const STD_FLOOR: f64 = 1e-12;

/// Relative weights of the three components. Only the ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    pub price: f64,
    pub volume: f64,
    pub range: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 1.0,
            volume: 1.0,
            range: 1.0,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), InputError> {
        for (name, w) in [
            ("price", self.price),
            ("volume", self.volume),
            ("range", self.range),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(InputError::InvalidWeights(format!(
                    "{name} weight must be finite and >= 0, got {w}"
                )));
            }
        }
        if self.sum() <= 0.0 {
            return Err(InputError::InvalidWeights(
                "weights must have a positive sum".into(),
            ));
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.price + self.volume + self.range
    }
}

/// Full parameter set of the score engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManipScoreConfig {
    pub window: usize,
    pub weights: ScoreWeights,
    pub z_clip: f64,
    /// Trailing mean over this many raw scores. 1 disables smoothing.
    pub smoothing: usize,
}

impl Default for ManipScoreConfig {
    fn default() -> Self {
        Self {
            window: 20,
            weights: ScoreWeights::default(),
            z_clip: 3.0,
            smoothing: 1,
        }
    }
}

impl ManipScoreConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.window < 2 {
            return Err(InputError::InvalidWindow {
                got: self.window,
                min: 2,
            });
        }
        if self.smoothing < 1 {
            return Err(InputError::InvalidWindow {
                got: self.smoothing,
                min: 1,
            });
        }
        if !self.z_clip.is_finite() || self.z_clip <= 0.0 {
            return Err(InputError::InvalidConfig(format!(
                "z_clip must be finite and > 0, got {}",
                self.z_clip
            )));
        }
        self.weights.validate()
    }

    /// Number of leading bars without a score.
    pub fn warm_up(&self) -> usize {
        self.window - 1 + self.smoothing.saturating_sub(1)
    }
}

/// Per-bar scores aligned with the input series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipScores {
    values: Vec<Option<f64>>,
    warm_up: usize,
}

impl ManipScores {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn warm_up(&self) -> usize {
        self.warm_up
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// The score at `index`, or why there is none.
    pub fn score_at(&self, index: usize) -> Result<f64, StatError> {
        match self.values.get(index) {
            None => Err(StatError::OutOfBounds {
                index,
                len: self.values.len(),
            }),
            Some(None) => Err(StatError::WarmUp {
                index,
                warm_up: self.warm_up,
            }),
            Some(Some(s)) => Ok(*s),
        }
    }

    /// `(index, score)` for every defined score.
    pub fn defined(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|s| (i, s)))
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|s| s.is_some()).count()
    }

    /// Number of defined scores strictly above `threshold`.
    pub fn high_risk_count(&self, threshold: f64) -> usize {
        self.defined().filter(|&(_, s)| s > threshold).count()
    }

    /// Scores as a NaN-leading series, for indicator-style consumers.
    pub fn to_series(&self) -> Vec<f64> {
        self.values.iter().map(|s| s.unwrap_or(f64::NAN)).collect()
    }
}

/// Normalised component values, before weighting. Same alignment as scores
/// without smoothing: undefined for the first `window - 1` bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub price: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
    pub range: Vec<Option<f64>>,
}

/// Score a bar series with the given window and weights, default clip and
/// no smoothing.
pub fn compute_manip_scores(
    bars: &[Bar],
    window: usize,
    weights: &ScoreWeights,
) -> Result<ManipScores, InputError> {
    let config = ManipScoreConfig {
        window,
        weights: *weights,
        ..ManipScoreConfig::default()
    };
    compute_manip_scores_with(bars, &config)
}

/// Score a bar series with a full configuration.
pub fn compute_manip_scores_with(
    bars: &[Bar],
    config: &ManipScoreConfig,
) -> Result<ManipScores, InputError> {
    let components = compute_score_components(bars, config)?;
    let w = &config.weights;
    let total = w.sum();

    let raw: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            let p = components.price[i]?;
            let v = components.volume[i]?;
            let r = components.range[i]?;
            Some(((w.price * p + w.volume * v + w.range * r) / total).clamp(0.0, 1.0))
        })
        .collect();

    let values = if config.smoothing > 1 {
        smooth(&raw, config.smoothing)
    } else {
        raw
    };

    Ok(ManipScores {
        values,
        warm_up: config.warm_up().min(bars.len()),
    })
}

/// Compute the three normalised components for every bar.
pub fn compute_score_components(
    bars: &[Bar],
    config: &ManipScoreConfig,
) -> Result<ScoreComponents, InputError> {
    config.validate()?;
    if !bars.is_empty() {
        validate_bars(bars)?;
    }

    let price: Vec<f64> = bars.iter().map(|b| b.body_return().abs()).collect();
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let range = true_range(bars);

    Ok(ScoreComponents {
        price: normalise(&price, config.window, config.z_clip),
        volume: normalise(&volume, config.window, config.z_clip),
        range: normalise(&range, config.window, config.z_clip),
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Clipped, rescaled z-score of each value against its trailing window.
fn normalise(values: &[f64], window: usize, z_clip: f64) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    if n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
        let std = var.sqrt();
        out[i] = Some(if std < STD_FLOOR || !std.is_finite() {
            NEUTRAL_SCORE
        } else {
            let z = ((values[i] - mean) / std).clamp(-z_clip, z_clip);
            (z + z_clip) / (2.0 * z_clip)
        });
    }
    out
}

/// Trailing mean over `span` values; undefined until `span` values exist.
fn smooth(raw: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    (0..raw.len())
        .map(|i| {
            if i + 1 < span {
                return None;
            }
            let mut sum = 0.0;
            for s in &raw[i + 1 - span..=i] {
                sum += (*s)?;
            }
            Some(sum / span as f64)
        })
        .collect()
}
