//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! Two smoothings are offered: a simple rolling mean of TR over `period`
//! bars, and Wilder smoothing (EMA with alpha = 1/period).
//! Both leave the first `period` values NaN; TR[0] has no previous close
//! and is not used.

use serde::{Deserialize, Serialize};

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::Bar;
use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    /// Rolling arithmetic mean of TR.
    #[default]
    Simple,
    /// Wilder's recursive smoothing.
    Wilder,
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    smoothing: AtrSmoothing,
    name: String,
}

impl Atr {
    /// Panics if `period == 0`; use [`Atr::try_new`] for untrusted input.
    pub fn new(period: usize, smoothing: AtrSmoothing) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            smoothing,
            name: format!("atr_{period}"),
        }
    }

    pub fn try_new(period: usize, smoothing: AtrSmoothing) -> Result<Self, InputError> {
        if period == 0 {
            return Err(InputError::InvalidWindow { got: 0, min: 1 });
        }
        Ok(Self::new(period, smoothing))
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    tr[0] = bars[0].high - bars[0].low;

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr[i] = f64::NAN;
        } else {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
/// Seed: mean of the first `period` consecutive non-NaN values. A NaN after
/// the seed invalidates the rest of the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let mut run = 0usize;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            run = 0;
            continue;
        }
        run += 1;
        if run == period {
            seed_end = Some(i + 1);
            break;
        }
    }

    let seed_end = match seed_end {
        Some(e) => e,
        None => return result,
    };

    let seed: f64 = values[seed_end - period..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;

    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        if !tr.is_empty() {
            tr[0] = f64::NAN;
        }
        match self.smoothing {
            AtrSmoothing::Simple => rolling_mean(&tr, self.period),
            AtrSmoothing::Wilder => wilder_smooth(&tr, self.period),
        }
    }
}
