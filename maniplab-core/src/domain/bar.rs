//! Bar, the fundamental market data unit, and the validated bar series.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// OHLCV bar for one instrument over one fixed interval.
///
/// `timestamp` is the interval's open time. Volume is fractional so that
/// crypto and FX tick volumes fit without rounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is non-finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// Intrabar range, high - low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Open-to-close return of the bar.
    pub fn body_return(&self) -> f64 {
        self.close / self.open - 1.0
    }
}

/// Fixed bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1min")]
    M1,
    #[serde(rename = "5min")]
    M5,
    #[serde(rename = "15min")]
    M15,
    #[serde(rename = "30min")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars per year implied by the interval, given the trading minutes per
    /// day and trading days per year of the market.
    pub fn bars_per_year(self, minutes_per_day: u32, days_per_year: u32) -> f64 {
        let per_day = (minutes_per_day as f64 / self.minutes() as f64).max(1.0);
        per_day * days_per_year as f64
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1min",
            Timeframe::M5 => "5min",
            Timeframe::M15 => "15min",
            Timeframe::M30 => "30min",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" | "1t" => Ok(Timeframe::M1),
            "5m" | "5min" | "5t" => Ok(Timeframe::M5),
            "15m" | "15min" | "15t" => Ok(Timeframe::M15),
            "30m" | "30min" | "30t" => Ok(Timeframe::M30),
            "1h" | "60m" | "60min" => Ok(Timeframe::H1),
            "4h" | "240m" | "240min" => Ok(Timeframe::H4),
            "1d" | "d" | "daily" => Ok(Timeframe::D1),
            other => Err(InputError::InvalidConfig(format!(
                "unknown timeframe '{other}'"
            ))),
        }
    }
}

/// Validated, immutable bar series for one instrument and timeframe.
///
/// Invariants: non-empty, every bar sane, timestamps strictly increasing.
/// Missing intervals are allowed and are never forward-filled. Deserialising
/// goes through [`BarSeries::new`], so the invariants hold for loaded data too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawBarSeries")]
pub struct BarSeries {
    instrument: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

#[derive(Deserialize)]
struct RawBarSeries {
    instrument: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl TryFrom<RawBarSeries> for BarSeries {
    type Error = InputError;

    fn try_from(raw: RawBarSeries) -> Result<Self, Self::Error> {
        BarSeries::new(raw.instrument, raw.timeframe, raw.bars)
    }
}

impl BarSeries {
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, InputError> {
        validate_bars(&bars)?;
        Ok(Self {
            instrument: instrument.into(),
            timeframe,
            bars,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Number of missing intervals: consecutive bars further apart than one
    /// timeframe step.
    pub fn gaps(&self) -> usize {
        let step = self.timeframe.duration();
        self.bars
            .windows(2)
            .filter(|w| w[1].timestamp - w[0].timestamp > step)
            .count()
    }

    /// Human-readable identifier, e.g. `BTCUSD/4h`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.instrument, self.timeframe)
    }
}

/// Validate a bar slice: non-empty, sane bars, strictly increasing timestamps.
pub fn validate_bars(bars: &[Bar]) -> Result<(), InputError> {
    if bars.is_empty() {
        return Err(InputError::EmptySeries);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(InputError::InsaneBar { index });
        }
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(InputError::NonMonotonic {
                    index,
                    previous,
                    current: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}
