//! Bar sources: the `(instrument, timeframe, start, end)` ingestion capability.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use super::{BarBatches, DataError};
use crate::domain::{Bar, BarSeries, Symbol, Timeframe};

/// Trait for bar sources (files on disk, in-memory fixtures, etc).
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Load a validated series, clipped to `[start, end]` when given.
    fn load(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<BarSeries, DataError>;
}

/// Files registered per instrument and timeframe, concatenated in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    files: HashMap<(Symbol, Timeframe), Vec<PathBuf>>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        instrument: impl Into<Symbol>,
        timeframe: Timeframe,
        path: impl Into<PathBuf>,
    ) {
        self.files
            .entry((instrument.into(), timeframe))
            .or_default()
            .push(path.into());
    }
}

impl BarSource for FileSource {
    fn name(&self) -> &str {
        "files"
    }

    fn load(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<BarSeries, DataError> {
        let paths = self
            .files
            .get(&(instrument.to_string(), timeframe))
            .ok_or_else(|| DataError::NoData {
                instrument: instrument.to_string(),
                timeframe,
            })?;
        let mut bars = Vec::new();
        for batch in BarBatches::new(paths.clone()) {
            bars.extend(clip(batch?, start, end));
        }
        build(instrument, timeframe, bars)
    }
}

/// Bars held in memory, for tests and synthetic runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    series: HashMap<(Symbol, Timeframe), Vec<Bar>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instrument: impl Into<Symbol>, timeframe: Timeframe, bars: Vec<Bar>) {
        self.series.insert((instrument.into(), timeframe), bars);
    }
}

impl BarSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<BarSeries, DataError> {
        let bars = self
            .series
            .get(&(instrument.to_string(), timeframe))
            .map(|b| clip(b.clone(), start, end))
            .unwrap_or_default();
        build(instrument, timeframe, bars)
    }
}

fn clip(bars: Vec<Bar>, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| start.map_or(true, |s| b.timestamp >= s))
        .filter(|b| end.map_or(true, |e| b.timestamp <= e))
        .collect()
}

fn build(instrument: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Result<BarSeries, DataError> {
    if bars.is_empty() {
        return Err(DataError::NoData {
            instrument: instrument.to_string(),
            timeframe,
        });
    }
    Ok(BarSeries::new(instrument, timeframe, bars)?)
}
