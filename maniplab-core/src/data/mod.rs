//! Data ingestion: tick aggregation, bar files, batch iteration and sources.
//!
//! Loaders return raw `Vec<Bar>`; validation happens when a `BarSeries` is
//! built. Gaps are never forward-filled.

pub mod batches;
pub mod csv_bars;
pub mod parquet;
pub mod provider;
pub mod synthetic;
pub mod ticks;

pub use batches::{BarBatches, BarFormat};
pub use csv_bars::{read_bars_csv, read_bars_csv_path, read_ticks_csv, write_bars_csv};
pub use parquet::{read_bars_parquet, write_bars_parquet};
pub use provider::{BarSource, FileSource, MemorySource};
pub use synthetic::{synthetic_series, SyntheticConfig};
pub use ticks::aggregate_ticks;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::domain::{Bar, Timeframe};
use crate::error::InputError;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("tick aggregation: {0}")]
    Ticks(String),

    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("no data for {instrument}/{timeframe}")]
    NoData {
        instrument: String,
        timeframe: Timeframe,
    },

    #[error(transparent)]
    Input(#[from] InputError),
}

impl DataError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read a bar file, dispatching on its extension.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    match BarFormat::from_path(path)? {
        BarFormat::Csv => read_bars_csv_path(path),
        BarFormat::Parquet => read_bars_parquet(path),
    }
}

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y%m%d %H%M%S",
];

/// Parse a timestamp as written by common bar exporters: ISO-like date-times,
/// RFC 3339 (converted to UTC), bare dates (midnight), or epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DataError> {
    let s = raw.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    if let Ok(ms) = s.parse::<i64>() {
        if let Some(ts) = from_epoch_millis(ms) {
            return Ok(ts);
        }
    }
    Err(DataError::Timestamp(raw.to_string()))
}

pub(crate) fn epoch_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

pub(crate) fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}
