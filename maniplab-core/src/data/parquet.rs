//! Parquet bar files via polars.
//!
//! Written files hold `timestamp` as `Datetime(ms)` and the five OHLCV
//! columns as `Float64`. On read, `timestamp` may also be a plain `Int64` of
//! epoch milliseconds, and numeric columns of any numeric type are cast.

use std::fs;
use std::path::Path;

use polars::prelude::*;

use super::{epoch_millis, from_epoch_millis, DataError};
use crate::domain::Bar;

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

pub fn write_bars_parquet(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    let mut df = bars_to_dataframe(bars)?;
    let file = fs::File::create(path).map_err(|e| DataError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

pub fn read_bars_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;
    dataframe_to_bars(&df)
}

// ── DataFrame conversion ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| epoch_millis(b.timestamp)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::ParquetError(format!("timestamp cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|_| DataError::Schema(format!("missing column '{name}'")))
    };

    let ts_col = column("timestamp")?;
    let ts_ms = match ts_col.dtype() {
        DataType::Datetime(_, _) => ts_col
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .and_then(|c| c.cast(&DataType::Int64)),
        DataType::Int64 | DataType::Int32 | DataType::UInt64 => ts_col.cast(&DataType::Int64),
        other => {
            return Err(DataError::Schema(format!(
                "timestamp column has unsupported type {other}"
            )))
        }
    }
    .map_err(|e| DataError::ParquetError(format!("timestamp cast: {e}")))?;
    let ts_ca = ts_ms
        .i64()
        .map_err(|e| DataError::ParquetError(format!("timestamp column type: {e}")))?;

    let mut numeric = Vec::with_capacity(PRICE_COLUMNS.len());
    for name in PRICE_COLUMNS {
        let cast = column(name)?
            .cast(&DataType::Float64)
            .map_err(|e| DataError::Schema(format!("column '{name}' is not numeric: {e}")))?;
        numeric.push(cast);
    }
    let mut arrays = Vec::with_capacity(numeric.len());
    for (name, col) in PRICE_COLUMNS.iter().zip(&numeric) {
        arrays.push(
            col.f64()
                .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?,
        );
    }

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let ms = ts_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null timestamp at row {i}")))?;
        let timestamp = from_epoch_millis(ms)
            .ok_or_else(|| DataError::Timestamp(format!("{ms} ms at row {i}")))?;
        let value = |k: usize| arrays[k].get(i).unwrap_or(f64::NAN);
        bars.push(Bar {
            timestamp,
            open: value(0),
            high: value(1),
            low: value(2),
            close: value(3),
            volume: value(4),
        });
    }
    Ok(bars)
}
