//! CSV bar and tick files.
//!
//! Bar files carry a header `timestamp,open,high,low,close,volume`; tick files
//! `timestamp,price,volume`. Timestamps accept the shapes understood by
//! [`parse_timestamp`](super::parse_timestamp) and are written as
//! `YYYY-MM-DD HH:MM:SS`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{parse_timestamp, DataError};
use crate::domain::{Bar, Tick};

const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TickRow {
    timestamp: String,
    price: f64,
    #[serde(default)]
    volume: f64,
}

pub fn read_bars_csv<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<BarRow>().enumerate() {
        let row = row.map_err(|e| DataError::Csv(format!("row {i}: {e}")))?;
        bars.push(Bar {
            timestamp: parse_timestamp(&row.timestamp)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

pub fn read_bars_csv_path(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    read_bars_csv(file)
}

pub fn read_ticks_csv<R: Read>(reader: R) -> Result<Vec<Tick>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks = Vec::new();
    for (i, row) in rdr.deserialize::<TickRow>().enumerate() {
        let row = row.map_err(|e| DataError::Csv(format!("row {i}: {e}")))?;
        ticks.push(Tick {
            timestamp: parse_timestamp(&row.timestamp)?,
            price: row.price,
            volume: row.volume,
        });
    }
    Ok(ticks)
}

pub fn write_bars_csv<W: Write>(writer: W, bars: &[Bar]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(BarRow {
            timestamp: bar.timestamp.format(WRITE_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })
        .map_err(|e| DataError::Csv(e.to_string()))?;
    }
    wtr.flush().map_err(|e| DataError::Csv(e.to_string()))?;
    Ok(())
}
