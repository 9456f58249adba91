//! Tick to bar aggregation.
//!
//! Buckets are fixed intervals aligned to the Unix epoch, labelled by their
//! open time. Intervals without ticks produce no bar.

use tracing::debug;

use super::{epoch_millis, from_epoch_millis, DataError};
use crate::domain::{Bar, Tick, Timeframe};

pub fn aggregate_ticks(ticks: &[Tick], timeframe: Timeframe) -> Result<Vec<Bar>, DataError> {
    let step = timeframe.minutes() * 60_000;
    let mut bars: Vec<Bar> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for (i, tick) in ticks.iter().enumerate() {
        if !tick.is_valid() {
            return Err(DataError::Ticks(format!("invalid tick at row {i}")));
        }
        if i > 0 && tick.timestamp < ticks[i - 1].timestamp {
            return Err(DataError::Ticks(format!(
                "ticks out of order at row {i}: {} < {}",
                tick.timestamp,
                ticks[i - 1].timestamp
            )));
        }

        let bucket = epoch_millis(tick.timestamp).div_euclid(step) * step;
        match bars.last_mut() {
            Some(bar) if current_bucket == Some(bucket) => {
                bar.high = bar.high.max(tick.price);
                bar.low = bar.low.min(tick.price);
                bar.close = tick.price;
                bar.volume += tick.volume;
            }
            _ => {
                let timestamp = from_epoch_millis(bucket).ok_or_else(|| {
                    DataError::Ticks(format!("bucket {bucket} out of range"))
                })?;
                bars.push(Bar {
                    timestamp,
                    open: tick.price,
                    high: tick.price,
                    low: tick.price,
                    close: tick.price,
                    volume: tick.volume,
                });
                current_bucket = Some(bucket);
            }
        }
    }

    debug!(ticks = ticks.len(), bars = bars.len(), %timeframe, "aggregated ticks");
    Ok(bars)
}
