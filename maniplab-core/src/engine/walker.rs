//! Trade walk: turn a signal series into non-overlapping closed trades.
//!
//! Signals are taken in bar order. A signal is skipped while a previous trade
//! is still open (its entry bar is at or before the previous exit bar), or
//! when the ATR at the signal bar is undefined or non-positive. The ATR is
//! read at the signal bar, which is known when the entry is decided.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, Trade};
use crate::error::InputError;
use crate::exit::{simulate_trade, Entry, EntryPrice, ExitRuleConfig};
use crate::signals::Signal;

/// Trades produced by a walk plus counts of what was passed over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkResult {
    pub trades: Vec<Trade>,
    pub skipped_undefined_atr: usize,
    pub skipped_overlap: usize,
}

impl WalkResult {
    pub fn signals_seen(&self) -> usize {
        self.trades.len() + self.skipped_undefined_atr + self.skipped_overlap
    }
}

pub fn run_trade_walk(
    bars: &[Bar],
    signals: &[Signal],
    atr: &[f64],
    config: &ExitRuleConfig,
) -> Result<WalkResult, InputError> {
    if atr.len() != bars.len() {
        return Err(InputError::LengthMismatch {
            expected: bars.len(),
            got: atr.len(),
        });
    }
    config.validate()?;

    let mut result = WalkResult::default();
    let mut busy_until: Option<usize> = None;

    for signal in signals {
        if busy_until.is_some_and(|exit| signal.entry_index <= exit) {
            result.skipped_overlap += 1;
            continue;
        }
        let signal_atr = atr.get(signal.signal_index).copied().unwrap_or(f64::NAN);
        if !signal_atr.is_finite() || signal_atr <= 0.0 {
            result.skipped_undefined_atr += 1;
            continue;
        }

        let entry = Entry::at_bar(
            bars,
            signal.entry_index,
            signal.direction,
            signal_atr,
            EntryPrice::Open,
        )?;
        let trade = simulate_trade(bars, &entry, config)?;
        busy_until = Some(trade.exit_index);
        result.trades.push(trade);
    }

    if result.skipped_undefined_atr > 0 {
        warn!(
            skipped = result.skipped_undefined_atr,
            "signals skipped: ATR undefined at signal bar"
        );
    }
    debug!(
        trades = result.trades.len(),
        overlap = result.skipped_overlap,
        "trade walk complete"
    );
    Ok(result)
}
