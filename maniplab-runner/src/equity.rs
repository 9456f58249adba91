//! Bar-level equity curve built from closed trades.
//!
//! Single-unit sizing: each trade compounds realised equity by
//! `1 + net_pnl` at its exit bar. Equity is flat between exits, so the curve
//! shows realised equity only.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use maniplab_core::domain::{Bar, Trade};

use crate::metrics::EndOfDataPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquityCurve {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl EquityCurve {
    /// One point per bar. Trades whose exit lies outside `bars` are ignored.
    pub fn from_trades(bars: &[Bar], trades: &[Trade], initial: f64) -> Self {
        Self::compound(bars, trades.iter(), initial)
    }

    /// Curve over the trades `policy` admits. Under `Exclude`, END_OF_DATA
    /// trades leave equity untouched.
    pub fn for_policy(
        bars: &[Bar],
        trades: &[Trade],
        initial: f64,
        policy: EndOfDataPolicy,
    ) -> Self {
        Self::compound(bars, trades.iter().filter(|t| policy.admits(t)), initial)
    }

    fn compound<'a>(bars: &[Bar], trades: impl Iterator<Item = &'a Trade>, initial: f64) -> Self {
        let mut growth = vec![1.0; bars.len()];
        for trade in trades {
            if let Some(g) = growth.get_mut(trade.exit_index) {
                *g *= 1.0 + trade.net_pnl();
            }
        }
        let mut equity = initial;
        let values = growth
            .into_iter()
            .map(|g| {
                equity *= g;
                equity
            })
            .collect();
        Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            values,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = EquityPoint> + '_ {
        self.timestamps
            .iter()
            .zip(&self.values)
            .map(|(&timestamp, &equity)| EquityPoint { timestamp, equity })
    }
}
