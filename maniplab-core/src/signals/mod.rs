//! Entry signal generation.
//!
//! Signals see bar history and precomputed scores only. A signal formed on
//! bar t is executed at the open of bar t+1, so no signal can trade on the
//! information of its own bar's close.

pub mod extreme_reversal;

pub use extreme_reversal::{ExtremeReversal, ExtremeReversalConfig, Threshold, TrendFeatures};

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};
use crate::factor::ManipScores;

/// An immutable entry signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Bar on which the signal formed.
    pub signal_index: usize,
    /// Bar whose open the trade is entered at.
    pub entry_index: usize,
    pub direction: Direction,
    /// Score of the signal bar.
    pub score: f64,
    /// Rule-specific strength, e.g. |TS| for the reversal rule.
    pub strength: f64,
}

/// Trait for signal generators.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "extreme_reversal").
    fn name(&self) -> &str;

    /// Number of bars needed before this generator can fire.
    fn warmup_bars(&self) -> usize;

    /// All signals over the series, in bar order. Signals on the last bar are
    /// dropped since there is no next bar to enter on.
    fn generate(&self, bars: &[Bar], scores: &ManipScores) -> Vec<Signal>;
}
