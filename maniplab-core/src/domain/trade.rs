//! Trade: a closed round trip produced by the exit-rule simulator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// Why a trade closed. Exactly one per trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "TRAIL")]
    Trailing,
    #[serde(rename = "TIME")]
    Time,
    /// The series ran out before any rule fired. Not a rule-driven exit.
    #[serde(rename = "END_OF_DATA")]
    EndOfData,
}

impl ExitReason {
    pub fn code(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit => "TP",
            ExitReason::Trailing => "TRAIL",
            ExitReason::Time => "TIME",
            ExitReason::EndOfData => "END_OF_DATA",
        }
    }

    pub fn is_rule_driven(self) -> bool {
        self != ExitReason::EndOfData
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A closed trade. Immutable once produced.
///
/// Sign conventions: `pnl` is the direction-adjusted return
/// `d * (exit / entry - 1)`. `mfe` is the best favourable excursion seen,
/// negative when the whole path stays against the entry. `mae` is the
/// magnitude of the worst adverse excursion (>= 0, a 2% drawdown against the
/// position is reported as `0.02`). The `_atr` variants express the same
/// quantities in multiples of the entry ATR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_atr: f64,
    pub direction: Direction,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub holding_bars: usize,

    // ── Outcome ──
    pub pnl: f64,
    pub pnl_atr: f64,
    pub cost: f64,

    // ── Excursion ──
    pub mfe: f64,
    pub mae: f64,
    pub mfe_atr: f64,
    pub mae_atr: f64,
    /// Bar offset (from entry) at which `mfe` was first reached.
    pub t_mfe: usize,
}

impl Trade {
    /// PnL after the round-trip cost.
    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.cost
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_end_of_data(&self) -> bool {
        !self.exit_reason.is_rule_driven()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_trade() -> Trade {
        let t0 = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Trade {
            entry_index: 4,
            entry_time: t0,
            entry_price: 100.0,
            entry_atr: 2.0,
            direction: Direction::Short,
            exit_index: 7,
            exit_time: t0 + chrono::Duration::minutes(15),
            exit_price: 98.0,
            exit_reason: ExitReason::TakeProfit,
            holding_bars: 3,
            pnl: 0.02,
            pnl_atr: 1.0,
            cost: 0.0005,
            mfe: 0.025,
            mae: 0.01,
            mfe_atr: 1.25,
            mae_atr: 0.5,
            t_mfe: 2,
        }
    }

    #[test]
    fn net_pnl_subtracts_cost() {
        let trade = sample_trade();
        assert!((trade.net_pnl() - 0.0195).abs() < 1e-12);
        assert!(trade.is_winner());
    }

    #[test]
    fn direction_sign() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
    }

    #[test]
    fn exit_reason_serializes_as_code() {
        let json = serde_json::to_string(&ExitReason::EndOfData).unwrap();
        assert_eq!(json, "\"END_OF_DATA\"");
        let back: ExitReason = serde_json::from_str("\"TRAIL\"").unwrap();
        assert_eq!(back, ExitReason::Trailing);
        assert!(!ExitReason::EndOfData.is_rule_driven());
        assert!(ExitReason::Time.is_rule_driven());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
