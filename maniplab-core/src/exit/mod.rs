//! Exit-rule simulation: one entry in, one closed trade out.
//!
//! Distances are multiples of the ATR measured at entry. The simulator walks
//! forward from the entry bar (offset 0, inclusive) and closes the trade on the
//! first bar where a rule fires:
//!
//! 1. stop leg: the stop-loss, or the trailing stop once armed if tighter
//! 2. take-profit
//! 3. max holding bars (fills at that bar's close)
//! 4. end of data (fills at the last close)
//!
//! When the stop leg and take-profit are both crossed within one bar, the
//! [`PathPolicy`] decides which happened first.

pub mod simulator;
pub mod trailing;

pub use simulator::{simulate_trade, simulate_trade_path, PathStep, TradePath};
pub use trailing::TrailingStop;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};
use crate::error::InputError;

/// Multiples at or above this value disable a leg, like infinity.
pub const DISABLED_SENTINEL: f64 = 999.0;

/// Intrabar path policy for resolving bars that cross both the stop and the
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Adversarial: the stop is assumed hit first (default).
    #[default]
    WorstCase,
    /// Optimistic: the target is assumed hit first.
    BestCase,
    /// Open closer to the high means the high was visited first.
    OhlcPath,
}

impl PathPolicy {
    /// Whether the stop leg wins a same-bar tie for this bar and direction.
    pub fn stop_first(self, bar: &Bar, direction: Direction) -> bool {
        match self {
            PathPolicy::WorstCase => true,
            PathPolicy::BestCase => false,
            PathPolicy::OhlcPath => {
                let high_first = (bar.high - bar.open) <= (bar.open - bar.low);
                match direction {
                    // a long's stop sits below
                    Direction::Long => !high_first,
                    Direction::Short => high_first,
                }
            }
        }
    }
}

/// Exit rule parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExitRuleConfig {
    pub stop_loss_atr: f64,
    /// `inf` or >= 999 disables the target.
    pub take_profit_atr: f64,
    /// Favourable excursion that arms the trailing stop. `inf` disables.
    pub trailing_trigger_atr: f64,
    /// Distance of the trailing stop behind the best price. 0 disables.
    pub trailing_lock_atr: f64,
    pub max_holding_bars: usize,
    pub path_policy: PathPolicy,
    /// Round-trip cost as a return fraction, subtracted by `Trade::net_pnl`.
    pub cost_per_trade: f64,
}

impl Default for ExitRuleConfig {
    fn default() -> Self {
        Self {
            stop_loss_atr: 2.0,
            take_profit_atr: 3.0,
            trailing_trigger_atr: f64::INFINITY,
            trailing_lock_atr: 0.0,
            max_holding_bars: 20,
            path_policy: PathPolicy::WorstCase,
            cost_per_trade: 0.0,
        }
    }
}

impl ExitRuleConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        let positive = |name: &str, v: f64| {
            if v.is_nan() || v <= 0.0 {
                Err(InputError::InvalidConfig(format!(
                    "{name} must be > 0, got {v}"
                )))
            } else {
                Ok(())
            }
        };
        positive("stop_loss_atr", self.stop_loss_atr)?;
        positive("take_profit_atr", self.take_profit_atr)?;
        positive("trailing_trigger_atr", self.trailing_trigger_atr)?;
        if !self.trailing_lock_atr.is_finite() || self.trailing_lock_atr < 0.0 {
            return Err(InputError::InvalidConfig(format!(
                "trailing_lock_atr must be finite and >= 0, got {}",
                self.trailing_lock_atr
            )));
        }
        if !self.cost_per_trade.is_finite() || self.cost_per_trade < 0.0 {
            return Err(InputError::InvalidConfig(format!(
                "cost_per_trade must be finite and >= 0, got {}",
                self.cost_per_trade
            )));
        }
        Ok(())
    }

    pub fn stop_loss_enabled(&self) -> bool {
        is_enabled(self.stop_loss_atr)
    }

    pub fn take_profit_enabled(&self) -> bool {
        is_enabled(self.take_profit_atr)
    }

    pub fn trailing_enabled(&self) -> bool {
        self.trailing_lock_atr > 0.0 && is_enabled(self.trailing_trigger_atr)
    }
}

fn is_enabled(multiple: f64) -> bool {
    multiple.is_finite() && multiple < DISABLED_SENTINEL
}

/// Which price of the entry bar a trade is opened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPrice {
    #[default]
    Open,
    Close,
}

/// A trade entry: bar index, direction, fill price and the ATR at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub index: usize,
    pub direction: Direction,
    pub price: f64,
    pub atr: f64,
}

impl Entry {
    /// Entry priced off the given bar.
    pub fn at_bar(
        bars: &[Bar],
        index: usize,
        direction: Direction,
        atr: f64,
        price: EntryPrice,
    ) -> Result<Self, InputError> {
        let bar = bars.get(index).ok_or(InputError::EntryOutOfBounds {
            index,
            len: bars.len(),
        })?;
        let price = match price {
            EntryPrice::Open => bar.open,
            EntryPrice::Close => bar.close,
        };
        let entry = Self {
            index,
            direction,
            price,
            atr,
        };
        entry.validate(bars.len())?;
        Ok(entry)
    }

    pub fn validate(&self, len: usize) -> Result<(), InputError> {
        if self.index >= len {
            return Err(InputError::EntryOutOfBounds {
                index: self.index,
                len,
            });
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(InputError::InvalidEntryPrice(self.price));
        }
        if !self.atr.is_finite() || self.atr <= 0.0 {
            return Err(InputError::InvalidAtr(self.atr));
        }
        Ok(())
    }

    /// Stop-loss price, or `None` when the leg is disabled.
    pub fn stop_loss_price(&self, config: &ExitRuleConfig) -> Option<f64> {
        config
            .stop_loss_enabled()
            .then(|| self.price - self.direction.sign() * config.stop_loss_atr * self.atr)
    }

    /// Take-profit price, or `None` when the leg is disabled.
    pub fn take_profit_price(&self, config: &ExitRuleConfig) -> Option<f64> {
        config
            .take_profit_enabled()
            .then(|| self.price + self.direction.sign() * config.take_profit_atr * self.atr)
    }
}
