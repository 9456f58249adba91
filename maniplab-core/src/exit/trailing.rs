//! Trailing stop state for one open trade.
//!
//! The stop arms once the best favourable price is at least
//! `trigger` away from entry. Once armed it sits `lock` behind the best price
//! and may only tighten (up for longs, down for shorts). A level set from
//! bar k's extreme is only checked against bar k+1 onwards.

use crate::domain::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    direction: Direction,
    entry_price: f64,
    /// Price distance that arms the stop.
    trigger: f64,
    /// Price distance kept behind the best price.
    lock: f64,
    best: f64,
    stop: Option<f64>,
}

impl TrailingStop {
    /// `trigger_atr` and `lock_atr` are ATR multiples. Callers decide whether
    /// trailing is enabled; see `ExitRuleConfig::trailing_enabled`.
    pub fn new(
        direction: Direction,
        entry_price: f64,
        atr: f64,
        trigger_atr: f64,
        lock_atr: f64,
    ) -> Self {
        Self {
            direction,
            entry_price,
            trigger: trigger_atr * atr,
            lock: lock_atr * atr,
            best: entry_price,
            stop: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.stop.is_some()
    }

    /// The stop level in force for the current bar.
    pub fn stop(&self) -> Option<f64> {
        self.stop
    }

    /// Feed the favourable extreme of a bar that did not close the trade.
    pub fn observe(&mut self, favourable: f64) {
        let d = self.direction.sign();
        if d * (favourable - self.best) > 0.0 {
            self.best = favourable;
        }
        if self.stop.is_none() && d * (self.best - self.entry_price) < self.trigger {
            return;
        }
        let candidate = self.best - d * self.lock;
        self.stop = Some(match (self.direction, self.stop) {
            (Direction::Long, Some(cur)) => candidate.max(cur),
            (Direction::Short, Some(cur)) => candidate.min(cur),
            (_, None) => candidate,
        });
    }
}
