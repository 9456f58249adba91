//! Bar-by-bar exit simulation.
//!
//! Fill assumption: a leg crossed inside a bar's high-low range fills at its
//! threshold price, even when the bar opened beyond it. Gap risk is not
//! modelled. TIME exits fill at the bar's close; END_OF_DATA at the last close,
//! or at the entry price when the entry bar is the last bar.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Entry, ExitRuleConfig, TrailingStop};
use crate::domain::{Bar, Direction, ExitReason, Trade};
use crate::error::InputError;

/// One bar of an open trade's excursion path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    /// Bars since entry; 0 is the entry bar.
    pub offset: usize,
    pub index: usize,
    /// This bar's favourable excursion as a return (may be negative).
    pub favourable: f64,
    /// This bar's adverse excursion as a return magnitude (may be negative).
    pub adverse: f64,
    /// Running MFE up to and including this bar.
    pub mfe: f64,
    /// Running MAE magnitude up to and including this bar.
    pub mae: f64,
    /// Trailing stop in force during this bar, if armed.
    pub trailing_stop: Option<f64>,
}

/// A closed trade with the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePath {
    pub trade: Trade,
    pub steps: Vec<PathStep>,
}

/// Simulate a single entry to its exit.
pub fn simulate_trade(
    bars: &[Bar],
    entry: &Entry,
    config: &ExitRuleConfig,
) -> Result<Trade, InputError> {
    walk(bars, entry, config, |_| {})
}

/// Simulate a single entry and keep every step of the path.
pub fn simulate_trade_path(
    bars: &[Bar],
    entry: &Entry,
    config: &ExitRuleConfig,
) -> Result<TradePath, InputError> {
    let mut steps = Vec::new();
    let trade = walk(bars, entry, config, |step| steps.push(*step))?;
    Ok(TradePath { trade, steps })
}

// ─── Walk ────────────────────────────────────────────────────────────

/// Running excursions, in price units. `mfe` is the true maximum and may be
/// negative when price never trades through the entry; `mae` is floored at 0.
#[derive(Debug)]
struct Excursion {
    mfe: f64,
    mae: f64,
    t_mfe: usize,
}

impl Excursion {
    fn new() -> Self {
        Self {
            mfe: f64::NEG_INFINITY,
            mae: 0.0,
            t_mfe: 0,
        }
    }
}

fn walk(
    bars: &[Bar],
    entry: &Entry,
    config: &ExitRuleConfig,
    mut record: impl FnMut(&PathStep),
) -> Result<Trade, InputError> {
    config.validate()?;
    entry.validate(bars.len())?;

    let direction = entry.direction;
    let d = direction.sign();
    let stop_loss = entry.stop_loss_price(config);
    let take_profit = entry.take_profit_price(config);
    let mut trailing = config.trailing_enabled().then(|| {
        TrailingStop::new(
            direction,
            entry.price,
            entry.atr,
            config.trailing_trigger_atr,
            config.trailing_lock_atr,
        )
    });
    let mut exc = Excursion::new();

    for index in entry.index..bars.len() {
        let bar = &bars[index];
        check_bar(bars, index, entry.index)?;
        let offset = index - entry.index;

        let (favourable, adverse) = match direction {
            Direction::Long => (bar.high, bar.low),
            Direction::Short => (bar.low, bar.high),
        };
        let fav_px = d * (favourable - entry.price);
        let adv_px = -d * (adverse - entry.price);
        if fav_px > exc.mfe {
            exc.mfe = fav_px;
            exc.t_mfe = offset;
        }
        exc.mae = exc.mae.max(adv_px);

        let trail = trailing.as_ref().and_then(TrailingStop::stop);
        record(&PathStep {
            offset,
            index,
            favourable: fav_px / entry.price,
            adverse: adv_px / entry.price,
            mfe: exc.mfe / entry.price,
            mae: exc.mae / entry.price,
            trailing_stop: trail,
        });

        let stop_hit = stop_leg(stop_loss, trail, direction)
            .filter(|&(price, _)| crosses_adverse(bar, direction, price));
        let target_hit = take_profit
            .filter(|&price| crosses_favourable(bar, direction, price))
            .map(|price| (price, ExitReason::TakeProfit));

        let exit = match (stop_hit, target_hit) {
            (Some(stop), Some(target)) => {
                if config.path_policy.stop_first(bar, direction) {
                    Some(stop)
                } else {
                    Some(target)
                }
            }
            (stop, target) => stop.or(target),
        }
        .or_else(|| (offset >= config.max_holding_bars).then_some((bar.close, ExitReason::Time)));

        if let Some((price, reason)) = exit {
            return Ok(close(bars, entry, config, index, price, reason, &exc));
        }

        if let Some(ts) = trailing.as_mut() {
            ts.observe(favourable);
        }
    }

    let last = bars.len() - 1;
    let price = if last == entry.index {
        entry.price
    } else {
        bars[last].close
    };
    Ok(close(
        bars,
        entry,
        config,
        last,
        price,
        ExitReason::EndOfData,
        &exc,
    ))
}

fn check_bar(bars: &[Bar], index: usize, first: usize) -> Result<(), InputError> {
    let bar = &bars[index];
    if !bar.is_sane() {
        return Err(InputError::InsaneBar { index });
    }
    if index > first && bar.timestamp <= bars[index - 1].timestamp {
        return Err(InputError::NonMonotonic {
            index,
            previous: bars[index - 1].timestamp,
            current: bar.timestamp,
        });
    }
    Ok(())
}

/// The tighter of the stop-loss and an armed trailing stop.
fn stop_leg(
    stop_loss: Option<f64>,
    trailing: Option<f64>,
    direction: Direction,
) -> Option<(f64, ExitReason)> {
    let d = direction.sign();
    match (stop_loss, trailing) {
        (Some(sl), Some(tr)) if d * (tr - sl) > 0.0 => Some((tr, ExitReason::Trailing)),
        (Some(sl), _) => Some((sl, ExitReason::StopLoss)),
        (None, Some(tr)) => Some((tr, ExitReason::Trailing)),
        (None, None) => None,
    }
}

fn crosses_adverse(bar: &Bar, direction: Direction, price: f64) -> bool {
    match direction {
        Direction::Long => bar.low <= price,
        Direction::Short => bar.high >= price,
    }
}

fn crosses_favourable(bar: &Bar, direction: Direction, price: f64) -> bool {
    match direction {
        Direction::Long => bar.high >= price,
        Direction::Short => bar.low <= price,
    }
}

fn close(
    bars: &[Bar],
    entry: &Entry,
    config: &ExitRuleConfig,
    exit_index: usize,
    exit_price: f64,
    exit_reason: ExitReason,
    exc: &Excursion,
) -> Trade {
    let d = entry.direction.sign();
    let trade = Trade {
        entry_index: entry.index,
        entry_time: bars[entry.index].timestamp,
        entry_price: entry.price,
        entry_atr: entry.atr,
        direction: entry.direction,
        exit_index,
        exit_time: bars[exit_index].timestamp,
        exit_price,
        exit_reason,
        holding_bars: exit_index - entry.index,
        pnl: d * (exit_price / entry.price - 1.0),
        pnl_atr: d * (exit_price - entry.price) / entry.atr,
        cost: config.cost_per_trade,
        mfe: exc.mfe / entry.price,
        mae: exc.mae / entry.price,
        mfe_atr: exc.mfe / entry.atr,
        mae_atr: exc.mae / entry.atr,
        t_mfe: exc.t_mfe,
    };
    debug!(
        entry = trade.entry_index,
        exit = trade.exit_index,
        reason = %trade.exit_reason,
        pnl = trade.pnl,
        "trade closed"
    );
    trade
}
