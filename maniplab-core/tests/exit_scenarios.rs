//! Hand-computed exit scenarios for the simulator and the trade walk.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use maniplab_core::domain::{Bar, Direction, ExitReason};
use maniplab_core::engine::run_trade_walk;
use maniplab_core::exit::{simulate_trade, simulate_trade_path, Entry, ExitRuleConfig, PathPolicy};
use maniplab_core::indicators::{Atr, AtrSmoothing, Indicator};
use maniplab_core::signals::Signal;

// ── Helpers ──────────────────────────────────────────────────────────

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// Bars from (open, high, low, close), 5 minutes apart.
fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base_time() + Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        })
        .collect()
}

fn long_at_100() -> Entry {
    Entry {
        index: 0,
        direction: Direction::Long,
        price: 100.0,
        atr: 2.0,
    }
}

fn sl3_tp1() -> ExitRuleConfig {
    ExitRuleConfig {
        stop_loss_atr: 3.0,
        take_profit_atr: 1.0,
        max_holding_bars: 10,
        ..ExitRuleConfig::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn take_profit_on_second_bar() {
    let series = bars(&[
        (100.0, 101.0, 99.0, 100.5),
        (100.5, 103.0, 100.0, 102.5),
        (102.5, 106.0, 101.0, 105.0),
    ]);
    let trade = simulate_trade(&series, &long_at_100(), &sl3_tp1()).unwrap();
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.exit_price, 102.0);
    assert_eq!(trade.holding_bars, 1);
    assert_eq!(trade.exit_index, 1);
    assert!((trade.pnl - 0.02).abs() < 1e-12);
    // MFE includes the exit bar's high
    assert!((trade.mfe - 0.03).abs() < 1e-12);
    assert_eq!(trade.t_mfe, 1);
}

#[test]
fn stop_loss_on_entry_bar() {
    let series = bars(&[(100.0, 100.0, 93.0, 95.0)]);
    let trade = simulate_trade(&series, &long_at_100(), &sl3_tp1()).unwrap();
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_price, 94.0);
    assert_eq!(trade.holding_bars, 0);
}

#[test]
fn shallow_dip_on_last_bar_is_end_of_data() {
    let series = bars(&[(100.0, 100.0, 97.0, 98.0)]);
    let trade = simulate_trade(&series, &long_at_100(), &sl3_tp1()).unwrap();
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.exit_price, 100.0);
    assert_eq!(trade.holding_bars, 0);
    assert_eq!(trade.pnl, 0.0);
}

#[test]
fn entry_at_final_bar_closes_immediately() {
    let series = bars(&[
        (100.0, 101.0, 99.0, 100.0),
        (100.0, 101.0, 99.5, 100.5),
        (100.5, 101.0, 100.0, 100.8),
    ]);
    let entry = Entry {
        index: 2,
        direction: Direction::Short,
        price: 100.5,
        atr: 2.0,
    };
    let trade = simulate_trade(&series, &entry, &sl3_tp1()).unwrap();
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.holding_bars, 0);
    assert_eq!(trade.exit_price, entry.price);
    assert!(trade.is_end_of_data());
}

#[test]
fn stop_fill_ignores_later_bars() {
    let head = [
        (100.0, 101.0, 98.0, 99.0),
        (99.0, 99.5, 94.0, 95.0),
    ];
    let mut a = head.to_vec();
    a.push((95.0, 120.0, 90.0, 110.0));
    let mut b = head.to_vec();
    b.push((95.0, 96.0, 50.0, 60.0));
    let ta = simulate_trade(&bars(&a), &long_at_100(), &sl3_tp1()).unwrap();
    let tb = simulate_trade(&bars(&b), &long_at_100(), &sl3_tp1()).unwrap();
    assert_eq!(ta, tb);
    assert_eq!(ta.exit_reason, ExitReason::StopLoss);
    assert_eq!(ta.exit_price, 94.0);
}

#[test]
fn same_bar_tie_follows_path_policy() {
    // wide bar crossing both 94 and 102
    let series = bars(&[(100.0, 103.0, 93.0, 100.0)]);
    let mut config = sl3_tp1();

    config.path_policy = PathPolicy::WorstCase;
    let worst = simulate_trade(&series, &long_at_100(), &config).unwrap();
    assert_eq!(worst.exit_reason, ExitReason::StopLoss);

    config.path_policy = PathPolicy::BestCase;
    let best = simulate_trade(&series, &long_at_100(), &config).unwrap();
    assert_eq!(best.exit_reason, ExitReason::TakeProfit);

    // open 100 is 3 below the high and 7 above the low: high visited first
    config.path_policy = PathPolicy::OhlcPath;
    let ohlc = simulate_trade(&series, &long_at_100(), &config).unwrap();
    assert_eq!(ohlc.exit_reason, ExitReason::TakeProfit);
}

#[test]
fn time_exit_fills_at_close() {
    let series = bars(&[
        (100.0, 100.5, 99.5, 100.2),
        (100.2, 100.8, 99.8, 100.4),
        (100.4, 101.0, 100.0, 100.7),
        (100.7, 101.2, 100.3, 100.9),
    ]);
    let config = ExitRuleConfig {
        max_holding_bars: 2,
        ..sl3_tp1()
    };
    let trade = simulate_trade(&series, &long_at_100(), &config).unwrap();
    assert_eq!(trade.exit_reason, ExitReason::Time);
    assert_eq!(trade.holding_bars, 2);
    assert_eq!(trade.exit_price, 100.7);
}

#[test]
fn trailing_stop_locks_profit() {
    // ATR 2: trigger at +2 (102), stop 1 behind the best price
    let series = bars(&[
        (100.0, 100.5, 99.5, 100.2),
        (100.2, 103.0, 100.1, 102.8),
        (102.8, 104.0, 102.5, 103.5),
        (103.5, 103.6, 102.0, 102.4),
    ]);
    let config = ExitRuleConfig {
        stop_loss_atr: 3.0,
        take_profit_atr: f64::INFINITY,
        trailing_trigger_atr: 1.0,
        trailing_lock_atr: 0.5,
        max_holding_bars: 10,
        ..ExitRuleConfig::default()
    };
    let path = simulate_trade_path(&series, &long_at_100(), &config).unwrap();
    assert_eq!(path.trade.exit_reason, ExitReason::Trailing);
    assert_eq!(path.trade.exit_index, 3);
    assert_eq!(path.trade.exit_price, 103.0);

    let stops: Vec<Option<f64>> = path.steps.iter().map(|s| s.trailing_stop).collect();
    assert_eq!(stops, vec![None, None, Some(102.0), Some(103.0)]);
}

#[test]
fn walk_takes_one_trade_at_a_time() {
    let ohlc: Vec<(f64, f64, f64, f64)> = (0..30)
        .map(|i| {
            let c = 100.0 + (i as f64 * 0.7).sin();
            (c - 0.1, c + 0.6, c - 0.6, c)
        })
        .collect();
    let series = bars(&ohlc);
    let atr = Atr::new(5, AtrSmoothing::Simple).compute(&series);
    let signal = |signal_index: usize| Signal {
        signal_index,
        entry_index: signal_index + 1,
        direction: Direction::Long,
        score: 0.9,
        strength: 3.0,
    };
    // the first signal sits inside the ATR warm-up
    let signals = [signal(2), signal(10), signal(11), signal(25)];
    let config = ExitRuleConfig {
        max_holding_bars: 5,
        stop_loss_atr: 50.0,
        take_profit_atr: 50.0,
        ..ExitRuleConfig::default()
    };
    let result = run_trade_walk(&series, &signals, &atr, &config).unwrap();
    assert_eq!(result.skipped_undefined_atr, 1);
    assert_eq!(result.skipped_overlap, 1);
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].entry_index, 11);
    assert_eq!(result.trades[0].exit_index, 16);
    assert_eq!(result.trades[1].entry_index, 26);
    assert_eq!(result.signals_seen(), 4);
}
