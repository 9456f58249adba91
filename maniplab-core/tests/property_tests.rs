//! Property tests for score and simulator invariants.
//!
//! 1. Score output is aligned with the input and undefined exactly in warm-up
//! 2. Defined scores lie in [0, 1]
//! 3. A bar touching the stop level closes at exactly that level
//! 4. Simulation is a pure function of its inputs
//! 5. The trailing stop only tightens once armed

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use maniplab_core::domain::{Bar, Direction, ExitReason};
use maniplab_core::exit::{simulate_trade, simulate_trade_path, Entry, ExitRuleConfig};
use maniplab_core::factor::{compute_manip_scores, ScoreWeights};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random-walk bars: each bar is (body return, wick up, wick down, volume).
fn arb_bars(min: usize, max: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (-0.02..0.02_f64, 0.0..0.01_f64, 0.0..0.01_f64, 0.0..5_000.0_f64),
        min..max,
    )
    .prop_map(|steps| {
        let base = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut close = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (ret, up, down, volume))| {
                let open = close;
                close = open * (1.0 + ret);
                Bar {
                    timestamp: base + Duration::minutes(15 * i as i64),
                    open,
                    high: open.max(close) * (1.0 + up),
                    low: open.min(close) * (1.0 - down),
                    close,
                    volume,
                }
            })
            .collect()
    })
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Long), Just(Direction::Short)]
}

fn arb_config() -> impl Strategy<Value = ExitRuleConfig> {
    (0.5..4.0_f64, 0.5..6.0_f64, 0.5..3.0_f64, 0.1..2.0_f64, 1..40_usize).prop_map(
        |(sl, tp, trigger, lock, hold)| ExitRuleConfig {
            stop_loss_atr: sl,
            take_profit_atr: tp,
            trailing_trigger_atr: trigger,
            trailing_lock_atr: lock,
            max_holding_bars: hold,
            ..ExitRuleConfig::default()
        },
    )
}

// ── 1-2. Score shape ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn score_length_and_warm_up(bars in arb_bars(1, 120), window in 2..30_usize) {
        let scores = compute_manip_scores(&bars, window, &ScoreWeights::default()).unwrap();
        prop_assert_eq!(scores.len(), bars.len());
        for (i, value) in scores.values().iter().enumerate() {
            if i + 1 < window {
                prop_assert!(value.is_none(), "bar {} defined inside warm-up", i);
            } else {
                prop_assert!(value.is_some(), "bar {} undefined after warm-up", i);
            }
        }
    }

    #[test]
    fn defined_scores_are_bounded(bars in arb_bars(20, 150)) {
        let scores = compute_manip_scores(&bars, 10, &ScoreWeights::default()).unwrap();
        for (_, s) in scores.defined() {
            prop_assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
        }
    }
}

// ── 3. Stop fill price ───────────────────────────────────────────────

proptest! {
    /// A long whose second bar dips exactly `s` ATR below entry closes at
    /// `entry - s * ATR`, whatever the bars after it do.
    #[test]
    fn stop_loss_fills_at_level(
        s in 0.5..5.0_f64,
        atr in 0.1..3.0_f64,
        tail in arb_bars(0, 20),
    ) {
        let entry_price = 100.0;
        let level = entry_price - s * atr;
        let base = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut bars = vec![
            Bar { timestamp: base, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 1.0 },
            Bar { timestamp: base + Duration::minutes(15), open: 100.0, high: 100.0, low: level, close: level, volume: 1.0 },
        ];
        for (k, mut bar) in tail.into_iter().enumerate() {
            bar.timestamp = base + Duration::minutes(15 * (k as i64 + 2));
            bars.push(bar);
        }
        let config = ExitRuleConfig {
            stop_loss_atr: s,
            take_profit_atr: f64::INFINITY,
            max_holding_bars: 100,
            ..ExitRuleConfig::default()
        };
        let entry = Entry { index: 0, direction: Direction::Long, price: entry_price, atr };
        let trade = simulate_trade(&bars, &entry, &config).unwrap();
        prop_assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        prop_assert_eq!(trade.exit_index, 1);
        prop_assert_eq!(trade.exit_price, level);
    }
}

// ── 4-5. Purity and ratchet ──────────────────────────────────────────

proptest! {
    #[test]
    fn simulation_is_idempotent(
        bars in arb_bars(2, 80),
        direction in arb_direction(),
        config in arb_config(),
    ) {
        let entry = Entry { index: 0, direction, price: bars[0].open, atr: 0.5 };
        let a = simulate_trade(&bars, &entry, &config).unwrap();
        let b = simulate_trade(&bars, &entry, &config).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.exit_index < bars.len());
        prop_assert!(a.mfe >= 0.0 && a.mae >= 0.0);
    }

    #[test]
    fn trailing_stop_only_tightens(
        bars in arb_bars(2, 80),
        direction in arb_direction(),
        config in arb_config(),
    ) {
        let entry = Entry { index: 0, direction, price: bars[0].open, atr: 0.5 };
        let path = simulate_trade_path(&bars, &entry, &config).unwrap();
        let stops: Vec<f64> = path.steps.iter().filter_map(|s| s.trailing_stop).collect();
        for pair in stops.windows(2) {
            match direction {
                Direction::Long => prop_assert!(pair[1] >= pair[0]),
                Direction::Short => prop_assert!(pair[1] <= pair[0]),
            }
        }
        // once armed, the stop stays armed
        let first_armed = path.steps.iter().position(|s| s.trailing_stop.is_some());
        if let Some(k) = first_armed {
            prop_assert!(path.steps[k..].iter().all(|s| s.trailing_stop.is_some()));
        }
    }
}
