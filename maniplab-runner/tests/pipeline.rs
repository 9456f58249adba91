//! End-to-end tests: bar files on disk through the runner to exported
//! artifacts.

use std::fs::{self, File};
use std::path::Path;

use chrono::{Duration, NaiveDate};
use maniplab_core::data::{
    read_bars, synthetic_series, write_bars_csv, write_bars_parquet, BarBatches, SyntheticConfig,
};
use maniplab_core::domain::{Bar, BarSeries, Direction, ExitReason, Timeframe, Trade};
use maniplab_runner::export::{
    import_summary_json, save_dataset_artifacts, save_summary, SummaryEntry,
};
use maniplab_runner::{
    aggregate, file_source, post_manip_analysis, run_all, DatasetOutcome, EndOfDataPolicy,
    EquityCurve, Ratio, RunConfig,
};

fn series(n: usize) -> BarSeries {
    let config = SyntheticConfig {
        bars: n,
        seed: 5,
        spike_probability: 0.05,
        ..SyntheticConfig::default()
    };
    synthetic_series("XAUUSD", Timeframe::M5, &config).unwrap()
}

fn write_csv(path: &Path, bars: &[Bar]) {
    write_bars_csv(File::create(path).unwrap(), bars).unwrap();
}

fn config_for(data_dir: &Path) -> RunConfig {
    let text = format!(
        r#"
[exit]
stop_loss_atr = 0.5
take_profit_atr = 0.8
max_holding_bars = 5

[[datasets]]
instrument = "XAUUSD"
timeframe = "5min"
path = {:?}
period = "synthetic"

[[datasets]]
instrument = "EURUSD"
timeframe = "5min"
path = {:?}
"#,
        data_dir.display().to_string(),
        data_dir.join("missing.csv").display().to_string(),
    );
    RunConfig::from_toml_str(&text).unwrap()
}

#[test]
fn backtest_from_mixed_files_to_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let series = series(2_000);
    let (head, tail) = series.bars().split_at(1_200);
    write_csv(&data_dir.join("a_part.csv"), head);
    write_bars_parquet(&data_dir.join("b_part.parquet"), tail).unwrap();

    let config = config_for(&data_dir);
    let source = file_source(&config.datasets).unwrap();
    let outcomes = run_all(&source, &config);
    assert_eq!(outcomes.len(), 2);

    let report = outcomes[0].report().expect("first dataset completes");
    assert_eq!(report.label, "XAUUSD/5min/synthetic");
    assert_eq!(report.bar_count, 2_000);
    assert_eq!(report.gaps, 0);
    assert!(report.scored_bars > 0);
    assert!(!report.signals.is_empty());
    assert!(matches!(&outcomes[1], DatasetOutcome::Failed { label, .. } if label == "EURUSD/5min"));

    let out_dir = tmp.path().join("out");
    let bars: Vec<Bar> = BarBatches::from_dir(&data_dir)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .concat();
    let written = save_dataset_artifacts(report, &bars, &out_dir).unwrap();
    assert_eq!(written.len(), 2);
    let scores_csv = fs::read_to_string(out_dir.join("XAUUSD_5min_synthetic_scores.csv")).unwrap();
    assert_eq!(scores_csv.lines().count(), 2_001);
    let trades_csv = fs::read_to_string(out_dir.join("XAUUSD_5min_synthetic_trades.csv")).unwrap();
    assert_eq!(trades_csv.lines().count(), report.trades.len() + 1);

    let summary_path = save_summary(&outcomes, &out_dir).unwrap();
    let doc = import_summary_json(&fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(doc.datasets.len(), 2);
    match &doc.datasets[0] {
        SummaryEntry::Ok {
            label,
            bars,
            summary,
            ..
        } => {
            assert_eq!(label, "XAUUSD/5min/synthetic");
            assert_eq!(*bars, 2_000);
            assert_eq!(summary.trades.trade_count, report.trades.len());
        }
        other => panic!("expected completed entry, got {other:?}"),
    }
    assert!(matches!(doc.datasets[1], SummaryEntry::Failed { .. }));
}

#[test]
fn repeated_runs_share_fingerprints() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    write_csv(&data_dir.join("bars.csv"), series(1_000).bars());

    let config = config_for(&data_dir);
    let source = file_source(&config.datasets).unwrap();
    let a = run_all(&source, &config);
    let b = run_all(&source, &config);
    let (ra, rb) = (a[0].report().unwrap(), b[0].report().unwrap());
    assert_eq!(ra.fingerprint, rb.fingerprint);
    assert_eq!(ra.trades, rb.trades);
}

#[test]
fn post_manip_over_batches_matches_single_file() {
    let tmp = tempfile::tempdir().unwrap();
    let split_dir = tmp.path().join("split");
    fs::create_dir_all(&split_dir).unwrap();

    let series = series(1_500);
    for (i, chunk) in series.bars().chunks(400).enumerate() {
        write_csv(&split_dir.join(format!("part_{i:02}.csv")), chunk);
    }
    let whole = tmp.path().join("whole.csv");
    write_csv(&whole, series.bars());

    let config = RunConfig::default();
    let split = post_manip_analysis(
        BarBatches::from_dir(&split_dir).unwrap(),
        &config.score,
        &config.post_manip,
    )
    .unwrap();
    let single = post_manip_analysis(
        BarBatches::new(vec![whole.clone()]),
        &config.score,
        &config.post_manip,
    )
    .unwrap();

    assert_eq!(split.total_bars, 1_500);
    assert_eq!(split.total_bars, single.total_bars);
    assert_eq!(split.scored_bars, single.scored_bars);
    assert!(split.scored_bars > 0);
    assert!(split.scored_bars <= 1_500 - config.score.warm_up());
    for (a, b) in split.buckets.iter().zip(&single.buckets) {
        assert_eq!(a.bars, b.bars);
        for (ha, hb) in a.horizons.iter().zip(&b.horizons) {
            assert_eq!(ha.count, hb.count);
            match (ha.mean, hb.mean) {
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-12),
                (x, y) => assert_eq!(x, y),
            }
        }
    }
    assert_eq!(read_bars(&whole).unwrap().len(), 1_500);
}

// ─── Aggregation scenarios ──────────────────────────────────────────

fn flat_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| Bar {
            timestamp: base + Duration::minutes(5 * i as i64),
            open: 100.0,
            high: 100.5,
            low: 99.5,
            close: 100.0,
            volume: 10.0,
        })
        .collect()
}

fn trade(bars: &[Bar], exit_index: usize, pnl: f64, reason: ExitReason) -> Trade {
    Trade {
        entry_index: exit_index - 1,
        entry_time: bars[exit_index - 1].timestamp,
        entry_price: 100.0,
        entry_atr: 1.0,
        direction: Direction::Long,
        exit_index,
        exit_time: bars[exit_index].timestamp,
        exit_price: 100.0 * (1.0 + pnl),
        exit_reason: reason,
        holding_bars: 1,
        pnl,
        pnl_atr: pnl * 100.0,
        cost: 0.0,
        mfe: pnl.max(0.0),
        mae: (-pnl).max(0.0),
        mfe_atr: pnl.max(0.0) * 100.0,
        mae_atr: (-pnl).max(0.0) * 100.0,
        t_mfe: 1,
    }
}

#[test]
fn equity_path_drawdown_and_trade_ratios() {
    let bars = flat_bars(4);
    let trades = [
        trade(&bars, 1, 0.10, ExitReason::TakeProfit),
        trade(&bars, 2, 90.0 / 110.0 - 1.0, ExitReason::StopLoss),
        trade(&bars, 3, 120.0 / 90.0 - 1.0, ExitReason::TakeProfit),
    ];
    let curve = EquityCurve::from_trades(&bars, &trades, 100.0);
    for (got, want) in curve.values().iter().zip([100.0, 110.0, 90.0, 120.0]) {
        assert!((got - want).abs() < 1e-9);
    }

    let summary = aggregate(&trades, &curve, 252.0 * 288.0, EndOfDataPolicy::Include);
    assert!((summary.max_drawdown() - (-20.0 / 110.0)).abs() < 1e-12);
    assert_eq!(summary.equity.max_drawdown_bars, 1);
    assert!((summary.equity.total_return - 0.2).abs() < 1e-12);
    assert_eq!(summary.trades.winners, 2);
    assert_eq!(summary.trades.losers, 1);
    let gross_win = 0.10 + (120.0 / 90.0 - 1.0);
    let gross_loss = 1.0 - 90.0 / 110.0;
    match summary.profit_factor() {
        Ratio::Finite(pf) => assert!((pf - gross_win / gross_loss).abs() < 1e-12),
        other => panic!("expected finite profit factor, got {other:?}"),
    }
    assert!(summary.undefined.is_empty());
}

#[test]
fn only_winners_give_infinite_profit_factor() {
    let bars = flat_bars(5);
    let trades = [
        trade(&bars, 1, 0.01, ExitReason::TakeProfit),
        trade(&bars, 3, 0.02, ExitReason::Time),
    ];
    let curve = EquityCurve::from_trades(&bars, &trades, 1.0);
    let summary = aggregate(&trades, &curve, 252.0, EndOfDataPolicy::Include);
    assert_eq!(summary.profit_factor(), Ratio::Infinite);
    assert_eq!(summary.win_rate(), Ratio::Finite(1.0));
    assert_eq!(summary.max_drawdown(), 0.0);

    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains(r#""profit_factor":{"kind":"infinite"}"#));
}

#[test]
fn no_trades_leave_ratios_undefined() {
    let bars = flat_bars(10);
    let curve = EquityCurve::from_trades(&bars, &[], 1.0);
    let summary = aggregate(&[], &curve, 252.0, EndOfDataPolicy::Include);
    assert_eq!(summary.trades.trade_count, 0);
    assert_eq!(summary.win_rate(), Ratio::Undefined);
    assert_eq!(summary.profit_factor(), Ratio::Undefined);
    assert_eq!(summary.sharpe(), 0.0);
    assert!(summary.undefined.iter().any(|n| n == "profit_factor"));
}

#[test]
fn excluded_end_of_data_trade_stays_out_of_equity_stats() {
    let bars = flat_bars(7);
    let trades = [
        trade(&bars, 2, 0.05, ExitReason::TakeProfit),
        trade(&bars, 5, -0.30, ExitReason::EndOfData),
    ];
    let policy = EndOfDataPolicy::Exclude;
    let curve = EquityCurve::for_policy(&bars, &trades, 1.0, policy);
    let summary = aggregate(&trades, &curve, 252.0 * 288.0, policy);

    assert_eq!(summary.trades.trade_count, 1);
    assert_eq!(summary.trades.end_of_data_count, 1);
    assert!(!summary.trades.degraded);
    assert_eq!(summary.profit_factor(), Ratio::Infinite);
    assert!((summary.equity.total_return - 0.05).abs() < 1e-12);
    assert_eq!(summary.max_drawdown(), 0.0);

    let flagged = EquityCurve::for_policy(&bars, &trades, 1.0, EndOfDataPolicy::Include);
    let summary = aggregate(&trades, &flagged, 252.0 * 288.0, EndOfDataPolicy::Include);
    assert!(summary.trades.degraded);
    assert!((summary.max_drawdown() - (-0.30)).abs() < 1e-12);
}
