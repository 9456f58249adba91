//! Dataset runner: score, signal, simulate and aggregate one series, or many
//! in parallel.
//!
//! Entry points:
//! - `run_dataset()`: one validated series in memory, no I/O.
//! - `run_all()`: every configured dataset from a `BarSource`, fanned out
//!   over rayon. A failing dataset is reported and does not stop the others.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use maniplab_core::data::{BarBatches, BarSource, DataError, FileSource};
use maniplab_core::domain::{BarSeries, Timeframe, Trade};
use maniplab_core::engine::run_trade_walk;
use maniplab_core::error::InputError;
use maniplab_core::factor::{compute_manip_scores_with, ManipScores, HIGH_RISK_THRESHOLD};
use maniplab_core::fingerprint::RunFingerprint;
use maniplab_core::indicators::{Atr, Indicator};
use maniplab_core::signals::{ExtremeReversal, Signal, SignalGenerator};

use crate::config::{ConfigError, DatasetConfig, RunConfig};
use crate::equity::EquityCurve;
use crate::metrics::{aggregate, PerformanceSummary};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("input error: {0}")]
    Input(#[from] InputError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything produced for one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub schema_version: u32,
    pub label: String,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub period: Option<String>,
    pub bar_count: usize,
    pub gaps: usize,
    pub fingerprint: RunFingerprint,
    pub scored_bars: usize,
    pub high_risk_bars: usize,
    pub signals: Vec<Signal>,
    pub trades: Vec<Trade>,
    pub skipped_undefined_atr: usize,
    pub skipped_overlap: usize,
    pub summary: PerformanceSummary,
    /// Degraded or undefined statistics and data-quality notes.
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub scores: ManipScores,
    #[serde(skip)]
    pub equity: EquityCurve,
}

impl DatasetReport {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the full pipeline over one series.
pub fn run_dataset(
    series: &BarSeries,
    config: &RunConfig,
    period: Option<&str>,
) -> Result<DatasetReport, RunError> {
    let bars = series.bars();
    let label = match period {
        Some(p) => format!("{}/{p}", series.label()),
        None => series.label(),
    };

    let scores = compute_manip_scores_with(bars, &config.score)?;
    let atr = Atr::try_new(config.atr.period, config.atr.smoothing)?.compute(bars);
    let generator = ExtremeReversal::new(config.signal.clone())?;
    let signals = generator.generate(bars, &scores);
    let walk = run_trade_walk(bars, &signals, &atr, &config.exit)?;

    let equity = EquityCurve::for_policy(
        bars,
        &walk.trades,
        config.aggregation.initial_equity,
        config.aggregation.end_of_data,
    );
    let bars_per_year = config.annualization.bars_per_year(series.timeframe());
    let summary = aggregate(
        &walk.trades,
        &equity,
        bars_per_year,
        config.aggregation.end_of_data,
    );

    let analysis = (
        &config.score,
        &config.exit,
        &config.atr,
        &config.signal,
        &config.annualization,
        &config.aggregation,
    );
    let fingerprint = RunFingerprint::compute(&analysis, bars)?;

    let mut warnings = Vec::new();
    let gaps = series.gaps();
    if gaps > 0 {
        warnings.push(format!("{gaps} gaps in bar timestamps (not filled)"));
    }
    if scores.defined_count() == 0 {
        warnings.push(format!(
            "series shorter than score warm-up ({} bars): no scores",
            scores.warm_up()
        ));
    }
    if walk.skipped_undefined_atr > 0 {
        warnings.push(format!(
            "{} signals skipped: ATR undefined",
            walk.skipped_undefined_atr
        ));
    }
    if summary.trades.end_of_data_count > 0 {
        warnings.push(format!(
            "{} END_OF_DATA exits ({:?})",
            summary.trades.end_of_data_count, config.aggregation.end_of_data
        ));
    }
    for name in &summary.undefined {
        warnings.push(format!("{name} undefined"));
    }

    info!(
        dataset = %label,
        bars = bars.len(),
        signals = signals.len(),
        trades = walk.trades.len(),
        win_rate = %summary.trades.win_rate,
        profit_factor = %summary.trades.profit_factor,
        sharpe = summary.equity.sharpe,
        max_dd = summary.equity.max_drawdown,
        "dataset complete"
    );
    if !warnings.is_empty() {
        warn!(dataset = %label, warnings = ?warnings, "degraded statistics");
    }

    Ok(DatasetReport {
        schema_version: SCHEMA_VERSION,
        label,
        instrument: series.instrument().to_string(),
        timeframe: series.timeframe(),
        period: period.map(str::to_string),
        bar_count: bars.len(),
        gaps,
        fingerprint,
        scored_bars: scores.defined_count(),
        high_risk_bars: scores.high_risk_count(HIGH_RISK_THRESHOLD),
        signals,
        trades: walk.trades,
        skipped_undefined_atr: walk.skipped_undefined_atr,
        skipped_overlap: walk.skipped_overlap,
        summary,
        warnings,
        scores,
        equity,
    })
}

/// Result of one dataset in a multi-dataset run.
#[derive(Debug, Clone)]
pub enum DatasetOutcome {
    Completed(Box<DatasetReport>),
    Failed { label: String, error: String },
}

impl DatasetOutcome {
    pub fn label(&self) -> &str {
        match self {
            DatasetOutcome::Completed(report) => &report.label,
            DatasetOutcome::Failed { label, .. } => label,
        }
    }

    pub fn report(&self) -> Option<&DatasetReport> {
        match self {
            DatasetOutcome::Completed(report) => Some(report),
            DatasetOutcome::Failed { .. } => None,
        }
    }
}

/// Run every configured dataset. Outcomes come back in configuration order.
pub fn run_all(source: &dyn BarSource, config: &RunConfig) -> Vec<DatasetOutcome> {
    config
        .datasets
        .par_iter()
        .map(|dataset| {
            let label = dataset.label();
            let result = source
                .load(
                    &dataset.instrument,
                    dataset.timeframe,
                    dataset.start,
                    dataset.end,
                )
                .map_err(RunError::from)
                .and_then(|series| run_dataset(&series, config, dataset.period.as_deref()));
            match result {
                Ok(report) => DatasetOutcome::Completed(Box::new(report)),
                Err(e) => {
                    warn!(dataset = %label, error = %e, "dataset failed");
                    DatasetOutcome::Failed {
                        label,
                        error: e.to_string(),
                    }
                }
            }
        })
        .collect()
}

/// A file source covering every configured dataset. A directory path
/// registers its bar files in name order; a path shared by several datasets
/// is registered once.
pub fn file_source(datasets: &[DatasetConfig]) -> Result<FileSource, DataError> {
    let mut source = FileSource::new();
    let mut seen = HashSet::new();
    for dataset in datasets {
        let paths = if dataset.path.is_dir() {
            BarBatches::from_dir(&dataset.path)?.paths().to_vec()
        } else {
            vec![dataset.path.clone()]
        };
        for path in paths {
            if seen.insert((dataset.instrument.clone(), dataset.timeframe, path.clone())) {
                source.register(dataset.instrument.clone(), dataset.timeframe, path);
            }
        }
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maniplab_core::data::{synthetic_series, MemorySource, SyntheticConfig};

    fn synthetic(instrument: &str, n: usize) -> BarSeries {
        let config = SyntheticConfig {
            bars: n,
            seed: 11,
            spike_probability: 0.05,
            ..SyntheticConfig::default()
        };
        synthetic_series(instrument, Timeframe::M5, &config).unwrap()
    }

    fn dataset(instrument: &str) -> DatasetConfig {
        DatasetConfig {
            instrument: instrument.into(),
            timeframe: Timeframe::M5,
            path: "unused".into(),
            period: None,
            start: None,
            end: None,
        }
    }

    #[test]
    fn run_dataset_produces_consistent_report() {
        let series = synthetic("XAUUSD", 3_000);
        let report = run_dataset(&series, &RunConfig::default(), Some("2024")).unwrap();
        assert_eq!(report.label, "XAUUSD/5min/2024");
        assert_eq!(report.bar_count, 3_000);
        assert_eq!(report.scores.len(), 3_000);
        assert_eq!(report.equity.len(), 3_000);
        assert_eq!(
            report.signals.len(),
            report.trades.len() + report.skipped_undefined_atr + report.skipped_overlap
        );
        assert!(!report.trades.is_empty());
        for pair in report.trades.windows(2) {
            assert!(pair[1].entry_index > pair[0].exit_index);
        }
        assert!(report.summary.equity.max_drawdown <= 0.0);
    }

    #[test]
    fn run_is_deterministic() {
        let series = synthetic("BTCUSD", 1_500);
        let a = run_dataset(&series, &RunConfig::default(), None).unwrap();
        let b = run_dataset(&series, &RunConfig::default(), None).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn failing_dataset_does_not_abort_others() {
        let mut source = MemorySource::new();
        source.insert("XAUUSD", Timeframe::M5, synthetic("XAUUSD", 800).bars().to_vec());
        let config = RunConfig {
            datasets: vec![dataset("XAUUSD"), dataset("MISSING"), dataset("XAUUSD")],
            ..RunConfig::default()
        };
        let outcomes = run_all(&source, &config);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].report().is_some());
        assert!(matches!(&outcomes[1], DatasetOutcome::Failed { label, .. } if label == "MISSING/5min"));
        assert!(outcomes[2].report().is_some());
        assert_eq!(
            outcomes[0].report().unwrap().fingerprint,
            outcomes[2].report().unwrap().fingerprint
        );
    }
}
