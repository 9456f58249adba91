//! Reporting and export: trades CSV, scores CSV, post-manip CSV, summary JSON.
//!
//! The summary JSON carries a `schema_version`; unknown versions are rejected
//! on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use maniplab_core::domain::{Bar, Trade};
use maniplab_core::factor::ManipScores;
use maniplab_core::fingerprint::RunId;

use crate::metrics::PerformanceSummary;
use crate::post_event::PostManipReport;
use crate::runner::{DatasetOutcome, DatasetReport, SCHEMA_VERSION};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: entry_index, entry_time, entry_price, entry_atr, direction,
/// exit_index, exit_time, exit_price, exit_reason, holding_bars, pnl,
/// net_pnl, pnl_atr, mfe, mae, mfe_atr, mae_atr, t_mfe
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_index",
        "entry_time",
        "entry_price",
        "entry_atr",
        "direction",
        "exit_index",
        "exit_time",
        "exit_price",
        "exit_reason",
        "holding_bars",
        "pnl",
        "net_pnl",
        "pnl_atr",
        "mfe",
        "mae",
        "mfe_atr",
        "mae_atr",
        "t_mfe",
    ])?;
    for t in trades {
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_time.format(TIME_FORMAT).to_string(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.entry_atr),
            &t.direction.to_string(),
            &t.exit_index.to_string(),
            &t.exit_time.format(TIME_FORMAT).to_string(),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.code().to_string(),
            &t.holding_bars.to_string(),
            &format!("{:.8}", t.pnl),
            &format!("{:.8}", t.net_pnl()),
            &format!("{:.4}", t.pnl_atr),
            &format!("{:.8}", t.mfe),
            &format!("{:.8}", t.mae),
            &format!("{:.4}", t.mfe_atr),
            &format!("{:.4}", t.mae_atr),
            &t.t_mfe.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export bars with their score. Warm-up bars have an empty `manip_score`.
pub fn export_scores_csv(bars: &[Bar], scores: &ManipScores) -> Result<String> {
    if bars.len() != scores.len() {
        bail!(
            "scores ({}) do not match bars ({})",
            scores.len(),
            bars.len()
        );
    }
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "manip_score",
    ])?;
    for (bar, score) in bars.iter().zip(scores.values()) {
        wtr.write_record([
            &bar.timestamp.format(TIME_FORMAT).to_string(),
            &bar.open.to_string(),
            &bar.high.to_string(),
            &bar.low.to_string(),
            &bar.close.to_string(),
            &bar.volume.to_string(),
            &score.map(|s| format!("{s:.6}")).unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per (bucket, horizon).
pub fn export_post_manip_csv(report: &PostManipReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bucket",
        "bars",
        "share",
        "horizon",
        "count",
        "mean",
        "std",
        "positive_rate",
        "mean_abs",
    ])?;
    let opt = |v: Option<f64>| v.map(|x| format!("{x:.8}")).unwrap_or_default();
    for bucket in &report.buckets {
        for h in &bucket.horizons {
            wtr.write_record([
                bucket.label(),
                bucket.bars.to_string(),
                opt(bucket.share.value()),
                h.horizon.to_string(),
                h.count.to_string(),
                opt(h.mean),
                opt(h.std),
                opt(h.positive_rate.value()),
                opt(h.mean_abs),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON summary ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryEntry {
    Ok {
        label: String,
        run_id: RunId,
        bars: usize,
        scored_bars: usize,
        high_risk_bars: usize,
        signals: usize,
        summary: PerformanceSummary,
        warnings: Vec<String>,
    },
    Failed {
        label: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub schema_version: u32,
    pub datasets: Vec<SummaryEntry>,
}

impl SummaryDocument {
    pub fn from_outcomes(outcomes: &[DatasetOutcome]) -> Self {
        let datasets = outcomes
            .iter()
            .map(|outcome| match outcome {
                DatasetOutcome::Completed(r) => SummaryEntry::Ok {
                    label: r.label.clone(),
                    run_id: r.fingerprint.run_id.clone(),
                    bars: r.bar_count,
                    scored_bars: r.scored_bars,
                    high_risk_bars: r.high_risk_bars,
                    signals: r.signals.len(),
                    summary: r.summary.clone(),
                    warnings: r.warnings.clone(),
                },
                DatasetOutcome::Failed { label, error } => SummaryEntry::Failed {
                    label: label.clone(),
                    error: error.clone(),
                },
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION,
            datasets,
        }
    }
}

pub fn export_summary_json(outcomes: &[DatasetOutcome]) -> Result<String> {
    serde_json::to_string_pretty(&SummaryDocument::from_outcomes(outcomes))
        .context("failed to serialize summary to JSON")
}

/// Parse a summary document, rejecting unknown schema versions.
pub fn import_summary_json(json: &str) -> Result<SummaryDocument> {
    let doc: SummaryDocument =
        serde_json::from_str(json).context("failed to deserialize summary JSON")?;
    if doc.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            doc.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(doc)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// File-name stem for a dataset label: `XAUUSD/5min/2024` -> `XAUUSD_5min_2024`.
pub fn artifact_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Write `{stem}_trades.csv` and `{stem}_scores.csv` for one dataset.
pub fn save_dataset_artifacts(
    report: &DatasetReport,
    bars: &[Bar],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let stem = artifact_stem(&report.label);

    let trades_path = output_dir.join(format!("{stem}_trades.csv"));
    fs::write(&trades_path, export_trades_csv(&report.trades)?)
        .with_context(|| format!("failed to write {}", trades_path.display()))?;

    let scores_path = output_dir.join(format!("{stem}_scores.csv"));
    fs::write(&scores_path, export_scores_csv(bars, &report.scores)?)
        .with_context(|| format!("failed to write {}", scores_path.display()))?;

    Ok(vec![trades_path, scores_path])
}

/// Write `summary.json` for a multi-dataset run.
pub fn save_summary(outcomes: &[DatasetOutcome], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join("summary.json");
    fs::write(&path, export_summary_json(outcomes)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_is_file_safe() {
        assert_eq!(artifact_stem("XAUUSD/5min/2024"), "XAUUSD_5min_2024");
    }

    #[test]
    fn failed_outcomes_survive_roundtrip() {
        let outcomes = vec![DatasetOutcome::Failed {
            label: "BTCUSD/4h".into(),
            error: "no data".into(),
        }];
        let json = export_summary_json(&outcomes).unwrap();
        assert!(json.contains("\"status\": \"failed\""));
        let doc = import_summary_json(&json).unwrap();
        assert_eq!(doc.schema_version, SCHEMA_VERSION);
        assert_eq!(
            doc.datasets[0],
            SummaryEntry::Failed {
                label: "BTCUSD/4h".into(),
                error: "no data".into()
            }
        );
    }

    #[test]
    fn future_schema_rejected() {
        let json = r#"{"schema_version": 99, "datasets": []}"#;
        assert!(import_summary_json(json).is_err());
    }
}
