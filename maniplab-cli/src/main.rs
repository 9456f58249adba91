//! ManipLab CLI: scoring, backtests, summaries and post-manipulation study.
//!
//! Commands:
//! - `score`: ManipScore per bar for one bar file, written as CSV
//! - `backtest`: every dataset in a TOML config, with trades/scores CSVs and
//!   a summary JSON
//! - `aggregate`: print the per-dataset statistics of a saved summary
//! - `post-manip`: forward returns bucketed by score level
//! - `synth`: write a seeded synthetic bar file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use maniplab_core::data::{
    read_bars, synthetic_series, write_bars_csv, write_bars_parquet, BarBatches, BarFormat,
    BarSource, SyntheticConfig,
};
use maniplab_core::domain::{BarSeries, Timeframe};
use maniplab_core::factor::{compute_manip_scores_with, HIGH_RISK_THRESHOLD};
use maniplab_runner::export::{
    export_post_manip_csv, export_scores_csv, import_summary_json, save_dataset_artifacts,
    save_summary, SummaryEntry,
};
use maniplab_runner::{
    file_source, post_manip_analysis, run_all, DatasetOutcome, PostManipReport, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "maniplab",
    version,
    about = "ManipLab: bar manipulation scoring and exit-rule backtests"
)]
struct Cli {
    /// Log filter, e.g. `debug` or `maniplab_runner=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the ManipScore of every bar in a CSV or Parquet file.
    Score {
        /// Bar file (.csv or .parquet).
        input: PathBuf,

        /// TOML config; only its [score] section is used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rolling window, overriding the config.
        #[arg(long)]
        window: Option<usize>,

        /// Output CSV. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run every [[datasets]] entry of a config through the full pipeline.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for CSV and JSON artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Print the statistics recorded in a summary JSON.
    Aggregate {
        /// summary.json written by `backtest`.
        summary: PathBuf,

        /// Print the full performance summaries as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Forward returns after bars, bucketed by score level.
    PostManip {
        /// A bar file, or a directory of bar files read in name order.
        input: PathBuf,

        /// TOML config; its [score] and [post_manip] sections are used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output CSV. Without it, only the table is printed.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write a synthetic bar series with occasional spikes.
    Synth {
        /// Output file (.csv or .parquet).
        output: PathBuf,

        #[arg(long, default_value = "SYNTH")]
        instrument: String,

        #[arg(long, default_value = "5min")]
        timeframe: Timeframe,

        #[arg(long, default_value_t = 10_000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Score {
            input,
            config,
            window,
            output,
        } => run_score(&input, config.as_deref(), window, output.as_deref()),
        Commands::Backtest { config, output_dir } => run_backtest(&config, &output_dir),
        Commands::Aggregate { summary, json } => run_aggregate(&summary, json),
        Commands::PostManip {
            input,
            config,
            output,
        } => run_post_manip(&input, config.as_deref(), output.as_deref()),
        Commands::Synth {
            output,
            instrument,
            timeframe,
            bars,
            seed,
        } => run_synth(&output, &instrument, timeframe, bars, seed),
    }
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid --log-level '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(p) => {
            RunConfig::load(p).with_context(|| format!("failed to load config {}", p.display()))
        }
        None => Ok(RunConfig::default()),
    }
}

// ─── score ──────────────────────────────────────────────────────────

fn run_score(
    input: &Path,
    config: Option<&Path>,
    window: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let mut score_config = load_config(config)?.score;
    if let Some(w) = window {
        score_config.window = w;
    }

    let bars = read_bars(input).with_context(|| format!("failed to read {}", input.display()))?;
    let scores = compute_manip_scores_with(&bars, &score_config)?;
    let csv = export_scores_csv(&bars, &scores)?;

    match output {
        Some(path) => {
            fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "scores written");
        }
        None => print!("{csv}"),
    }

    eprintln!(
        "{} bars, {} scored, {} above {HIGH_RISK_THRESHOLD}",
        bars.len(),
        scores.defined_count(),
        scores.high_risk_count(HIGH_RISK_THRESHOLD)
    );
    Ok(())
}

// ─── backtest ───────────────────────────────────────────────────────

fn run_backtest(config_path: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config(Some(config_path))?;
    if config.datasets.is_empty() {
        bail!("config {} has no [[datasets]]", config_path.display());
    }

    let source = file_source(&config.datasets)?;
    let outcomes = run_all(&source, &config);

    for (dataset, outcome) in config.datasets.iter().zip(&outcomes) {
        let Some(report) = outcome.report() else {
            continue;
        };
        let series = source.load(
            &dataset.instrument,
            dataset.timeframe,
            dataset.start,
            dataset.end,
        )?;
        save_dataset_artifacts(report, series.bars(), output_dir)?;
    }
    let summary_path = save_summary(&outcomes, output_dir)?;

    print_outcomes(&outcomes);
    println!("Artifacts saved to: {}", output_dir.display());
    println!("Summary: {}", summary_path.display());

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, DatasetOutcome::Failed { .. }))
        .count();
    if failed == outcomes.len() {
        bail!("all {failed} datasets failed");
    }
    Ok(())
}

fn print_outcomes(outcomes: &[DatasetOutcome]) {
    println!(
        "{:<28} {:>8} {:>7} {:>8} {:>9} {:>8} {:>9}",
        "Dataset", "Bars", "Trades", "WinRate", "PF", "Sharpe", "MaxDD"
    );
    println!("{}", "-".repeat(84));
    for outcome in outcomes {
        match outcome {
            DatasetOutcome::Completed(r) => {
                let s = &r.summary;
                println!(
                    "{:<28} {:>8} {:>7} {:>8} {:>9} {:>8.2} {:>8.2}%",
                    r.label,
                    r.bar_count,
                    s.trades.trade_count,
                    s.win_rate().to_string(),
                    s.profit_factor().to_string(),
                    s.sharpe(),
                    s.max_drawdown() * 100.0,
                );
            }
            DatasetOutcome::Failed { label, error } => {
                println!("{label:<28} FAILED: {error}");
            }
        }
    }

    let degraded: Vec<&DatasetOutcome> = outcomes
        .iter()
        .filter(|o| o.report().is_some_and(|r| r.is_degraded()))
        .collect();
    if !degraded.is_empty() {
        println!();
        println!("Degraded statistics:");
        for outcome in degraded {
            if let Some(r) = outcome.report() {
                for w in &r.warnings {
                    println!("  {}: {w}", r.label);
                }
            }
        }
    }
}

// ─── aggregate ──────────────────────────────────────────────────────

fn run_aggregate(summary_path: &Path, json: bool) -> Result<()> {
    let text = fs::read_to_string(summary_path)
        .with_context(|| format!("failed to read {}", summary_path.display()))?;
    let doc = import_summary_json(&text)?;

    if json {
        let summaries: Vec<_> = doc
            .datasets
            .iter()
            .filter_map(|entry| match entry {
                SummaryEntry::Ok { label, summary, .. } => {
                    Some(serde_json::json!({ "label": label, "summary": summary }))
                }
                SummaryEntry::Failed { .. } => None,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!(
        "{:<28} {:>7} {:>8} {:>9} {:>9} {:>10} {:>8} {:>9}",
        "Dataset", "Trades", "WinRate", "PF", "Capture", "AvgPnL", "Sharpe", "MaxDD"
    );
    println!("{}", "-".repeat(96));
    for entry in &doc.datasets {
        match entry {
            SummaryEntry::Ok {
                label,
                summary,
                warnings,
                ..
            } => {
                let avg = summary
                    .trades
                    .avg_pnl
                    .map(|p| format!("{:.4}%", p * 100.0))
                    .unwrap_or_else(|| "n/a".into());
                println!(
                    "{:<28} {:>7} {:>8} {:>9} {:>9} {:>10} {:>8.2} {:>8.2}%",
                    label,
                    summary.trades.trade_count,
                    summary.win_rate().to_string(),
                    summary.profit_factor().to_string(),
                    summary.profit_capture().to_string(),
                    avg,
                    summary.sharpe(),
                    summary.max_drawdown() * 100.0,
                );
                for w in warnings {
                    println!("  ! {w}");
                }
            }
            SummaryEntry::Failed { label, error } => println!("{label:<28} FAILED: {error}"),
        }
    }
    Ok(())
}

// ─── post-manip ─────────────────────────────────────────────────────

fn run_post_manip(input: &Path, config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let batches = if input.is_dir() {
        BarBatches::from_dir(input)?
    } else {
        BarBatches::new(vec![input.to_path_buf()])
    };
    if batches.is_empty() {
        bail!("no bar files found in {}", input.display());
    }

    let report = post_manip_analysis(batches, &config.score, &config.post_manip)?;
    print_post_manip(&report);

    if let Some(path) = output {
        fs::write(path, export_post_manip_csv(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn print_post_manip(report: &PostManipReport) {
    println!("{} bars, {} scored", report.total_bars, report.scored_bars);
    let mut header = format!("{:<12} {:>8} {:>8}", "Score", "Bars", "Share");
    for h in &report.horizons {
        header.push_str(&format!(" {:>10}", format!("fwd{h}")));
    }
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for bucket in &report.buckets {
        let mut row = format!(
            "{:<12} {:>8} {:>8}",
            bucket.label(),
            bucket.bars,
            bucket.share.to_string()
        );
        for h in &bucket.horizons {
            let cell = h
                .mean
                .map(|m| format!("{:.4}%", m * 100.0))
                .unwrap_or_else(|| "n/a".into());
            row.push_str(&format!(" {cell:>10}"));
        }
        println!("{row}");
    }
}

// ─── synth ──────────────────────────────────────────────────────────

fn run_synth(
    output: &Path,
    instrument: &str,
    timeframe: Timeframe,
    bars: usize,
    seed: u64,
) -> Result<()> {
    let config = SyntheticConfig {
        bars,
        seed,
        ..SyntheticConfig::default()
    };
    let series: BarSeries = synthetic_series(instrument, timeframe, &config)?;
    match BarFormat::from_path(output)? {
        BarFormat::Csv => {
            let file = fs::File::create(output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            write_bars_csv(file, series.bars())?;
        }
        BarFormat::Parquet => write_bars_parquet(output, series.bars())?,
    }
    println!(
        "Wrote {} {} bars to {}",
        series.bars().len(),
        series.label(),
        output.display()
    );
    Ok(())
}
