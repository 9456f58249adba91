//! Performance aggregation: pure functions from trades and equity to statistics.
//!
//! Every ratio with a possibly-zero denominator resolves to a [`Ratio`]
//! instead of a float, so "infinite" and "undefined" survive serialization
//! and are never confused with 0.
//!
//! Zero-denominator policy:
//! - win rate: `Undefined` with no trades
//! - profit factor: `Infinite` when gross loss is 0 and gross profit > 0,
//!   `Undefined` when both are 0
//! - profit capture: `Undefined` when the summed MFE is 0
//! - Sharpe: 0 when volatility is 0 (a plain float, never a sentinel)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use maniplab_core::domain::{ExitReason, Trade};

use crate::equity::EquityCurve;

/// A ratio that may be infinite or undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Ratio {
    Finite(f64),
    Infinite,
    Undefined,
}

impl Ratio {
    /// `num / den`, with `Infinite` for a positive numerator over zero.
    pub fn of(num: f64, den: f64) -> Self {
        if den != 0.0 {
            Ratio::Finite(num / den)
        } else if num > 0.0 {
            Ratio::Infinite
        } else {
            Ratio::Undefined
        }
    }

    /// `num / den`, `Undefined` whenever the denominator is zero.
    pub fn defined_or_undefined(num: f64, den: f64) -> Self {
        if den == 0.0 {
            Ratio::Undefined
        } else {
            Ratio::Finite(num / den)
        }
    }

    /// Float view: `inf` for `Infinite`, `None` for `Undefined`.
    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Finite(v) => Some(v),
            Ratio::Infinite => Some(f64::INFINITY),
            Ratio::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        !matches!(self, Ratio::Undefined)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Finite(v) => write!(f, "{v:.4}"),
            Ratio::Infinite => f.write_str("inf"),
            Ratio::Undefined => f.write_str("n/a"),
        }
    }
}

/// How END_OF_DATA trades enter the trade statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfDataPolicy {
    /// Counted like any other trade; the summary is flagged degraded.
    #[default]
    Include,
    /// Left out of every statistic, equity included; still counted in
    /// `end_of_data_count`.
    Exclude,
}

impl EndOfDataPolicy {
    /// Whether `trade` enters the statistics under this policy.
    pub fn admits(self, trade: &Trade) -> bool {
        self == EndOfDataPolicy::Include || !trade.is_end_of_data()
    }
}

// ─── Trade statistics ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Trades that entered the statistics (after the END_OF_DATA policy).
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: Ratio,
    pub total_pnl: f64,
    pub total_net_pnl: f64,
    pub avg_pnl: Option<f64>,
    pub median_pnl: Option<f64>,
    pub avg_winner: Option<f64>,
    pub avg_loser: Option<f64>,
    pub profit_factor: Ratio,
    pub profit_capture: Ratio,
    pub mean_mfe: Option<f64>,
    pub mean_mae: Option<f64>,
    pub mean_mfe_atr: Option<f64>,
    pub mean_mae_atr: Option<f64>,
    pub mean_t_mfe: Option<f64>,
    pub mean_holding_bars: Option<f64>,
    pub exit_counts: BTreeMap<ExitReason, usize>,
    /// END_OF_DATA trades seen, whether or not they were included.
    pub end_of_data_count: usize,
    /// True when END_OF_DATA trades were included in the statistics.
    pub degraded: bool,
}

impl TradeStats {
    pub fn from_trades(trades: &[Trade], policy: EndOfDataPolicy) -> Self {
        let end_of_data_count = trades.iter().filter(|t| t.is_end_of_data()).count();
        let used: Vec<&Trade> = trades
            .iter()
            .filter(|t| policy.admits(t))
            .collect();
        let n = used.len();

        let pnls: Vec<f64> = used.iter().map(|t| t.pnl).collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p <= 0.0).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();
        let total_pnl: f64 = pnls.iter().sum();
        let total_mfe: f64 = used.iter().map(|t| t.mfe).sum();

        let mut exit_counts = BTreeMap::new();
        for t in &used {
            *exit_counts.entry(t.exit_reason).or_insert(0) += 1;
        }

        Self {
            trade_count: n,
            winners: wins.len(),
            losers: losses.len(),
            win_rate: Ratio::defined_or_undefined(wins.len() as f64, n as f64),
            total_pnl,
            total_net_pnl: used.iter().map(|t| t.net_pnl()).sum(),
            avg_pnl: mean(&pnls),
            median_pnl: median(&pnls),
            avg_winner: mean(&wins),
            avg_loser: mean(&losses),
            profit_factor: Ratio::of(gross_profit, gross_loss),
            profit_capture: Ratio::defined_or_undefined(total_pnl, total_mfe),
            mean_mfe: mean_of(&used, |t| t.mfe),
            mean_mae: mean_of(&used, |t| t.mae),
            mean_mfe_atr: mean_of(&used, |t| t.mfe_atr),
            mean_mae_atr: mean_of(&used, |t| t.mae_atr),
            mean_t_mfe: mean_of(&used, |t| t.t_mfe as f64),
            mean_holding_bars: mean_of(&used, |t| t.holding_bars as f64),
            exit_counts,
            end_of_data_count,
            degraded: policy == EndOfDataPolicy::Include && end_of_data_count > 0,
        }
    }
}

// ─── Equity statistics ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityStats {
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_vol: f64,
    pub sharpe: f64,
    /// Most negative drawdown, a fraction <= 0.
    pub max_drawdown: f64,
    /// Longest stretch of bars spent below a previous peak.
    pub max_drawdown_bars: usize,
    #[serde(skip)]
    pub drawdown: Vec<f64>,
}

impl EquityStats {
    pub fn from_curve(curve: &EquityCurve, bars_per_year: f64) -> Self {
        Self::from_values(curve.values(), bars_per_year)
    }

    /// Statistics of a plain equity series, one value per bar.
    pub fn from_values(equity: &[f64], bars_per_year: f64) -> Self {
        let returns: Vec<f64> = equity.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let total_return = match (equity.first(), equity.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => last / first - 1.0,
            _ => 0.0,
        };
        let annual_return = annualized_return(total_return, returns.len(), bars_per_year);
        let annual_vol = sample_std(&returns).unwrap_or(0.0) * bars_per_year.sqrt();
        let sharpe = if annual_vol > 0.0 {
            annual_return / annual_vol
        } else {
            0.0
        };
        let drawdown = drawdown_series(equity);
        Self {
            total_return,
            annual_return,
            annual_vol,
            sharpe,
            max_drawdown: drawdown.iter().copied().fold(0.0, f64::min),
            max_drawdown_bars: longest_underwater(&drawdown),
            drawdown,
        }
    }
}

/// Drawdown at each point relative to the running peak up to it (<= 0).
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            if peak > 0.0 {
                (e - peak) / peak
            } else {
                0.0
            }
        })
        .collect()
}

/// Maximum drawdown of an equity series: `min_t (e_t - peak_t) / peak_t`.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_series(equity).into_iter().fold(0.0, f64::min)
}

fn longest_underwater(drawdown: &[f64]) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for &dd in drawdown {
        if dd < 0.0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

/// Geometric annualisation of a total return over `periods` bars.
fn annualized_return(total_return: f64, periods: usize, bars_per_year: f64) -> f64 {
    if periods == 0 || bars_per_year <= 0.0 || total_return <= -1.0 {
        return 0.0;
    }
    let years = periods as f64 / bars_per_year;
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

// ─── Summary ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trades: TradeStats,
    pub equity: EquityStats,
    /// Names of statistics that came out undefined, for reports.
    pub undefined: Vec<String>,
}

impl PerformanceSummary {
    pub fn is_degraded(&self) -> bool {
        self.trades.degraded || !self.undefined.is_empty()
    }

    pub fn win_rate(&self) -> Ratio {
        self.trades.win_rate
    }

    pub fn profit_factor(&self) -> Ratio {
        self.trades.profit_factor
    }

    pub fn profit_capture(&self) -> Ratio {
        self.trades.profit_capture
    }

    pub fn sharpe(&self) -> f64 {
        self.equity.sharpe
    }

    pub fn max_drawdown(&self) -> f64 {
        self.equity.max_drawdown
    }
}

/// Reduce trades and their equity curve to one summary.
pub fn aggregate(
    trades: &[Trade],
    curve: &EquityCurve,
    bars_per_year: f64,
    policy: EndOfDataPolicy,
) -> PerformanceSummary {
    let trade_stats = TradeStats::from_trades(trades, policy);
    let equity = EquityStats::from_curve(curve, bars_per_year);

    let mut undefined = Vec::new();
    for (name, ratio) in [
        ("win_rate", trade_stats.win_rate),
        ("profit_factor", trade_stats.profit_factor),
        ("profit_capture", trade_stats.profit_capture),
    ] {
        if !ratio.is_defined() {
            undefined.push(name.to_string());
        }
    }
    if trade_stats.end_of_data_count > 0 {
        warn!(
            count = trade_stats.end_of_data_count,
            policy = ?policy,
            "END_OF_DATA exits present"
        );
    }

    PerformanceSummary {
        trades: trade_stats,
        equity,
        undefined,
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn mean_of(trades: &[&Trade], f: impl Fn(&Trade) -> f64) -> Option<f64> {
    let values: Vec<f64> = trades.iter().map(|&t| f(t)).collect();
    mean(&values)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Sample standard deviation (n - 1), `None` below two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}
