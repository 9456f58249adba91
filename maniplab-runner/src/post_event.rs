//! Post-manipulation behaviour: forward returns bucketed by score level.
//!
//! The study runs as a streaming fold over bar batches. Scores are computed
//! per batch with the previous batch's tail carried over, so each bar sees
//! the same trailing window (and previous close) it would see in one
//! concatenated series. Forward
//! returns are resolved as later closes arrive, across batch boundaries.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use maniplab_core::data::BarBatches;
use maniplab_core::domain::Bar;
use maniplab_core::error::InputError;
use maniplab_core::factor::{compute_manip_scores_with, ManipScoreConfig};

use crate::config::PostManipConfig;
use crate::metrics::Ratio;
use crate::runner::RunError;

// ─── Streaming scorer ───────────────────────────────────────────────

/// Scores consecutive batches of one series.
#[derive(Debug, Clone)]
pub struct StreamingScorer {
    config: ManipScoreConfig,
    tail: Vec<Bar>,
}

impl StreamingScorer {
    pub fn new(config: ManipScoreConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            config,
            tail: Vec::new(),
        })
    }

    /// Scores for `batch`, aligned with it.
    pub fn push_batch(&mut self, batch: &[Bar]) -> Result<Vec<Option<f64>>, InputError> {
        let carry = self.tail.len();
        let mut joined = Vec::with_capacity(carry + batch.len());
        joined.extend_from_slice(&self.tail);
        joined.extend_from_slice(batch);

        let scores = compute_manip_scores_with(&joined, &self.config)?;
        // one bar beyond the warm-up supplies the previous close for true range
        let keep = (self.config.warm_up() + 1).min(joined.len());
        self.tail = joined[joined.len() - keep..].to_vec();
        Ok(scores.values()[carry..].to_vec())
    }
}

// ─── Accumulator ────────────────────────────────────────────────────

/// Running mean/variance (Welford) of forward returns.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: usize,
    mean: f64,
    m2: f64,
    positive: usize,
    sum_abs: f64,
}

impl Moments {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        if x > 0.0 {
            self.positive += 1;
        }
        self.sum_abs += x.abs();
    }

    fn stats(&self, horizon: usize) -> HorizonStats {
        let defined = self.n > 0;
        HorizonStats {
            horizon,
            count: self.n,
            mean: defined.then_some(self.mean),
            std: (self.n > 1).then(|| (self.m2 / (self.n - 1) as f64).sqrt()),
            positive_rate: Ratio::defined_or_undefined(self.positive as f64, self.n as f64),
            mean_abs: defined.then(|| self.sum_abs / self.n as f64),
        }
    }
}

/// Folds (score, close) pairs into per-bucket forward-return statistics.
#[derive(Debug, Clone)]
pub struct BucketAccumulator {
    edges: Vec<f64>,
    horizons: Vec<usize>,
    /// Bucket and close of the most recent bars, oldest first.
    pending: VecDeque<(Option<usize>, f64)>,
    window: usize,
    moments: Vec<Vec<Moments>>,
    bucket_bars: Vec<usize>,
    total_bars: usize,
    scored_bars: usize,
}

impl BucketAccumulator {
    pub fn new(config: &PostManipConfig) -> Self {
        let buckets = config.edges.len().saturating_sub(1);
        let window = config.horizons.iter().copied().max().unwrap_or(0);
        Self {
            edges: config.edges.clone(),
            horizons: config.horizons.clone(),
            pending: VecDeque::with_capacity(window + 1),
            window,
            moments: vec![vec![Moments::default(); config.horizons.len()]; buckets],
            bucket_bars: vec![0; buckets],
            total_bars: 0,
            scored_bars: 0,
        }
    }

    /// Bucket index of a score: `[e_k, e_k+1)`, the last bucket closed.
    pub fn bucket_of(&self, score: f64) -> Option<usize> {
        let last = self.edges.len().checked_sub(2)?;
        (0..=last).find(|&k| {
            let (lo, hi) = (self.edges[k], self.edges[k + 1]);
            score >= lo && (score < hi || (k == last && score <= hi))
        })
    }

    pub fn push(&mut self, score: Option<f64>, close: f64) {
        let len = self.pending.len();
        for (h_idx, &h) in self.horizons.iter().enumerate() {
            if h > len {
                continue;
            }
            if let (Some(bucket), base) = self.pending[len - h] {
                self.moments[bucket][h_idx].push(close / base - 1.0);
            }
        }

        let bucket = score.and_then(|s| self.bucket_of(s));
        self.total_bars += 1;
        if let Some(b) = bucket {
            self.scored_bars += 1;
            self.bucket_bars[b] += 1;
        }
        self.pending.push_back((bucket, close));
        if self.pending.len() > self.window {
            self.pending.pop_front();
        }
    }

    pub fn finish(self) -> PostManipReport {
        let buckets = self
            .moments
            .iter()
            .enumerate()
            .map(|(k, per_h)| BucketReport {
                lower: self.edges[k],
                upper: self.edges[k + 1],
                bars: self.bucket_bars[k],
                share: Ratio::defined_or_undefined(
                    self.bucket_bars[k] as f64,
                    self.scored_bars as f64,
                ),
                horizons: per_h
                    .iter()
                    .zip(&self.horizons)
                    .map(|(m, &h)| m.stats(h))
                    .collect(),
            })
            .collect();
        PostManipReport {
            horizons: self.horizons,
            total_bars: self.total_bars,
            scored_bars: self.scored_bars,
            buckets,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    pub horizon: usize,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample std (n - 1).
    pub std: Option<f64>,
    pub positive_rate: Ratio,
    pub mean_abs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketReport {
    pub lower: f64,
    pub upper: f64,
    pub bars: usize,
    /// Share of scored bars falling in this bucket.
    pub share: Ratio,
    pub horizons: Vec<HorizonStats>,
}

impl BucketReport {
    pub fn label(&self) -> String {
        format!("{:.2}-{:.2}", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostManipReport {
    pub horizons: Vec<usize>,
    pub total_bars: usize,
    pub scored_bars: usize,
    pub buckets: Vec<BucketReport>,
}

/// Run the study over every batch, in order.
pub fn post_manip_analysis(
    batches: BarBatches,
    score: &ManipScoreConfig,
    config: &PostManipConfig,
) -> Result<PostManipReport, RunError> {
    config.validate()?;
    let mut scorer = StreamingScorer::new(score.clone())?;
    let mut acc = BucketAccumulator::new(config);
    for (i, batch) in batches.enumerate() {
        let bars = batch?;
        let scores = scorer.push_batch(&bars)?;
        for (bar, s) in bars.iter().zip(scores) {
            acc.push(s, bar.close);
        }
        debug!(batch = i, bars = bars.len(), "post-manip batch folded");
    }
    Ok(acc.finish())
}
