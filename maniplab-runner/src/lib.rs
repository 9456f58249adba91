//! ManipLab Runner: configuration, aggregation, orchestration and reports.
//!
//! This crate builds on `maniplab-core` to provide:
//! - TOML run configuration with validation
//! - The performance aggregator (trade and equity statistics)
//! - Per-dataset pipeline and a parallel multi-dataset runner
//! - Post-manipulation forward-return study over bar batches
//! - CSV and JSON artifact export

pub mod config;
pub mod equity;
pub mod export;
pub mod metrics;
pub mod post_event;
pub mod runner;

pub use config::{ConfigError, DatasetConfig, PostManipConfig, RunConfig};
pub use equity::{EquityCurve, EquityPoint};
pub use metrics::{
    aggregate, max_drawdown, EndOfDataPolicy, EquityStats, PerformanceSummary, Ratio, TradeStats,
};
pub use post_event::{post_manip_analysis, BucketAccumulator, PostManipReport, StreamingScorer};
pub use runner::{
    file_source, run_all, run_dataset, DatasetOutcome, DatasetReport, RunError, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<DatasetReport>();
        assert_sync::<DatasetReport>();
        assert_send::<DatasetOutcome>();
        assert_sync::<DatasetOutcome>();
        assert_send::<PerformanceSummary>();
        assert_sync::<PerformanceSummary>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }
}
