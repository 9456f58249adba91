//! ManipLab Core: bar data, the ManipScore factor and the exit-rule simulator.
//!
//! This crate contains the computational heart of the workspace:
//! - Domain types (bars, series, ticks, trades, exit reasons)
//! - Indicators (ATR, rolling statistics)
//! - ManipScore: a bounded [0, 1] per-bar anomaly score
//! - Exit-rule simulator with configurable intrabar path policy
//! - Entry signals and the non-overlapping trade walker
//! - Data ingestion (tick aggregation, CSV/Parquet, restartable batches)
//!
//! Nothing outside `data` performs I/O.

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod exit;
pub mod factor;
pub mod fingerprint;
pub mod indicators;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can cross thread boundaries.
    ///
    /// The runner fans datasets out over rayon; if any of these stops being
    /// Send + Sync the build breaks here first.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        // Factor and exit types
        require_send::<factor::ManipScores>();
        require_sync::<factor::ManipScores>();
        require_send::<factor::ManipScoreConfig>();
        require_sync::<factor::ManipScoreConfig>();
        require_send::<exit::ExitRuleConfig>();
        require_sync::<exit::ExitRuleConfig>();
        require_send::<exit::TradePath>();
        require_sync::<exit::TradePath>();

        // Signals
        require_send::<signals::ExtremeReversal>();
        require_sync::<signals::ExtremeReversal>();
        require_send::<signals::Signal>();
        require_sync::<signals::Signal>();

        // Data
        require_send::<data::FileSource>();
        require_sync::<data::FileSource>();
        require_send::<data::BarBatches>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        // Fingerprints
        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
    }

    /// Signal generators see bars and scores only, never open trades.
    #[test]
    fn signal_generator_is_object_safe() {
        fn _check_trait_object_builds(
            generator: &dyn signals::SignalGenerator,
            bars: &[domain::Bar],
            scores: &factor::ManipScores,
        ) -> Vec<signals::Signal> {
            generator.generate(bars, scores)
        }
    }

    #[test]
    fn bar_source_is_object_safe() {
        fn _check(source: &dyn data::BarSource) -> &str {
            source.name()
        }
    }
}
