//! Trade walking over a scored, signalled bar series.

pub mod walker;

pub use walker::{run_trade_walk, WalkResult};
