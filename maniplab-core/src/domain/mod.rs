//! Domain types for maniplab

pub mod bar;
pub mod tick;
pub mod trade;

pub use bar::{validate_bars, Bar, BarSeries, Timeframe};
pub use tick::Tick;
pub use trade::{Direction, ExitReason, Trade};

/// Instrument symbol type alias
pub type Symbol = String;
