//! Error taxonomy shared by the core computations.
//!
//! `InputError` is surfaced immediately and never repaired. `StatError` marks a
//! statistic that is undefined for the requested position (the warm-up window).

use chrono::NaiveDateTime;
use thiserror::Error;

/// Malformed input handed to a core computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("bar {index} fails OHLCV sanity checks")]
    InsaneBar { index: usize },

    #[error("timestamps not strictly increasing at bar {index} ({previous} >= {current})")]
    NonMonotonic {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("entry price must be finite and positive, got {0}")]
    InvalidEntryPrice(f64),

    #[error("entry ATR must be finite and positive, got {0}")]
    InvalidAtr(f64),

    #[error("entry index {index} out of bounds for series of {len} bars")]
    EntryOutOfBounds { index: usize, len: usize },

    #[error("window must be >= {min}, got {got}")]
    InvalidWindow { got: usize, min: usize },

    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("series length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// A statistic requested where it is not defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatError {
    #[error("score undefined at bar {index}: inside warm-up of {warm_up} bars")]
    WarmUp { index: usize, warm_up: usize },

    #[error("bar {index} out of bounds for {len} scores")]
    OutOfBounds { index: usize, len: usize },
}
