//! Run fingerprinting: deterministic identification of a run's inputs.
//!
//! - `ConfigHash`: BLAKE3 over the canonical JSON of the run configuration.
//! - `DatasetHash`: BLAKE3 over the bar contents (timestamps and raw f64 bits).
//! - `RunId`: BLAKE3 over the pair, used to name exported artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::epoch_millis;
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// First 16 hex characters, for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(16)]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash a serializable configuration.
///
/// serde_json writes struct fields in declaration order and maps in key
/// order when they are `BTreeMap`s, so the JSON text is canonical for a
/// given type.
pub fn config_hash<C: Serialize>(config: &C) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_string(config)?;
    Ok(ConfigHash(blake3::hash(json.as_bytes()).to_hex().to_string()))
}

pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&epoch_millis(bar.timestamp).to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Complete identity of one dataset run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunFingerprint {
    pub fn new(config_hash: ConfigHash, dataset_hash: DatasetHash) -> Self {
        let canonical = serde_json::json!({
            "config_hash": &config_hash.0,
            "dataset_hash": &dataset_hash.0,
        });
        let run_id = RunId(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string());
        Self {
            run_id,
            config_hash,
            dataset_hash,
        }
    }

    pub fn compute<C: Serialize>(config: &C, bars: &[Bar]) -> Result<Self, serde_json::Error> {
        Ok(Self::new(config_hash(config)?, dataset_hash(bars)))
    }
}
