//! Restartable iteration over bar files, one batch per file.
//!
//! Files are read lazily, in the order given, so consumers can fold over
//! many small files without concatenating them in memory.

use std::fs;
use std::path::{Path, PathBuf};

use super::{read_bars, DataError};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarFormat {
    Csv,
    Parquet,
}

impl BarFormat {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(BarFormat::Csv),
            Some("parquet") | Some("pq") => Ok(BarFormat::Parquet),
            _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarBatches {
    paths: Vec<PathBuf>,
    next: usize,
}

impl BarBatches {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, next: 0 }
    }

    /// All CSV and Parquet files directly under `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, DataError> {
        let entries = fs::read_dir(dir).map_err(|e| DataError::io(dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| DataError::io(dir, e))?.path();
            if path.is_file() && BarFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self::new(paths))
    }

    /// Rewind to the first file.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Iterator for BarBatches {
    type Item = Result<Vec<Bar>, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?;
        self.next += 1;
        Some(read_bars(path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.paths.len() - self.next;
        (left, Some(left))
    }
}
