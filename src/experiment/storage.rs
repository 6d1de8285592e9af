//! Result storage for experiments
//!
//! Each (γ, δ) target gets a JSON cache of its trial records, reloaded on
//! the next run instead of repeating the trials, and a CSV export of the
//! same table.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use super::config::RiskTarget;
use super::ResultsTable;
use crate::error::{RcpsError, Result};

/// Storage backend trait
pub trait StorageBackend {
    /// Persist the results of one target
    fn save_results(&self, target: &RiskTarget, table: &ResultsTable) -> Result<()>;

    /// Load cached results of one target, `None` when nothing is cached
    fn load_results(&self, target: &RiskTarget) -> Result<Option<ResultsTable>>;

    /// Drop the cached results of one target
    fn delete_results(&self, target: &RiskTarget) -> Result<()>;

    /// Check if storage is available
    fn is_available(&self) -> bool;
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn results_file(&self, target: &RiskTarget) -> PathBuf {
        self.base_dir
            .join(format!("{}_results.json", target.file_stem()))
    }

    pub fn csv_file(&self, target: &RiskTarget) -> PathBuf {
        self.base_dir
            .join(format!("{}_results.csv", target.file_stem()))
    }
}

impl StorageBackend for LocalStorage {
    fn save_results(&self, target: &RiskTarget, table: &ResultsTable) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;

        let writer = BufWriter::new(File::create(self.results_file(target))?);
        serde_json::to_writer_pretty(writer, table)?;

        write_csv(&self.csv_file(target), table)?;

        tracing::info!(
            gamma = target.gamma,
            delta = target.delta,
            trials = table.len(),
            dir = %self.base_dir.display(),
            "Cached experiment results"
        );
        Ok(())
    }

    fn load_results(&self, target: &RiskTarget) -> Result<Option<ResultsTable>> {
        let path = self.results_file(target);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let table: ResultsTable = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            RcpsError::SerializationError(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(table))
    }

    fn delete_results(&self, target: &RiskTarget) -> Result<()> {
        for path in [self.results_file(target), self.csv_file(target)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.base_dir).is_ok()
    }
}

/// Write the results table as CSV
pub fn write_csv(path: &Path, table: &ResultsTable) -> Result<()> {
    let mut df = table.to_dataframe()?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::TrialRecord;
    use crate::trial::TrialResult;

    fn table(target: RiskTarget) -> ResultsTable {
        let records = (0..4)
            .map(|i| {
                TrialRecord::new(
                    target,
                    TrialResult {
                        precision: 0.5,
                        recall: 0.9 + i as f64 * 0.01,
                        size: 0.4,
                        lambda_hat: 0.3,
                        fallback: i == 0,
                    },
                )
            })
            .collect();
        ResultsTable::new(records)
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("cache"));
        let target = RiskTarget::new(0.1, 0.1);

        assert!(storage.load_results(&target).unwrap().is_none());
        storage.save_results(&target, &table(target)).unwrap();

        let loaded = storage.load_results(&target).unwrap().unwrap();
        assert_eq!(loaded, table(target));
        assert!(storage.results_file(&target).ends_with("0.1_0.1_results.json"));
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let target = RiskTarget::new(0.01, 0.01);
        storage.save_results(&target, &table(target)).unwrap();

        let csv = fs::read_to_string(storage.csv_file(&target)).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("lambda_hat"));
        assert!(header.contains("recall"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn test_delete_results() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let target = RiskTarget::new(0.1, 0.01);
        storage.save_results(&target, &table(target)).unwrap();
        storage.delete_results(&target).unwrap();
        assert!(storage.load_results(&target).unwrap().is_none());
        assert!(storage.is_available());
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let target = RiskTarget::new(0.1, 0.1);
        fs::write(storage.results_file(&target), "not json").unwrap();
        assert!(matches!(
            storage.load_results(&target),
            Err(RcpsError::SerializationError(_))
        ));
    }
}
