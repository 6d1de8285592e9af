//! Precomputed score datasets
//!
//! Datasets are JSON arrays of examples, written once after inference and
//! reloaded for every experiment.

mod synthetic;

pub use synthetic::{synthetic_multilabel, synthetic_segmentation, SyntheticConfig};

use crate::error::{RcpsError, Result};
use crate::validation::{MultiLabelExample, SegmentationExample};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

/// Read a JSON array of examples
pub fn load_examples<E: DeserializeOwned>(path: &Path) -> Result<Vec<E>> {
    let start = Instant::now();
    let file = File::open(path).map_err(|e| {
        RcpsError::DataError(format!("cannot open {}: {}", path.display(), e))
    })?;
    let examples: Vec<E> = serde_json::from_reader(BufReader::new(file))?;

    tracing::info!(
        path = %path.display(),
        examples = examples.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded precomputed dataset"
    );
    Ok(examples)
}

/// Write examples as a JSON array, creating parent directories
pub fn save_examples<E: Serialize>(path: &Path, examples: &[E]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, examples)?;

    tracing::info!(path = %path.display(), examples = examples.len(), "Saved dataset");
    Ok(())
}

/// Load and shape-check a multi-label dataset
pub fn load_multilabel(path: &Path) -> Result<Vec<MultiLabelExample>> {
    let examples: Vec<MultiLabelExample> = load_examples(path)?;
    for (i, example) in examples.iter().enumerate() {
        example
            .check()
            .map_err(|e| RcpsError::DataError(format!("example {}: {}", i, e)))?;
    }
    Ok(examples)
}

/// Load and shape-check a segmentation dataset
pub fn load_segmentation(path: &Path) -> Result<Vec<SegmentationExample>> {
    let examples: Vec<SegmentationExample> = load_examples(path)?;
    for (i, example) in examples.iter().enumerate() {
        example
            .check()
            .map_err(|e| RcpsError::DataError(format!("example {}: {}", i, e)))?;
    }
    Ok(examples)
}
