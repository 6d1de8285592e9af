//! Summary statistics and histogram data for trial results

use crate::error::{RcpsError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Statistics summary of one column of the results table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Number of observations
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl StatsSummary {
    /// Create a summary from a slice of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let column = Array1::from_vec(values.to_vec());
        let mean = column.mean().unwrap_or(0.0);
        let std_dev = column.std(0.0);
        let min = column.iter().copied().fold(f64::INFINITY, f64::min);
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count: values.len(),
            min,
            max,
            mean,
            std_dev,
        }
    }
}

/// Histogram data (bins are left-closed, the last bin is closed on both ends)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges, `n_bins + 1` values
    pub bin_edges: Vec<f64>,
    /// Number of values in each bin
    pub bin_counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` evenly over their observed range
    ///
    /// A constant column gets a single-width range centered on the value.
    pub fn from_values(values: &[f64], n_bins: usize) -> Result<Self> {
        if values.is_empty() {
            return Err(RcpsError::ValidationError(
                "cannot build a histogram of no values".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RcpsError::ValidationError(
                "histogram values must be finite".to_string(),
            ));
        }

        let n_bins = n_bins.max(1);
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
        let bin_width = (hi - lo) / n_bins as f64;

        let bin_edges: Vec<f64> = (0..=n_bins).map(|i| lo + i as f64 * bin_width).collect();

        let mut bin_counts = vec![0usize; n_bins];
        for &v in values {
            let bin_idx = (((v - lo) / bin_width) as usize).min(n_bins - 1);
            bin_counts[bin_idx] += 1;
        }

        Ok(Self {
            bin_edges,
            bin_counts,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.bin_counts.len()
    }

    pub fn total(&self) -> usize {
        self.bin_counts.iter().sum()
    }
}
