//! Random calibration/validation partition

use crate::error::{RcpsError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Disjoint index sets covering `0..total`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSplit {
    pub calibration: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..total` and take the first `num_val` indices for calibration
pub fn random_split<R: Rng + ?Sized>(
    total: usize,
    num_val: usize,
    rng: &mut R,
) -> Result<CalibrationSplit> {
    if num_val > total {
        return Err(RcpsError::ConfigError(format!(
            "num_val ({}) exceeds dataset size ({})",
            num_val, total
        )));
    }

    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);
    let validation = indices.split_off(num_val);

    Ok(CalibrationSplit {
        calibration: indices,
        validation,
    })
}
