//! Candidate threshold grid

use crate::calibration::config::ScoreDomain;
use crate::error::{RcpsError, Result};
use ndarray::Array1;

/// Evenly spaced, ascending candidate thresholds over a score domain
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdGrid {
    domain: ScoreDomain,
    values: Array1<f64>,
}

impl ThresholdGrid {
    /// Create a grid of `num_lam` thresholds covering `domain` end to end
    pub fn new(domain: ScoreDomain, num_lam: usize) -> Result<Self> {
        domain.validate()?;
        if num_lam == 0 {
            return Err(RcpsError::invalid_parameter(
                "num_lam",
                num_lam,
                "threshold grid needs at least one point",
            ));
        }

        let values = Array1::linspace(domain.lower, domain.upper, num_lam);
        Ok(Self { domain, values })
    }

    /// Grid over `[0, 1]`
    pub fn unit(num_lam: usize) -> Result<Self> {
        Self::new(ScoreDomain::unit(), num_lam)
    }

    /// Grid over `[-1, 0]`
    pub fn segmentation(num_lam: usize) -> Result<Self> {
        Self::new(ScoreDomain::segmentation(), num_lam)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn domain(&self) -> ScoreDomain {
        self.domain
    }

    /// Lowest threshold, used as the accept-everything fallback
    pub fn lower(&self) -> f64 {
        self.domain.lower
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_grid_endpoints() {
        let grid = ThresholdGrid::unit(11).unwrap();
        assert_eq!(grid.len(), 11);
        assert_eq!(grid.get(0), Some(0.0));
        assert!((grid.get(10).unwrap() - 1.0).abs() < 1e-12);
        assert!((grid.get(3).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_grid_is_ascending() {
        let grid = ThresholdGrid::segmentation(100).unwrap();
        let values: Vec<f64> = grid.iter().collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(grid.lower(), -1.0);
    }

    #[test]
    fn test_single_point_grid() {
        let grid = ThresholdGrid::unit(1).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.get(0), Some(0.0));
    }

    #[test]
    fn test_rejects_empty_grid() {
        assert!(ThresholdGrid::unit(0).is_err());
    }
}
