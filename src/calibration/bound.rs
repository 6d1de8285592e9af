//! Finite-sample risk bound
//!
//! The correction `t(R)` is the largest downward deviation, as a rate, that a
//! `Binomial(num_val, R)` count can show at confidence level `δ / e`:
//!
//! `t(R) = R - Q(δ/e; num_val, R) / num_val`

use crate::calibration::binomial::binomial_quantile;
use crate::calibration::config::CalibrationParameters;
use crate::error::{RcpsError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::E;

/// Correction term added to an empirical risk before comparing against γ
pub trait RiskBound {
    /// Correction for candidate risk tolerance `r` in `[0, 1]`
    fn correction(&self, r: f64) -> Result<f64>;
}

/// Inverse binomial tail bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinomialTailBound {
    delta: f64,
    num_val: usize,
}

impl BinomialTailBound {
    /// Create a bound for failure probability `delta` over `num_val` samples
    pub fn new(delta: f64, num_val: usize) -> Result<Self> {
        if !(delta.is_finite() && delta > 0.0 && delta < 1.0) {
            return Err(RcpsError::invalid_parameter(
                "delta",
                delta,
                "must lie in (0, 1)",
            ));
        }
        if num_val == 0 {
            return Err(RcpsError::invalid_parameter(
                "num_val",
                num_val,
                "calibration sample size must be at least 1",
            ));
        }
        Ok(Self { delta, num_val })
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn num_val(&self) -> usize {
        self.num_val
    }
}

impl TryFrom<&CalibrationParameters> for BinomialTailBound {
    type Error = RcpsError;

    fn try_from(params: &CalibrationParameters) -> Result<Self> {
        Self::new(params.delta, params.num_val)
    }
}

impl RiskBound for BinomialTailBound {
    fn correction(&self, r: f64) -> Result<f64> {
        if !(r.is_finite() && (0.0..=1.0).contains(&r)) {
            return Err(RcpsError::invalid_parameter(
                "R",
                r,
                "candidate risk must lie in [0, 1]",
            ));
        }

        let n = self.num_val as u64;
        let quantile = binomial_quantile(self.delta / E, n, r)?;
        Ok(r - quantile as f64 / self.num_val as f64)
    }
}

/// Correction term `t` for candidate risk `r`
pub fn r_to_t(r: f64, delta: f64, num_val: usize) -> Result<f64> {
    BinomialTailBound::new(delta, num_val)?.correction(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_risk_has_zero_correction() {
        for &delta in &[0.001, 0.01, 0.1, 0.9] {
            for &n in &[1usize, 10, 500, 4000] {
                assert_eq!(r_to_t(0.0, delta, n).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn test_unit_risk_has_nonnegative_correction() {
        for &delta in &[0.001, 0.01, 0.1, 0.9] {
            for &n in &[1usize, 10, 500, 4000] {
                let t = r_to_t(1.0, delta, n).unwrap();
                assert!(t >= 0.0);
            }
        }
    }

    #[test]
    fn test_bit_identical_on_repeat() {
        let a = r_to_t(0.37, 0.05, 1234).unwrap();
        let b = r_to_t(0.37, 0.05, 1234).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_correction_shrinks_with_sample_size() {
        let small = r_to_t(0.3, 0.1, 100).unwrap();
        let large = r_to_t(0.3, 0.1, 10_000).unwrap();
        assert!(small > large);
        assert!(large > 0.0);
    }

    #[test]
    fn test_known_value() {
        // Binomial(10, 0.5) at q = 0.1 / e ~ 0.0368: CDF(1) = 0.0107, CDF(2) = 0.0547
        let t = r_to_t(0.5, 0.1, 10).unwrap();
        assert!((t - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert!(r_to_t(1.2, 0.1, 10).is_err());
        assert!(r_to_t(-0.1, 0.1, 10).is_err());
        assert!(r_to_t(0.5, 0.0, 10).is_err());
        assert!(r_to_t(0.5, 0.1, 0).is_err());
    }

    #[test]
    fn test_try_from_parameters() {
        let params = CalibrationParameters::new(0.1, 0.05, 300, 0.01).unwrap();
        let bound = BinomialTailBound::try_from(&params).unwrap();
        assert_eq!(bound.num_val(), 300);
        assert_eq!(bound.delta(), 0.05);
    }
}
