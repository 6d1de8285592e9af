//! λ̂ selection
//!
//! For every grid threshold λ the validator yields the empirical risk
//! `R̂(λ) = 1 - recall`. The searched tolerance `R` gives the correction
//! `t(λ) = r_to_t(R)`, and λ is admissible when `R̂(λ) + t(λ) < γ`. The
//! selected threshold is the highest admissible λ. When nothing is admissible
//! the grid's lower end is returned and the selection is flagged as a
//! fallback.

use crate::calibration::bound::{BinomialTailBound, RiskBound};
use crate::calibration::config::CalibrationParameters;
use crate::calibration::grid::ThresholdGrid;
use crate::calibration::search::bisect;
use crate::error::{RcpsError, Result};
use crate::validation::{ScoredExample, ThresholdPredicate, Validator};
use serde::{Deserialize, Serialize};

/// Empirical risk and its correction at one grid threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectedRisk {
    pub lambda: f64,
    /// Empirical risk `1 - recall`
    pub rhat: f64,
    /// Searched risk tolerance
    pub r: f64,
    /// Correction `r_to_t(r)`
    pub t: f64,
}

impl CorrectedRisk {
    /// Combined bound `rhat + t`
    pub fn bound(&self) -> f64 {
        self.rhat + self.t
    }

    pub fn is_admissible(&self, gamma: f64) -> bool {
        self.bound() < gamma
    }
}

/// Outcome of a calibration sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected threshold λ̂
    pub lambda_hat: f64,
    /// Grid index of λ̂, `None` for the fallback
    pub index: Option<usize>,
    /// Per-threshold risks in grid order
    pub table: Vec<CorrectedRisk>,
}

impl Selection {
    /// True when no threshold met the bound and λ̂ is the conservative default
    pub fn is_fallback(&self) -> bool {
        self.index.is_none()
    }

    /// Number of admissible thresholds
    pub fn num_admissible(&self, gamma: f64) -> usize {
        self.table.iter().filter(|c| c.is_admissible(gamma)).count()
    }
}

/// Sweeps a threshold grid and picks λ̂
#[derive(Debug, Clone)]
pub struct LambdaSelector {
    params: CalibrationParameters,
    grid: ThresholdGrid,
    check_monotone: bool,
}

impl LambdaSelector {
    /// Create a selector; the parameters are validated here
    pub fn new(params: CalibrationParameters, grid: ThresholdGrid) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            grid,
            check_monotone: false,
        })
    }

    /// Warn when empirical risk decreases as λ grows
    pub fn with_monotonicity_check(mut self, enabled: bool) -> Self {
        self.check_monotone = enabled;
        self
    }

    pub fn params(&self) -> &CalibrationParameters {
        &self.params
    }

    pub fn grid(&self) -> &ThresholdGrid {
        &self.grid
    }

    /// Evaluate every grid threshold on `validator` and select λ̂
    pub fn select<V: Validator + ?Sized>(&self, validator: &V) -> Result<Selection> {
        let n_stop = self.params.num_val;
        let rhats = self
            .grid
            .iter()
            .map(|lambda| {
                let summary = validator.validate(&ThresholdPredicate::new(lambda), n_stop)?;
                tracing::debug!(
                    lambda,
                    precision = summary.precision,
                    recall = summary.recall,
                    size = summary.size,
                    examples = summary.examples,
                    "Validated threshold"
                );
                Ok(summary.risk())
            })
            .collect::<Result<Vec<f64>>>()?;

        self.select_from_risks(&rhats)
    }

    /// Select λ̂ from empirical risks already computed in grid order
    pub fn select_from_risks(&self, rhats: &[f64]) -> Result<Selection> {
        if rhats.len() != self.grid.len() {
            return Err(RcpsError::ValidationError(format!(
                "{} risks for a grid of {} thresholds",
                rhats.len(),
                self.grid.len()
            )));
        }

        if self.check_monotone {
            self.warn_if_non_monotone(rhats);
        }

        let bound = BinomialTailBound::try_from(&self.params)?;
        let CalibrationParameters { gamma, epsilon, .. } = self.params;

        let table = self
            .grid
            .iter()
            .zip(rhats)
            .map(|(lambda, &rhat)| {
                let r = bisect(rhat, gamma, epsilon, &bound)?.lower;
                let t = bound.correction(r)?;
                Ok(CorrectedRisk { lambda, rhat, r, t })
            })
            .collect::<Result<Vec<_>>>()?;

        let index = table.iter().rposition(|c| c.is_admissible(gamma));
        let lambda_hat = match index {
            Some(i) => table[i].lambda,
            None => self.grid.lower(),
        };

        match index {
            Some(i) => tracing::info!(
                lambda_hat,
                index = i,
                gamma,
                delta = self.params.delta,
                "Selected threshold"
            ),
            None => tracing::warn!(
                lambda_hat,
                gamma,
                delta = self.params.delta,
                "No threshold satisfies the risk bound, falling back to the grid minimum"
            ),
        }

        Ok(Selection {
            lambda_hat,
            index,
            table,
        })
    }

    fn warn_if_non_monotone(&self, rhats: &[f64]) {
        for (i, pair) in rhats.windows(2).enumerate() {
            if pair[1] < pair[0] {
                tracing::warn!(
                    lambda = self.grid.get(i + 1).unwrap_or(f64::NAN),
                    previous = pair[0],
                    current = pair[1],
                    "Empirical risk decreases as the threshold grows"
                );
            }
        }
    }
}

/// Select λ̂ over a `num_lam` grid on `[0, 1]`
///
/// Returns only the threshold; use [`LambdaSelector::select`] to also see
/// whether it is the fallback.
pub fn get_lamhat<V: Validator + ?Sized>(
    validator: &V,
    params: CalibrationParameters,
    num_lam: usize,
) -> Result<f64> {
    let selector = LambdaSelector::new(params, ThresholdGrid::unit(num_lam)?)?;
    Ok(selector.select(validator)?.lambda_hat)
}

/// Select λ̂ from examples whose scores were computed ahead of time
pub fn get_lamhat_precomputed<E: ScoredExample>(
    examples: &[E],
    params: CalibrationParameters,
    num_lam: usize,
) -> Result<f64> {
    get_lamhat(examples, params, num_lam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::bound::r_to_t;
    use crate::calibration::search::search_r;
    use crate::validation::MultiLabelExample;

    fn selector(gamma: f64, delta: f64, num_val: usize, num_lam: usize) -> LambdaSelector {
        let params = CalibrationParameters::new(gamma, delta, num_val, 0.01).unwrap();
        LambdaSelector::new(params, ThresholdGrid::unit(num_lam).unwrap()).unwrap()
    }

    #[test]
    fn test_picks_highest_admissible_threshold() {
        let selector = selector(0.2, 0.1, 100_000, 11);
        // risk grows with lambda; large sample keeps corrections tiny
        let rhats: Vec<f64> = (0..11).map(|i| i as f64 * 0.03).collect();
        let selection = selector.select_from_risks(&rhats).unwrap();

        let expected = selection
            .table
            .iter()
            .rposition(|c| c.bound() < 0.2)
            .unwrap();
        assert_eq!(selection.index, Some(expected));
        assert!(!selection.is_fallback());
        // rhat = 0.18 at index 6 is admissible, 0.21 at index 7 is not
        assert_eq!(expected, 6);
        assert!((selection.lambda_hat - 0.6).abs() < 1e-12);

        for c in &selection.table[expected + 1..] {
            assert!(!c.is_admissible(0.2));
        }
    }

    #[test]
    fn test_table_matches_search_and_bound() {
        let selector = selector(0.1, 0.1, 500, 5);
        let rhats = [0.0, 0.02, 0.05, 0.09, 0.3];
        let selection = selector.select_from_risks(&rhats).unwrap();

        for c in &selection.table {
            let r = search_r(c.rhat, 0.1, 0.1, 500, 0.01).unwrap();
            assert_eq!(c.r, r);
            assert_eq!(c.t, r_to_t(r, 0.1, 500).unwrap());
        }
    }

    #[test]
    fn test_fallback_when_gamma_tiny() {
        let selector = selector(1e-6, 0.1, 200, 10);
        let rhats = vec![0.01; 10];
        let selection = selector.select_from_risks(&rhats).unwrap();
        assert!(selection.is_fallback());
        assert_eq!(selection.lambda_hat, 0.0);
        assert_eq!(selection.num_admissible(1e-6), 0);
    }

    #[test]
    fn test_fallback_is_grid_minimum_for_segmentation() {
        let params = CalibrationParameters::new(1e-6, 0.1, 200, 0.01).unwrap();
        let selector =
            LambdaSelector::new(params, ThresholdGrid::segmentation(10).unwrap()).unwrap();
        let selection = selector.select_from_risks(&[0.5; 10]).unwrap();
        assert!(selection.is_fallback());
        assert_eq!(selection.lambda_hat, -1.0);
    }

    #[test]
    fn test_admissible_set_grows_with_gamma() {
        let rhats: Vec<f64> = (0..21).map(|i| i as f64 * 0.01).collect();
        let mut previous_lambda = f64::NEG_INFINITY;
        let mut previous_count = 0;
        for &gamma in &[0.02, 0.05, 0.1, 0.15, 0.2, 0.3] {
            let selection = selector(gamma, 0.1, 2000, 21)
                .select_from_risks(&rhats)
                .unwrap();
            assert!(selection.lambda_hat >= previous_lambda);
            assert!(selection.num_admissible(gamma) >= previous_count);
            previous_lambda = selection.lambda_hat;
            previous_count = selection.num_admissible(gamma);
        }
    }

    #[test]
    fn test_select_with_validator() {
        // positives scored 0.05, 0.15, ..., 0.95; negatives carry no risk
        let mut data: Vec<MultiLabelExample> = (0..10)
            .map(|i| MultiLabelExample::binary(0.05 + i as f64 * 0.1, true))
            .collect();
        data.extend((0..10).map(|_| MultiLabelExample::binary(0.99, false)));

        let params = CalibrationParameters::new(0.5, 0.1, 20, 0.01).unwrap();
        let selector = LambdaSelector::new(params, ThresholdGrid::unit(11).unwrap())
            .unwrap()
            .with_monotonicity_check(true);
        let selection = selector.select(data.as_slice()).unwrap();

        let rhats: Vec<f64> = selection.table.iter().map(|c| c.rhat).collect();
        assert!(rhats.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(rhats[0], 0.0);
        assert!((0.0..=1.0).contains(&selection.lambda_hat));

        let lamhat = get_lamhat(data.as_slice(), params, 11).unwrap();
        assert_eq!(lamhat, selection.lambda_hat);
        assert_eq!(get_lamhat_precomputed(&data, params, 11).unwrap(), lamhat);
    }

    #[test]
    fn test_rejects_mismatched_risks() {
        let selector = selector(0.1, 0.1, 100, 5);
        assert!(selector.select_from_risks(&[0.1, 0.2]).is_err());
    }
}
