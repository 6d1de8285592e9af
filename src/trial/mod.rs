//! Calibration trials
//!
//! One trial splits the data at random, selects λ̂ on the calibration part
//! and measures precision, recall and set size on the held-out part.

mod split;

pub use split::{random_split, CalibrationSplit};

use crate::calibration::{CalibrationParameters, LambdaSelector, Selection, ThresholdGrid};
use crate::error::{RcpsError, Result};
use crate::validation::{
    CorrespondenceTable, LabeledInput, ModelValidator, RiskSummary, ScoredExample, Scorer,
    Subset, ThresholdPredicate, Validator,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result tuple of one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub precision: f64,
    pub recall: f64,
    pub size: f64,
    pub lambda_hat: f64,
    /// λ̂ is the fallback because no threshold met the bound
    pub fallback: bool,
}

impl TrialResult {
    fn new(summary: RiskSummary, selection: &Selection) -> Self {
        Self {
            precision: summary.precision,
            recall: summary.recall,
            size: summary.size,
            lambda_hat: selection.lambda_hat,
            fallback: selection.is_fallback(),
        }
    }

    /// Realized validation risk `1 - recall`
    pub fn risk(&self) -> f64 {
        1.0 - self.recall
    }
}

/// Runs randomized calibration/validation trials
#[derive(Debug, Clone)]
pub struct TrialRunner {
    selector: LambdaSelector,
}

impl TrialRunner {
    pub fn new(params: CalibrationParameters, grid: ThresholdGrid) -> Result<Self> {
        Ok(Self {
            selector: LambdaSelector::new(params, grid)?,
        })
    }

    pub fn from_selector(selector: LambdaSelector) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &LambdaSelector {
        &self.selector
    }

    /// Trial on precomputed examples
    pub fn run_precomputed<E, R>(&self, dataset: &[E], rng: &mut R) -> Result<TrialResult>
    where
        E: ScoredExample,
        R: Rng + ?Sized,
    {
        let split = self.split(dataset.len(), rng)?;
        let calibration = Subset::new(dataset, split.calibration)?;
        let validation = Subset::new(dataset, split.validation)?;
        self.calibrate_and_validate(&calibration, &validation)
    }

    /// Trial running inference through `scorer` on every evaluation
    pub fn run_with_model<S, R>(
        &self,
        inputs: &[LabeledInput<S::Input>],
        scorer: &S,
        corr: &CorrespondenceTable,
        rng: &mut R,
    ) -> Result<TrialResult>
    where
        S: Scorer,
        R: Rng + ?Sized,
    {
        let split = self.split(inputs.len(), rng)?;
        let calibration =
            ModelValidator::new(scorer, corr, inputs).with_indices(split.calibration)?;
        let validation =
            ModelValidator::new(scorer, corr, inputs).with_indices(split.validation)?;
        self.calibrate_and_validate(&calibration, &validation)
    }

    fn split<R: Rng + ?Sized>(&self, total: usize, rng: &mut R) -> Result<CalibrationSplit> {
        let split = random_split(total, self.selector.params().num_val, rng)?;
        if split.validation.is_empty() {
            return Err(RcpsError::ValidationError(format!(
                "no validation examples left after taking {} for calibration",
                split.calibration.len()
            )));
        }
        Ok(split)
    }

    fn calibrate_and_validate<C, V>(&self, calibration: &C, validation: &V) -> Result<TrialResult>
    where
        C: Validator + ?Sized,
        V: Validator + ?Sized,
    {
        let selection = self.selector.select(calibration)?;
        let summary = validation.validate(
            &ThresholdPredicate::new(selection.lambda_hat),
            usize::MAX,
        )?;

        let result = TrialResult::new(summary, &selection);
        tracing::debug!(
            lambda_hat = result.lambda_hat,
            precision = result.precision,
            recall = result.recall,
            size = result.size,
            fallback = result.fallback,
            "Trial finished"
        );
        Ok(result)
    }
}

/// One trial on precomputed examples over a `num_lam` grid on `[0, 1]`
pub fn trial_precomputed<E, R>(
    dataset: &[E],
    params: CalibrationParameters,
    num_lam: usize,
    rng: &mut R,
) -> Result<TrialResult>
where
    E: ScoredExample,
    R: Rng + ?Sized,
{
    TrialRunner::new(params, ThresholdGrid::unit(num_lam)?)?.run_precomputed(dataset, rng)
}

/// One model-backed trial over a `num_lam` grid on `[0, 1]`
pub fn trial<S, R>(
    inputs: &[LabeledInput<S::Input>],
    scorer: &S,
    corr: &CorrespondenceTable,
    params: CalibrationParameters,
    num_lam: usize,
    rng: &mut R,
) -> Result<TrialResult>
where
    S: Scorer,
    R: Rng + ?Sized,
{
    TrialRunner::new(params, ThresholdGrid::unit(num_lam)?)?.run_with_model(inputs, scorer, corr, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MultiLabelExample;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Identity;

    impl Scorer for Identity {
        type Input = f64;

        fn score(&self, input: &f64) -> Result<Vec<f64>> {
            Ok(vec![*input])
        }
    }

    fn binary_dataset(n: usize) -> Vec<MultiLabelExample> {
        (0..n)
            .map(|i| MultiLabelExample::binary((i as f64 + 0.5) / n as f64, i % 2 == 0))
            .collect()
    }

    #[test]
    fn test_trial_precomputed_returns_valid_tuple() {
        let data = binary_dataset(400);
        let params = CalibrationParameters::new(0.2, 0.1, 200, 0.01).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let result = trial_precomputed(&data, params, 20, &mut rng).unwrap();
        assert!((0.0..=1.0).contains(&result.lambda_hat));
        assert!((0.0..=1.0).contains(&result.recall));
        assert!((0.0..=1.0).contains(&result.precision));
        assert!(result.size >= 0.0 && result.size <= 1.0);
    }

    #[test]
    fn test_trials_differ_across_splits() {
        let data = binary_dataset(300);
        let params = CalibrationParameters::new(0.3, 0.1, 100, 0.01).unwrap();
        let runner = TrialRunner::new(params, ThresholdGrid::unit(30).unwrap()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let results: Vec<TrialResult> = (0..5)
            .map(|_| runner.run_precomputed(&data, &mut rng).unwrap())
            .collect();
        assert!(results.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_model_trial_matches_precomputed_trial() {
        let scores: Vec<f64> = (0..200).map(|i| (i as f64 * 0.37) % 1.0).collect();
        let inputs: Vec<LabeledInput<f64>> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| LabeledInput::new(s, vec![i % 3 != 0]))
            .collect();
        let precomputed: Vec<MultiLabelExample> = inputs
            .iter()
            .map(|item| MultiLabelExample::binary(item.input, item.labels[0]))
            .collect();

        let params = CalibrationParameters::new(0.25, 0.1, 100, 0.01).unwrap();
        let corr = CorrespondenceTable::identity(1);

        let live = trial(&inputs, &Identity, &corr, params, 25, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let cached =
            trial_precomputed(&precomputed, params, 25, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(live, cached);
    }

    #[test]
    fn test_empty_validation_split_rejected() {
        let data = binary_dataset(50);
        let params = CalibrationParameters::new(0.1, 0.1, 50, 0.01).unwrap();
        let err = trial_precomputed(&data, params, 10, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, RcpsError::ValidationError(_)));

        let params = params.with_num_val(51);
        let err = trial_precomputed(&data, params, 10, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, RcpsError::ConfigError(_)));
    }

    #[test]
    fn test_fallback_flag_propagates() {
        let data = binary_dataset(100);
        let params = CalibrationParameters::new(1e-4, 0.1, 50, 0.01).unwrap();
        let result =
            trial_precomputed(&data, params, 10, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert!(result.fallback);
        assert_eq!(result.lambda_hat, 0.0);
    }
}
