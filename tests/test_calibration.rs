//! Integration tests for threshold calibration: selection, trials and coverage

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rcps::calibration::{
    get_lamhat, get_lamhat_precomputed, r_to_t, search_r, CalibrationParameters, LambdaSelector,
    ThresholdGrid,
};
use rcps::data::{synthetic_multilabel, synthetic_segmentation, SyntheticConfig};
use rcps::trial::{trial, trial_precomputed, TrialRunner};
use rcps::validation::{
    precompute_scores, CorrespondenceTable, LabeledInput, MultiLabelExample, Scorer,
    SegmentationExample, Subset, Validator,
};

fn uniform_binary(n: usize, seed: u64) -> Vec<MultiLabelExample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let config = SyntheticConfig::default().with_n_examples(n);
    synthetic_multilabel(&config, &mut rng).unwrap()
}

// ============================================================================
// End-to-end coverage
// ============================================================================

#[test]
fn test_uniform_scores_reach_nominal_coverage() {
    let data = uniform_binary(1000, 0);
    let params = CalibrationParameters::new(0.1, 0.1, 500, 0.01).unwrap();
    let runner = TrialRunner::new(params, ThresholdGrid::unit(50).unwrap()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let results: Vec<_> = (0..100)
        .map(|_| runner.run_precomputed(&data, &mut rng).unwrap())
        .collect();

    for result in &results {
        assert!((0.0..=1.0).contains(&result.lambda_hat));
    }

    let covered = results.iter().filter(|r| r.risk() <= params.gamma).count();
    // 1 - δ = 0.9, with slack for sampling noise
    assert!(covered as f64 / results.len() as f64 >= 0.8, "coverage {}", covered);
}

#[test]
fn test_selected_threshold_is_not_trivial_on_uniform_scores() {
    let data = uniform_binary(1000, 1);
    let params = CalibrationParameters::new(0.1, 0.1, 500, 0.01).unwrap();
    let lambda_hat = get_lamhat_precomputed(&data[..500], params, 50).unwrap();

    // Half the examples are negative, so the risk at λ is about λ / 2
    assert!(lambda_hat > 0.0);
    assert!(lambda_hat < 2.0 * params.gamma);
}

// ============================================================================
// Degenerate calibration
// ============================================================================

#[test]
fn test_unreachable_target_falls_back() {
    // Positives score below every grid point above zero
    let data: Vec<MultiLabelExample> = (0..200)
        .map(|i| MultiLabelExample::binary(if i % 2 == 0 { 0.0 } else { 0.5 }, i % 2 == 0))
        .collect();
    let params = CalibrationParameters::new(0.05, 0.1, 200, 0.01).unwrap();
    let selector = LambdaSelector::new(params, ThresholdGrid::unit(10).unwrap()).unwrap();

    let selection = selector.select(data.as_slice()).unwrap();
    assert!(selection.is_fallback());
    assert_eq!(selection.lambda_hat, 0.0);
    assert_eq!(selection.num_admissible(params.gamma), 0);
}

#[test]
fn test_search_and_correction_agree() {
    let r = search_r(0.02, 0.1, 0.1, 500, 0.01).unwrap();
    let t = r_to_t(r, 0.1, 500).unwrap();
    assert!(r >= 0.0 && r <= 1.0);
    assert!(t >= 0.0);
    assert_eq!(r_to_t(0.0, 0.1, 500).unwrap(), 0.0);
}

// ============================================================================
// Model-backed path
// ============================================================================

struct Thresholded;

impl Scorer for Thresholded {
    type Input = f64;

    fn score(&self, input: &f64) -> rcps::Result<Vec<f64>> {
        Ok(vec![*input, 1.0 - *input])
    }
}

#[test]
fn test_model_path_matches_precomputed_path() {
    let inputs: Vec<LabeledInput<f64>> = (0..300)
        .map(|i| {
            let x = ((i * 61) % 300) as f64 / 300.0;
            LabeledInput::new(x, vec![x > 0.3, x < 0.5])
        })
        .collect();
    let corr = CorrespondenceTable::identity(2);
    let params = CalibrationParameters::new(0.2, 0.1, 100, 0.01).unwrap();

    let precomputed = precompute_scores(&Thresholded, &inputs, &corr).unwrap();

    let live = trial(&inputs, &Thresholded, &corr, params, 20, &mut ChaCha8Rng::seed_from_u64(4))
        .unwrap();
    let cached =
        trial_precomputed(&precomputed, params, 20, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
    assert_eq!(live, cached);
}

#[test]
fn test_get_lamhat_on_subset() {
    let data = uniform_binary(600, 2);
    let subset = Subset::new(&data, (0..300).collect()).unwrap();
    assert_eq!(subset.len(), 300);

    let params = CalibrationParameters::new(0.15, 0.1, 300, 0.01).unwrap();
    let lambda_hat = get_lamhat(&subset, params, 30).unwrap();
    assert_eq!(lambda_hat, get_lamhat_precomputed(&data[..300], params, 30).unwrap());
}

// ============================================================================
// Segmentation
// ============================================================================

#[test]
fn test_segmentation_trial_stays_in_domain() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let data: Vec<SegmentationExample> = synthetic_segmentation(120, 16, 8, &mut rng).unwrap();
    let params = CalibrationParameters::new(0.2, 0.1, 60, 0.01).unwrap();
    let runner = TrialRunner::new(params, ThresholdGrid::segmentation(20).unwrap()).unwrap();

    let result = runner.run_precomputed(&data, &mut rng).unwrap();
    assert!((-1.0..=0.0).contains(&result.lambda_hat));
    assert!(result.size > 0.0 && result.size <= 1.0);
    assert!(!result.fallback);
}
