//! Experiment configuration

use crate::calibration::{CalibrationParameters, ScoreDomain};
use crate::error::{RcpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One (γ, δ) pair an experiment calibrates for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskTarget {
    pub gamma: f64,
    pub delta: f64,
}

impl RiskTarget {
    pub fn new(gamma: f64, delta: f64) -> Self {
        Self { gamma, delta }
    }

    /// Stem of the cache files for this target
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.gamma, self.delta)
    }
}

/// Settings a cached results table was produced with
///
/// A cache entry is only reused when these match the current run; the
/// file name carries the target alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub num_lam: usize,
    pub num_val: usize,
    pub epsilon: f64,
    pub num_trials: usize,
    pub seed: u64,
    pub domain: ScoreDomain,
}

/// Configuration of a repeated-trial experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub targets: Vec<RiskTarget>,

    /// Number of thresholds in the grid
    pub num_lam: usize,

    /// Calibration sample size per trial
    pub num_val: usize,

    pub epsilon: f64,

    pub num_trials: usize,

    /// Seed of the trial RNG; each target restarts from it
    pub seed: u64,

    pub domain: ScoreDomain,

    /// Where per-target results are cached
    pub cache_dir: PathBuf,

    /// Number of bins of the recall and size histograms
    pub histogram_bins: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            targets: [0.001, 0.01, 0.1]
                .iter()
                .map(|&v| RiskTarget::new(v, v))
                .collect(),
            num_lam: 100,
            num_val: 4000,
            epsilon: 0.01,
            num_trials: 100,
            seed: 0,
            domain: ScoreDomain::unit(),
            cache_dir: PathBuf::from(".cache"),
            histogram_bins: 20,
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON config; omitted fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RcpsError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| RcpsError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_targets(mut self, targets: Vec<RiskTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_num_lam(mut self, num_lam: usize) -> Self {
        self.num_lam = num_lam;
        self
    }

    pub fn with_num_val(mut self, num_val: usize) -> Self {
        self.num_val = num_val;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_num_trials(mut self, num_trials: usize) -> Self {
        self.num_trials = num_trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_domain(mut self, domain: ScoreDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins;
        self
    }

    /// Settings recorded alongside cached results
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            num_lam: self.num_lam,
            num_val: self.num_val,
            epsilon: self.epsilon,
            num_trials: self.num_trials,
            seed: self.seed,
            domain: self.domain,
        }
    }

    /// Calibration parameters for one target
    pub fn params_for(&self, target: &RiskTarget) -> Result<CalibrationParameters> {
        CalibrationParameters::new(target.gamma, target.delta, self.num_val, self.epsilon)
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(RcpsError::ConfigError(
                "experiment needs at least one (gamma, delta) target".to_string(),
            ));
        }
        for target in &self.targets {
            self.params_for(target)?;
        }
        if self.num_lam == 0 {
            return Err(RcpsError::invalid_parameter(
                "num_lam",
                self.num_lam,
                "threshold grid needs at least one point",
            ));
        }
        if self.num_trials == 0 {
            return Err(RcpsError::invalid_parameter(
                "num_trials",
                self.num_trials,
                "must be at least 1",
            ));
        }
        self.domain.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_driver() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        let gammas: Vec<f64> = config.targets.iter().map(|t| t.gamma).collect();
        assert_eq!(gammas, vec![0.001, 0.01, 0.1]);
        assert!(config.targets.iter().all(|t| t.gamma == t.delta));
        assert_eq!(config.num_lam, 100);
        assert_eq!(config.num_val, 4000);
        assert_eq!(config.num_trials, 100);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(RiskTarget::new(0.1, 0.01).file_stem(), "0.1_0.01");
    }

    #[test]
    fn test_run_settings_track_domain_and_sizes() {
        let base = ExperimentConfig::default();
        assert_eq!(base.run_settings(), base.clone().with_histogram_bins(5).run_settings());
        assert_ne!(base.run_settings(), base.clone().with_num_lam(50).run_settings());
        assert_ne!(base.run_settings(), base.clone().with_num_val(100).run_settings());
        assert_ne!(
            base.run_settings(),
            base.clone().with_domain(ScoreDomain::segmentation()).run_settings()
        );
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        std::fs::write(
            &path,
            r#"{"targets": [{"gamma": 0.2, "delta": 0.05}], "num_trials": 7}"#,
        )
        .unwrap();

        let config = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(config.targets, vec![RiskTarget::new(0.2, 0.05)]);
        assert_eq!(config.num_trials, 7);
        assert_eq!(config.num_lam, 100);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"targets": [{"gamma": 1.5, "delta": 0.1}]}"#).unwrap();
        assert!(ExperimentConfig::from_file(&path).is_err());

        assert!(matches!(
            ExperimentConfig::from_file(&dir.path().join("missing.json")),
            Err(RcpsError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_targets() {
        let config = ExperimentConfig::default().with_targets(Vec::new());
        assert!(config.validate().is_err());
        assert!(ExperimentConfig::default().with_num_lam(0).validate().is_err());
    }
}
