//! Repeated-trial experiments
//!
//! An experiment runs many seeded trials per (γ, δ) target, caches the
//! resulting table, and summarizes how often the realized risk stayed under
//! γ compared with the nominal `1 - δ`.

mod config;
mod stats;
mod storage;

pub use config::{ExperimentConfig, RiskTarget, RunSettings};
pub use stats::{Histogram, StatsSummary};
pub use storage::{write_csv, LocalStorage, StorageBackend};

use crate::calibration::ThresholdGrid;
use crate::error::{RcpsError, Result};
use crate::trial::{TrialResult, TrialRunner};
use crate::validation::ScoredExample;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// One row of the results table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub gamma: f64,
    pub delta: f64,
    pub precision: f64,
    pub recall: f64,
    pub size: f64,
    pub lambda_hat: f64,
    pub fallback: bool,
}

impl TrialRecord {
    pub fn new(target: RiskTarget, result: TrialResult) -> Self {
        Self {
            gamma: target.gamma,
            delta: target.delta,
            precision: result.precision,
            recall: result.recall,
            size: result.size,
            lambda_hat: result.lambda_hat,
            fallback: result.fallback,
        }
    }

    pub fn risk(&self) -> f64 {
        1.0 - self.recall
    }

    /// The trial's realized risk stayed within γ
    pub fn is_covered(&self) -> bool {
        self.risk() <= self.gamma
    }
}

/// Trial records of one target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    records: Vec<TrialRecord>,
    /// Absent in tables built by hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<RunSettings>,
}

impl ResultsTable {
    pub fn new(records: Vec<TrialRecord>) -> Self {
        Self {
            records,
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn settings(&self) -> Option<&RunSettings> {
        self.settings.as_ref()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    fn column(&self, f: impl Fn(&TrialRecord) -> f64) -> Vec<f64> {
        self.records.iter().map(f).collect()
    }

    pub fn recalls(&self) -> Vec<f64> {
        self.column(|r| r.recall)
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.column(|r| r.size)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let fallback: Vec<bool> = self.records.iter().map(|r| r.fallback).collect();
        let df = DataFrame::new(vec![
            Series::new("gamma".into(), self.column(|r| r.gamma)).into(),
            Series::new("delta".into(), self.column(|r| r.delta)).into(),
            Series::new("precision".into(), self.column(|r| r.precision)).into(),
            Series::new("recall".into(), self.recalls()).into(),
            Series::new("size".into(), self.sizes()).into(),
            Series::new("lambda_hat".into(), self.column(|r| r.lambda_hat)).into(),
            Series::new("fallback".into(), fallback).into(),
        ])?;
        Ok(df)
    }
}

/// Aggregate view of one target's trials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub target: RiskTarget,
    pub trials: usize,
    pub precision: StatsSummary,
    pub recall: StatsSummary,
    pub size: StatsSummary,
    pub lambda_hat: StatsSummary,
    /// Trials where no threshold met the bound
    pub fallbacks: usize,
    /// Fraction of trials with risk ≤ γ
    pub coverage: f64,
    /// `1 - δ`
    pub nominal_coverage: f64,
    pub recall_histogram: Histogram,
    pub size_histogram: Histogram,
    pub created_at: DateTime<Utc>,
}

impl ExperimentSummary {
    pub fn from_table(target: RiskTarget, table: &ResultsTable, bins: usize) -> Result<Self> {
        if table.is_empty() {
            return Err(RcpsError::ValidationError(format!(
                "no trials recorded for gamma={} delta={}",
                target.gamma, target.delta
            )));
        }

        let records = table.records();
        let covered = records.iter().filter(|r| r.is_covered()).count();
        let recalls = table.recalls();
        let sizes = table.sizes();

        Ok(Self {
            target,
            trials: records.len(),
            precision: StatsSummary::from_values(&table.column(|r| r.precision)),
            recall: StatsSummary::from_values(&recalls),
            size: StatsSummary::from_values(&sizes),
            lambda_hat: StatsSummary::from_values(&table.column(|r| r.lambda_hat)),
            fallbacks: records.iter().filter(|r| r.fallback).count(),
            coverage: covered as f64 / records.len() as f64,
            nominal_coverage: 1.0 - target.delta,
            recall_histogram: Histogram::from_values(&recalls, bins)?,
            size_histogram: Histogram::from_values(&sizes, bins)?,
            created_at: Utc::now(),
        })
    }

    /// Empirical coverage reached the nominal level
    pub fn meets_nominal(&self) -> bool {
        self.coverage >= self.nominal_coverage
    }
}

/// Runs every target of an [`ExperimentConfig`] against a precomputed dataset
pub struct ExperimentRunner {
    config: ExperimentConfig,
    storage: Box<dyn StorageBackend>,
    refresh: bool,
}

impl ExperimentRunner {
    /// Runner caching into `config.cache_dir`
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let storage = LocalStorage::new(config.cache_dir.clone());
        if !storage.is_available() {
            return Err(RcpsError::ConfigError(format!(
                "cache directory {} cannot be created",
                config.cache_dir.display()
            )));
        }
        Ok(Self {
            config,
            storage: Box::new(storage),
            refresh: false,
        })
    }

    /// Drop cached results and rerun every target
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Load the cached table of `target` or run its trials
    ///
    /// A cached table is reused only when it was produced with the current
    /// [`RunSettings`]; otherwise the trials rerun and overwrite it.
    pub fn results_for<E: ScoredExample>(
        &self,
        dataset: &[E],
        target: &RiskTarget,
    ) -> Result<ResultsTable> {
        let settings = self.config.run_settings();

        if self.refresh {
            self.storage.delete_results(target)?;
        } else if let Some(table) = self.storage.load_results(target)? {
            if table.settings() == Some(&settings) {
                info!(
                    gamma = target.gamma,
                    delta = target.delta,
                    trials = table.len(),
                    "Using cached results"
                );
                return Ok(table);
            }
            warn!(
                gamma = target.gamma,
                delta = target.delta,
                cached = ?table.settings(),
                configured = ?settings,
                "Cached results were produced with different settings, rerunning"
            );
        }

        let table = self.run_trials(dataset, target)?;
        self.storage.save_results(target, &table)?;
        Ok(table)
    }

    fn run_trials<E: ScoredExample>(
        &self,
        dataset: &[E],
        target: &RiskTarget,
    ) -> Result<ResultsTable> {
        let params = self.config.params_for(target)?;
        let grid = ThresholdGrid::new(self.config.domain, self.config.num_lam)?;
        let runner = TrialRunner::new(params, grid)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let start = Instant::now();
        let mut table = ResultsTable::default().with_settings(self.config.run_settings());
        for i in 0..self.config.num_trials {
            let result = runner.run_precomputed(dataset, &mut rng)?;
            table.push(TrialRecord::new(*target, result));
            tracing::debug!(trial = i, lambda_hat = result.lambda_hat, "Trial recorded");
        }

        info!(
            gamma = target.gamma,
            delta = target.delta,
            trials = table.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Trials complete"
        );
        Ok(table)
    }

    /// Run (or reload) one target and summarize it
    pub fn run_target<E: ScoredExample>(
        &self,
        dataset: &[E],
        target: &RiskTarget,
    ) -> Result<ExperimentSummary> {
        let table = self.results_for(dataset, target)?;
        let summary = ExperimentSummary::from_table(*target, &table, self.config.histogram_bins)?;

        if summary.meets_nominal() {
            info!(
                gamma = target.gamma,
                delta = target.delta,
                coverage = summary.coverage,
                mean_recall = summary.recall.mean,
                mean_size = summary.size.mean,
                "Target summarized"
            );
        } else {
            warn!(
                gamma = target.gamma,
                delta = target.delta,
                coverage = summary.coverage,
                nominal = summary.nominal_coverage,
                "Empirical coverage below nominal level"
            );
        }
        Ok(summary)
    }

    /// Run every configured target in order
    pub fn run_all<E: ScoredExample>(&self, dataset: &[E]) -> Result<Vec<ExperimentSummary>> {
        self.config
            .targets
            .iter()
            .map(|target| self.run_target(dataset, target))
            .collect()
    }
}
