//! Validator collaborators
//!
//! A validator applies a threshold predicate to a dataset and reports the
//! per-example averages of precision, recall and prediction-set size.
//! The calibration core only consumes those three numbers.
//!
//! - [`MultiLabelExample`] - per-class scores with a label set
//! - [`SegmentationExample`] - per-pixel scores with a binary mask
//! - [`ModelValidator`] - runs a [`Scorer`] on raw inputs per evaluation

mod model;
mod multilabel;
mod segmentation;

pub use model::{precompute_scores, CorrespondenceTable, LabeledInput, ModelValidator, Scorer};
pub use multilabel::MultiLabelExample;
pub use segmentation::{
    filter_by_components, sweep_by_components, PixelOutcome, SegmentationExample, SweepFrame,
};

use crate::error::{RcpsError, Result};
use serde::{Deserialize, Serialize};

/// Label estimator `score > lambda`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPredicate {
    lambda: f64,
}

impl ThresholdPredicate {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    #[inline]
    pub fn accepts(&self, score: f64) -> bool {
        score > self.lambda
    }

    /// Binary prediction for every score
    pub fn estimate(&self, scores: &[f64]) -> Vec<bool> {
        scores.iter().map(|&s| self.accepts(s)).collect()
    }
}

/// Outcome of one example under a predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExampleOutcome {
    pub precision: f64,
    pub recall: f64,
    pub size: f64,
}

impl ExampleOutcome {
    /// Outcome from counts of true positives, predictions and positives
    ///
    /// No positives gives recall 1 and no predictions gives precision 1:
    /// nothing was missed, respectively nothing was wrongly flagged.
    pub fn from_counts(hits: usize, predicted: usize, positives: usize, size: f64) -> Self {
        let precision = if predicted == 0 {
            1.0
        } else {
            hits as f64 / predicted as f64
        };
        let recall = if positives == 0 {
            1.0
        } else {
            hits as f64 / positives as f64
        };
        Self {
            precision,
            recall,
            size,
        }
    }
}

/// Something that can be scored against a threshold predicate
pub trait ScoredExample {
    fn evaluate(&self, predicate: &ThresholdPredicate) -> Result<ExampleOutcome>;
}

impl<E: ScoredExample + ?Sized> ScoredExample for &E {
    fn evaluate(&self, predicate: &ThresholdPredicate) -> Result<ExampleOutcome> {
        (**self).evaluate(predicate)
    }
}

/// Running mean
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageMeter {
    sum: f64,
    count: usize,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the values seen so far, `None` before the first update
    pub fn avg(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Averaged precision, recall and set size over the processed examples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub precision: f64,
    pub recall: f64,
    pub size: f64,
    /// Number of examples processed
    pub examples: usize,
}

impl RiskSummary {
    /// Empirical risk `1 - recall`
    pub fn risk(&self) -> f64 {
        1.0 - self.recall
    }

    /// Average outcomes in order, stopping after `n_stop` examples
    pub fn accumulate<I>(outcomes: I, n_stop: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Result<ExampleOutcome>>,
    {
        let mut precision = AverageMeter::new();
        let mut recall = AverageMeter::new();
        let mut size = AverageMeter::new();

        for outcome in outcomes.into_iter().take(n_stop) {
            let outcome = outcome?;
            precision.update(outcome.precision);
            recall.update(outcome.recall);
            size.update(outcome.size);
        }

        let examples = recall.count();
        match (precision.avg(), recall.avg(), size.avg()) {
            (Some(precision), Some(recall), Some(size)) => Ok(Self {
                precision,
                recall,
                size,
                examples,
            }),
            _ => Err(RcpsError::ValidationError(
                "no examples to validate".to_string(),
            )),
        }
    }
}

/// Evaluates a threshold predicate over a dataset
pub trait Validator {
    /// Number of examples available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary over at most `n_stop` examples, in dataset order
    fn validate(&self, predicate: &ThresholdPredicate, n_stop: usize) -> Result<RiskSummary>;
}

impl<E: ScoredExample> Validator for [E] {
    fn len(&self) -> usize {
        <[E]>::len(self)
    }

    fn validate(&self, predicate: &ThresholdPredicate, n_stop: usize) -> Result<RiskSummary> {
        RiskSummary::accumulate(self.iter().map(|e| e.evaluate(predicate)), n_stop)
    }
}

/// Index view over a borrowed dataset
#[derive(Debug, Clone)]
pub struct Subset<'a, E> {
    data: &'a [E],
    indices: Vec<usize>,
}

impl<'a, E> Subset<'a, E> {
    /// Create a view; every index must be in bounds
    pub fn new(data: &'a [E], indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= data.len()) {
            return Err(RcpsError::DataError(format!(
                "subset index {} out of bounds for dataset of {} examples",
                bad,
                data.len()
            )));
        }
        Ok(Self { data, indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a E> + '_ {
        let data = self.data;
        self.indices.iter().map(move |&i| &data[i])
    }
}

impl<E: ScoredExample> Validator for Subset<'_, E> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn validate(&self, predicate: &ThresholdPredicate, n_stop: usize) -> Result<RiskSummary> {
        RiskSummary::accumulate(self.iter().map(|e| e.evaluate(predicate)), n_stop)
    }
}
