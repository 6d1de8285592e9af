//! Multi-label classification examples

use crate::error::{RcpsError, Result};
use crate::validation::{ExampleOutcome, ScoredExample, ThresholdPredicate};
use serde::{Deserialize, Serialize};

/// Precomputed class scores and the ground-truth label set of one example
///
/// The prediction set for threshold λ is every class whose score exceeds λ;
/// its size is the number of classes in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelExample {
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
}

impl MultiLabelExample {
    pub fn new(scores: Vec<f64>, labels: Vec<bool>) -> Result<Self> {
        let example = Self { scores, labels };
        example.check()?;
        Ok(example)
    }

    /// Single-class example
    pub fn binary(score: f64, label: bool) -> Self {
        Self {
            scores: vec![score],
            labels: vec![label],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.scores.len()
    }

    pub fn num_positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Shape and finiteness check, also used on deserialized data
    pub fn check(&self) -> Result<()> {
        if self.scores.len() != self.labels.len() {
            return Err(RcpsError::DataError(format!(
                "{} scores but {} labels",
                self.scores.len(),
                self.labels.len()
            )));
        }
        if self.scores.iter().any(|s| !s.is_finite()) {
            return Err(RcpsError::DataError(
                "class scores must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl ScoredExample for MultiLabelExample {
    fn evaluate(&self, predicate: &ThresholdPredicate) -> Result<ExampleOutcome> {
        self.check()?;

        let mut hits = 0;
        let mut predicted = 0;
        for (&score, &label) in self.scores.iter().zip(&self.labels) {
            if predicate.accepts(score) {
                predicted += 1;
                if label {
                    hits += 1;
                }
            }
        }

        Ok(ExampleOutcome::from_counts(
            hits,
            predicted,
            self.num_positives(),
            predicted as f64,
        ))
    }
}
