//! Model-backed validation
//!
//! Inference itself is external: anything implementing [`Scorer`] can be
//! calibrated. Model outputs are reordered into dataset class order with a
//! [`CorrespondenceTable`] before thresholding.

use crate::error::{RcpsError, Result};
use crate::validation::{
    MultiLabelExample, RiskSummary, ScoredExample, ThresholdPredicate, Validator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Produces per-class confidence scores for one input
pub trait Scorer {
    type Input;

    fn score(&self, input: &Self::Input) -> Result<Vec<f64>>;
}

/// Raw input with its ground-truth label set (in dataset class order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledInput<I> {
    pub input: I,
    pub labels: Vec<bool>,
}

impl<I> LabeledInput<I> {
    pub fn new(input: I, labels: Vec<bool>) -> Self {
        Self { input, labels }
    }
}

/// Maps dataset class `i` to model output `model_index[i]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondenceTable {
    model_index: Vec<usize>,
    num_model_outputs: usize,
}

impl CorrespondenceTable {
    /// Model and dataset share the same class order
    pub fn identity(num_classes: usize) -> Self {
        Self {
            model_index: (0..num_classes).collect(),
            num_model_outputs: num_classes,
        }
    }

    /// Match classes by name; every dataset class must exist in the model
    pub fn from_names<M, D>(model_classes: &[M], dataset_classes: &[D]) -> Result<Self>
    where
        M: AsRef<str>,
        D: AsRef<str>,
    {
        let lookup: HashMap<&str, usize> = model_classes
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref(), i))
            .collect();

        let model_index = dataset_classes
            .iter()
            .map(|name| {
                lookup.get(name.as_ref()).copied().ok_or_else(|| {
                    RcpsError::ConfigError(format!(
                        "dataset class '{}' has no model output",
                        name.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            model_index,
            num_model_outputs: model_classes.len(),
        })
    }

    pub fn num_classes(&self) -> usize {
        self.model_index.len()
    }

    /// Model scores in dataset class order
    pub fn reorder(&self, model_scores: &[f64]) -> Result<Vec<f64>> {
        if model_scores.len() != self.num_model_outputs {
            return Err(RcpsError::DataError(format!(
                "model produced {} scores, correspondence table expects {}",
                model_scores.len(),
                self.num_model_outputs
            )));
        }
        Ok(self.model_index.iter().map(|&i| model_scores[i]).collect())
    }
}

fn score_example<S: Scorer>(
    scorer: &S,
    corr: &CorrespondenceTable,
    item: &LabeledInput<S::Input>,
) -> Result<MultiLabelExample> {
    let scores = corr.reorder(&scorer.score(&item.input)?)?;
    MultiLabelExample::new(scores, item.labels.clone())
}

/// Validator that runs inference on every evaluation
///
/// Each call re-scores the inputs, so calibrating over a grid of `num_lam`
/// thresholds costs `num_lam` inference passes. Use [`precompute_scores`] to
/// pay that once.
pub struct ModelValidator<'a, S: Scorer> {
    scorer: &'a S,
    corr: &'a CorrespondenceTable,
    inputs: &'a [LabeledInput<S::Input>],
    indices: Vec<usize>,
}

impl<'a, S: Scorer> ModelValidator<'a, S> {
    /// Validator over every input
    pub fn new(
        scorer: &'a S,
        corr: &'a CorrespondenceTable,
        inputs: &'a [LabeledInput<S::Input>],
    ) -> Self {
        Self {
            scorer,
            corr,
            inputs,
            indices: (0..inputs.len()).collect(),
        }
    }

    /// Restrict to `indices` of the inputs
    pub fn with_indices(mut self, indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.inputs.len()) {
            return Err(RcpsError::DataError(format!(
                "input index {} out of bounds for {} inputs",
                bad,
                self.inputs.len()
            )));
        }
        self.indices = indices;
        Ok(self)
    }
}

impl<S: Scorer> Validator for ModelValidator<'_, S> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn validate(&self, predicate: &ThresholdPredicate, n_stop: usize) -> Result<RiskSummary> {
        let outcomes = self.indices.iter().map(|&i| {
            score_example(self.scorer, self.corr, &self.inputs[i])?.evaluate(predicate)
        });
        RiskSummary::accumulate(outcomes, n_stop)
    }
}

/// Score every input once and keep the results as precomputed examples
pub fn precompute_scores<S: Scorer>(
    scorer: &S,
    inputs: &[LabeledInput<S::Input>],
    corr: &CorrespondenceTable,
) -> Result<Vec<MultiLabelExample>> {
    let examples = inputs
        .iter()
        .map(|item| score_example(scorer, corr, item))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(examples = examples.len(), "Precomputed scores");
    Ok(examples)
}
