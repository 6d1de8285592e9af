//! Segmentation examples
//!
//! Score maps live in the segmentation domain `[-1, 0]`: a sigmoid output `p`
//! is stored as `p - 1`, so larger is still more confident and the usual
//! `score > λ` predicate applies. λ = -1 flags every pixel with non-zero
//! probability, λ = 0 flags nothing.

use crate::calibration::ThresholdGrid;
use crate::error::{RcpsError, Result};
use crate::validation::{ExampleOutcome, RiskSummary, ScoredExample, ThresholdPredicate, Validator};
use serde::{Deserialize, Serialize};

/// Per-pixel score map with its ground-truth mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationExample {
    pub width: usize,
    pub height: usize,
    /// Row-major scores in `[-1, 0]`
    pub scores: Vec<f64>,
    /// Row-major ground-truth mask
    pub mask: Vec<bool>,
    /// Number of connected components in the mask
    pub num_components: usize,
    /// Source image, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl SegmentationExample {
    pub fn new(
        width: usize,
        height: usize,
        scores: Vec<f64>,
        mask: Vec<bool>,
        num_components: usize,
    ) -> Result<Self> {
        let example = Self {
            width,
            height,
            scores,
            mask,
            num_components,
            image: None,
        };
        example.check()?;
        Ok(example)
    }

    /// Build from a sigmoid probability map in `[0, 1]`
    pub fn from_probabilities(
        width: usize,
        height: usize,
        probabilities: &[f64],
        mask: Vec<bool>,
        num_components: usize,
    ) -> Result<Self> {
        if let Some(p) = probabilities
            .iter()
            .find(|p| !(p.is_finite() && (0.0..=1.0).contains(*p)))
        {
            return Err(RcpsError::DataError(format!(
                "pixel probability {} outside [0, 1]",
                p
            )));
        }
        let scores = probabilities.iter().map(|p| p - 1.0).collect();
        Self::new(width, height, scores, mask, num_components)
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }

    pub fn check(&self) -> Result<()> {
        let n = self.num_pixels();
        if n == 0 {
            return Err(RcpsError::DataError("empty score map".to_string()));
        }
        if self.scores.len() != n || self.mask.len() != n {
            return Err(RcpsError::DataError(format!(
                "{}x{} map expects {} pixels, got {} scores and {} mask entries",
                self.width,
                self.height,
                n,
                self.scores.len(),
                self.mask.len()
            )));
        }
        if self.scores.iter().any(|s| !s.is_finite()) {
            return Err(RcpsError::DataError(
                "pixel scores must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Classify every pixel under `predicate`
    pub fn outcome_map(&self, predicate: &ThresholdPredicate) -> Vec<PixelOutcome> {
        self.scores
            .iter()
            .zip(&self.mask)
            .map(|(&score, &truth)| PixelOutcome::classify(truth, predicate.accepts(score)))
            .collect()
    }
}

impl ScoredExample for SegmentationExample {
    fn evaluate(&self, predicate: &ThresholdPredicate) -> Result<ExampleOutcome> {
        self.check()?;

        let mut hits = 0;
        let mut predicted = 0;
        let mut positives = 0;
        for (&score, &truth) in self.scores.iter().zip(&self.mask) {
            let flagged = predicate.accepts(score);
            predicted += flagged as usize;
            positives += truth as usize;
            hits += (flagged && truth) as usize;
        }

        Ok(ExampleOutcome::from_counts(
            hits,
            predicted,
            positives,
            predicted as f64 / self.num_pixels() as f64,
        ))
    }
}

/// Per-pixel result of thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelOutcome {
    /// Flagged and in the mask
    Hit,
    /// In the mask but not flagged
    Missed,
    /// Flagged outside the mask
    Misfire,
    /// Neither
    Background,
}

impl PixelOutcome {
    pub fn classify(truth: bool, flagged: bool) -> Self {
        match (truth, flagged) {
            (true, true) => PixelOutcome::Hit,
            (true, false) => PixelOutcome::Missed,
            (false, true) => PixelOutcome::Misfire,
            (false, false) => PixelOutcome::Background,
        }
    }

    /// Display color used for outcome overlays
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            PixelOutcome::Hit => [255, 255, 255],
            PixelOutcome::Missed => [255, 69, 85],
            PixelOutcome::Misfire => [64, 181, 188],
            PixelOutcome::Background => [0, 0, 0],
        }
    }
}

/// Examples whose mask has exactly `num_components` components
pub fn filter_by_components(
    examples: &[SegmentationExample],
    num_components: usize,
) -> Vec<&SegmentationExample> {
    examples
        .iter()
        .filter(|e| e.num_components == num_components)
        .collect()
}

/// Summaries of every component stratum at one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFrame {
    pub lambda: f64,
    /// `(num_components, summary)` for each non-empty stratum
    pub strata: Vec<(usize, RiskSummary)>,
}

/// Sweep `grid` and summarize the first `per_stratum` examples of each stratum
pub fn sweep_by_components(
    examples: &[SegmentationExample],
    grid: &ThresholdGrid,
    components: &[usize],
    per_stratum: usize,
) -> Result<Vec<SweepFrame>> {
    if per_stratum == 0 {
        return Err(RcpsError::invalid_parameter(
            "per_stratum",
            per_stratum,
            "need at least one example per stratum",
        ));
    }

    let strata: Vec<(usize, Vec<&SegmentationExample>)> = components
        .iter()
        .map(|&nc| (nc, filter_by_components(examples, nc)))
        .filter(|(_, members)| !members.is_empty())
        .collect();

    grid.iter()
        .map(|lambda| {
            let predicate = ThresholdPredicate::new(lambda);
            let summaries = strata
                .iter()
                .map(|(nc, members)| Ok((*nc, members.validate(&predicate, per_stratum)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(SweepFrame {
                lambda,
                strata: summaries,
            })
        })
        .collect()
}
