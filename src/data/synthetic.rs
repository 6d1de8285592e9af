//! Synthetic score datasets

use crate::error::{RcpsError, Result};
use crate::validation::{MultiLabelExample, SegmentationExample};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shape of a synthetic multi-label dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub n_examples: usize,
    pub n_classes: usize,
    /// Probability that a class is present
    pub positive_rate: f64,
    /// 0 draws every score uniformly; larger values push positive scores
    /// toward 1 and negative scores toward 0
    pub signal: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_examples: 1000,
            n_classes: 1,
            positive_rate: 0.5,
            signal: 0.0,
        }
    }
}

impl SyntheticConfig {
    pub fn with_n_examples(mut self, n: usize) -> Self {
        self.n_examples = n;
        self
    }

    pub fn with_n_classes(mut self, n: usize) -> Self {
        self.n_classes = n;
        self
    }

    pub fn with_positive_rate(mut self, rate: f64) -> Self {
        self.positive_rate = rate;
        self
    }

    pub fn with_signal(mut self, signal: f64) -> Self {
        self.signal = signal;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_classes == 0 {
            return Err(RcpsError::invalid_parameter(
                "n_classes",
                self.n_classes,
                "need at least one class",
            ));
        }
        if !(0.0..=1.0).contains(&self.positive_rate) {
            return Err(RcpsError::invalid_parameter(
                "positive_rate",
                self.positive_rate,
                "must lie in [0, 1]",
            ));
        }
        if !(self.signal.is_finite() && self.signal >= 0.0) {
            return Err(RcpsError::invalid_parameter(
                "signal",
                self.signal,
                "must be a non-negative finite number",
            ));
        }
        Ok(())
    }
}

/// Generate a multi-label dataset from `config`
pub fn synthetic_multilabel<R: Rng + ?Sized>(
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<Vec<MultiLabelExample>> {
    config.validate()?;
    let skew = 1.0 + config.signal;

    let examples = (0..config.n_examples)
        .map(|_| {
            let labels: Vec<bool> = (0..config.n_classes)
                .map(|_| rng.gen_bool(config.positive_rate))
                .collect();
            let scores = labels
                .iter()
                .map(|&positive| {
                    let u: f64 = rng.gen();
                    if positive {
                        u.powf(1.0 / skew)
                    } else {
                        u.powf(skew)
                    }
                })
                .collect();
            MultiLabelExample { scores, labels }
        })
        .collect();

    Ok(examples)
}

/// Generate segmentation examples with one or two rectangular components
///
/// Components sit in opposite halves of the image so they never touch.
/// Pixel probabilities are high inside components and low outside, with
/// uniform noise.
pub fn synthetic_segmentation<R: Rng + ?Sized>(
    n_examples: usize,
    width: usize,
    height: usize,
    rng: &mut R,
) -> Result<Vec<SegmentationExample>> {
    if width < 4 || height < 2 {
        return Err(RcpsError::invalid_parameter(
            "width x height",
            format!("{}x{}", width, height),
            "need at least 4x2 pixels",
        ));
    }

    let half = width / 2;
    (0..n_examples)
        .map(|_| {
            let num_components = rng.gen_range(1..=2);
            let mut mask = vec![false; width * height];

            for c in 0..num_components {
                let x_offset = c * half;
                let w = rng.gen_range(1..=half.max(2) - 1);
                let h = rng.gen_range(1..=height / 2);
                let x0 = x_offset + rng.gen_range(0..half - w);
                let y0 = rng.gen_range(0..=height - h);
                for y in y0..y0 + h {
                    for x in x0..x0 + w {
                        mask[y * width + x] = true;
                    }
                }
            }

            let probabilities: Vec<f64> = mask
                .iter()
                .map(|&inside| {
                    let u: f64 = rng.gen();
                    if inside {
                        0.4 + 0.6 * u
                    } else {
                        0.5 * u
                    }
                })
                .collect();

            SegmentationExample::from_probabilities(
                width,
                height,
                &probabilities,
                mask,
                num_components,
            )
        })
        .collect()
}
