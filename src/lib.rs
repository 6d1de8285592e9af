//! rcps - Risk-controlling threshold calibration
//!
//! Selects the decision threshold of a prediction-set predictor so that, with
//! probability at least `1 - δ` over the calibration sample, the expected
//! miss rate (`1 - recall`) stays below a target `γ`. The bound comes from a
//! binomial tail inequality with a bisection search over the risk tolerance.
//!
//! # Modules
//!
//! ## Calibration core
//! - [`calibration`] - Binomial bound, tolerance search, threshold selection
//! - [`validation`] - Predicates, per-example outcomes and validators
//!
//! ## Evaluation
//! - [`trial`] - Random calibration/validation splits and single trials
//! - [`experiment`] - Repeated trials, result caching and summaries
//! - [`data`] - Precomputed and synthetic score datasets
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Calibration core
pub mod calibration;
pub mod validation;

// Evaluation
pub mod trial;
pub mod experiment;
pub mod data;

// Services
pub mod cli;

pub use error::{RcpsError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{RcpsError, Result};

    // Calibration
    pub use crate::calibration::{
        get_lamhat, get_lamhat_precomputed, r_to_t, search_r, BinomialTailBound,
        CalibrationParameters, LambdaSelector, RiskBound, ScoreDomain, Selection, ThresholdGrid,
    };

    // Validation
    pub use crate::validation::{
        MultiLabelExample, RiskSummary, ScoredExample, SegmentationExample, Subset,
        ThresholdPredicate, Validator,
    };

    // Trials
    pub use crate::trial::{trial, trial_precomputed, TrialResult, TrialRunner};

    // Experiments
    pub use crate::experiment::{
        ExperimentConfig, ExperimentRunner, ExperimentSummary, RiskTarget, StatsSummary,
    };

    // Data
    pub use crate::data::{load_examples, save_examples, synthetic_multilabel, SyntheticConfig};
}
