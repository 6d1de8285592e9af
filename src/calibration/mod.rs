//! Risk-controlling threshold calibration
//!
//! Provides the calibration core:
//! - Exact binomial tail correction (`r_to_t`)
//! - Bisection search over the risk tolerance (`search_r`)
//! - Threshold grid sweep and λ̂ selection (`LambdaSelector`, `get_lamhat`)

mod binomial;
mod bound;
mod config;
mod grid;
mod search;
mod selector;

pub use binomial::binomial_quantile;
pub use bound::{r_to_t, BinomialTailBound, RiskBound};
pub use config::{CalibrationParameters, ScoreDomain};
pub use grid::ThresholdGrid;
pub use search::{bisect, monotonicity_violations, search_r, SearchBracket};
pub use selector::{
    get_lamhat, get_lamhat_precomputed, CorrectedRisk, LambdaSelector, Selection,
};
