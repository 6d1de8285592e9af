//! Calibration configuration

use crate::error::{RcpsError, Result};
use serde::{Deserialize, Serialize};

/// Parameters of one calibration run
///
/// Fixed for the duration of a run. Use [`CalibrationParameters::new`] to get
/// a validated instance; the fields are public for serde and inspection only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Target risk upper bound, in (0, 1)
    pub gamma: f64,

    /// Allowed failure probability, in (0, 1)
    pub delta: f64,

    /// Calibration sample size
    pub num_val: usize,

    /// Bisection precision of the risk search
    pub epsilon: f64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            delta: 0.1,
            num_val: 4000,
            epsilon: 0.01,
        }
    }
}

impl CalibrationParameters {
    /// Create validated calibration parameters
    pub fn new(gamma: f64, delta: f64, num_val: usize, epsilon: f64) -> Result<Self> {
        let params = Self {
            gamma,
            delta,
            num_val,
            epsilon,
        };
        params.validate()?;
        Ok(params)
    }

    /// Builder method to set the risk tolerance
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Builder method to set the failure probability
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Builder method to set the calibration sample size
    pub fn with_num_val(mut self, num_val: usize) -> Self {
        self.num_val = num_val;
        self
    }

    /// Builder method to set the search precision
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Check every parameter against its admissible range
    pub fn validate(&self) -> Result<()> {
        check_open_unit("gamma", self.gamma)?;
        check_open_unit("delta", self.delta)?;

        if self.num_val == 0 {
            return Err(RcpsError::invalid_parameter(
                "num_val",
                self.num_val,
                "calibration sample size must be at least 1",
            ));
        }

        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(RcpsError::invalid_parameter(
                "epsilon",
                self.epsilon,
                "search precision must be a positive finite number",
            ));
        }

        Ok(())
    }
}

fn check_open_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(RcpsError::invalid_parameter(name, value, "must lie in (0, 1)"))
    }
}

/// Range of scores the threshold grid is laid over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDomain {
    pub lower: f64,
    pub upper: f64,
}

impl ScoreDomain {
    /// Create a validated score domain
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let domain = Self { lower, upper };
        domain.validate()?;
        Ok(domain)
    }

    /// Class confidence domain `[0, 1]`
    pub fn unit() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// Segmentation score domain `[-1, 0]`
    pub fn segmentation() -> Self {
        Self {
            lower: -1.0,
            upper: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(RcpsError::ConfigError(format!(
                "score domain bounds must be finite, got [{}, {}]",
                self.lower, self.upper
            )));
        }
        if self.lower >= self.upper {
            return Err(RcpsError::ConfigError(format!(
                "score domain is empty or inverted: [{}, {}]",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

impl Default for ScoreDomain {
    fn default() -> Self {
        Self::unit()
    }
}
