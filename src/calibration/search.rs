//! Bisection search over the candidate risk tolerance
//!
//! The search tests `C(R) := R̂ + t(R) < γ` at the midpoint of `[lb, ub]`,
//! moving `ub` down when `C` holds and `lb` up when it fails, until the
//! bracket is narrower than ε. The result is `lb`, the largest tested point
//! where `C` failed (or 0 when no test failed).
//!
//! `t(0) = 0`, so `C(0)` fails exactly when `R̂ >= γ`. The base condition is
//! checked first and a failure returns 0 with the flag cleared. `t` can dip
//! below zero near `R = 1` (the quantile reaches `num_val`), but the returned
//! `lb` is always a point where `C` failed, so the threshold stays
//! inadmissible either way.
//!
//! Correctness relies on the set where `C` holds being upward closed in `R`
//! over the part of `[0, 1]` the bisection visits. That is not checked here;
//! see [`monotonicity_violations`] for a diagnostic.

use crate::calibration::bound::{BinomialTailBound, RiskBound};
use crate::error::{RcpsError, Result};
use serde::{Deserialize, Serialize};

/// Final state of one bisection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBracket {
    /// Returned tolerance (`lbR`)
    pub lower: f64,
    /// Upper end of the final bracket (`ubR`)
    pub upper: f64,
    /// Number of bound evaluations, including the base check
    pub evaluations: usize,
    /// Whether `C(0)` held, i.e. `rhat < gamma`
    pub base_condition_held: bool,
}

impl SearchBracket {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Run the bisection with an arbitrary bound and return the final bracket
pub fn bisect<B: RiskBound + ?Sized>(
    rhat: f64,
    gamma: f64,
    epsilon: f64,
    bound: &B,
) -> Result<SearchBracket> {
    if !rhat.is_finite() {
        return Err(RcpsError::invalid_parameter(
            "rhat",
            rhat,
            "empirical risk must be finite",
        ));
    }
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(RcpsError::invalid_parameter(
            "epsilon",
            epsilon,
            "search precision must be a positive finite number",
        ));
    }

    let condition = |r: f64| -> Result<bool> { Ok(rhat + bound.correction(r)? < gamma) };

    if !condition(0.0)? {
        tracing::trace!(rhat, gamma, "base condition fails at R = 0");
        return Ok(SearchBracket {
            lower: 0.0,
            upper: 0.0,
            evaluations: 1,
            base_condition_held: false,
        });
    }

    let mut evaluations = 1;
    let mut lb = 0.0_f64;
    let mut ub = 1.0_f64;
    let mut r = 0.5_f64;

    while ub - lb > epsilon {
        evaluations += 1;
        if condition(r)? {
            ub = r;
        } else {
            lb = r;
        }
        r = (lb + ub) / 2.0;
    }

    Ok(SearchBracket {
        lower: lb,
        upper: ub,
        evaluations,
        base_condition_held: true,
    })
}

/// Search the risk tolerance `R` for empirical risk `rhat`
pub fn search_r(rhat: f64, gamma: f64, delta: f64, num_val: usize, epsilon: f64) -> Result<f64> {
    let bound = BinomialTailBound::new(delta, num_val)?;
    Ok(bisect(rhat, gamma, epsilon, &bound)?.lower)
}

/// Points where `C` stops holding as `R` grows
///
/// Samples `C` at `samples + 1` evenly spaced points of `[0, 1]` and returns
/// every point where `C` fails right after a point where it held. An empty
/// result means no violation was seen at this resolution.
pub fn monotonicity_violations<B: RiskBound + ?Sized>(
    rhat: f64,
    gamma: f64,
    bound: &B,
    samples: usize,
) -> Result<Vec<f64>> {
    if samples == 0 {
        return Err(RcpsError::invalid_parameter(
            "samples",
            samples,
            "need at least one sampling interval",
        ));
    }

    let mut violations = Vec::new();
    let mut previous_held = None;

    for i in 0..=samples {
        let r = i as f64 / samples as f64;
        let held = rhat + bound.correction(r)? < gamma;
        if previous_held == Some(true) && !held {
            violations.push(r);
        }
        previous_held = Some(held);
    }

    Ok(violations)
}
