//! Exact binomial quantile
//!
//! The CDF comes from `statrs` (regularized incomplete beta). The quantile is
//! the smallest count `k` in `[0, n]` with `CDF(k) >= q`, found by bisection
//! over the integers so no normal approximation is involved.

use crate::error::{RcpsError, Result};
use statrs::distribution::{Binomial, DiscreteCDF};

/// Quantile (inverse CDF) of `Binomial(n, p)` at probability `q`
///
/// Returns the smallest `k` with `P(X <= k) >= q`. `q` must lie in `(0, 1]`
/// and `p` in `[0, 1]`.
pub fn binomial_quantile(q: f64, n: u64, p: f64) -> Result<u64> {
    if !(q.is_finite() && q > 0.0 && q <= 1.0) {
        return Err(RcpsError::invalid_parameter(
            "q",
            q,
            "quantile level must lie in (0, 1]",
        ));
    }
    if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
        return Err(RcpsError::invalid_parameter(
            "p",
            p,
            "success probability must lie in [0, 1]",
        ));
    }

    // Point masses
    if p == 0.0 || n == 0 {
        return Ok(0);
    }
    if p == 1.0 {
        return Ok(n);
    }

    let dist = Binomial::new(p, n).map_err(|e| {
        RcpsError::ComputationError(format!("binomial({}, {}) rejected: {}", n, p, e))
    })?;

    // Invariant: CDF(hi) >= q; every k < lo has CDF(k) < q.
    let mut lo = 0u64;
    let mut hi = n;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if dist.cdf(mid) >= q {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok(lo)
}
