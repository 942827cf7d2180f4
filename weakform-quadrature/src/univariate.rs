//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::legendre::LegendreTable;
use crate::{gauss_points_for_degree, Error, Rule1d};
use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: usize = 100;

/// Gauss–Legendre quadrature for the reference interval `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
/// Points are returned in ascending order.
pub fn try_gauss(num_points: usize) -> Result<Rule1d, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Only the roots in (0, 1] are computed, the others follow by symmetry
    let m = (n + 1) / 2;
    let mut positive = Vec::with_capacity(m);

    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut converged = false;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let table = LegendreTable::evaluate(n, x);
            let dx = -table.value(n) / table.derivative(n);
            x += dx;
            if dx.abs() <= 1e-15 {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::RootNotConverged { num_points: n });
        }

        let dp = LegendreTable::evaluate(n, x).derivative(n);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        positive.push((w, x));
    }

    let mut weights = Vec::with_capacity(n);
    let mut points = Vec::with_capacity(n);
    // Roots were found in descending order. For odd n the last one is the middle root,
    // which must only appear once.
    let num_mirrored = if n % 2 == 1 { m - 1 } else { m };
    for &(w, x) in &positive[..num_mirrored] {
        weights.push(w);
        points.push([-x]);
    }
    for &(w, x) in positive.iter().rev() {
        weights.push(w);
        points.push([x]);
    }

    debug_assert_eq!(points.len(), n);
    Ok((weights, points))
}

/// Same as [`try_gauss`], but panics if no rule can be produced.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule1d {
    try_gauss(num_points).unwrap_or_else(|err| panic!("Gauss rule with {num_points} points: {err}"))
}

/// The Gauss rule with the fewest points that integrates polynomials of the given degree
/// exactly.
pub fn gauss_for_degree(degree: usize) -> Rule1d {
    gauss(gauss_points_for_degree(degree))
}
