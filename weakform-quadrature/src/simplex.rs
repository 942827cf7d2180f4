//! Collapsed (Duffy) Gauss rules for the reference triangle.
//!
//! The square `[0, 1]^2` is mapped onto the triangle with vertices `(0, 0)`, `(1, 0)` and
//! `(0, 1)` by `(u, v) -> (u (1 - v), v)`, whose Jacobian determinant is `1 - v`. A polynomial
//! of total degree `d` on the triangle pulls back to degree `d` in `u` and `d + 1` in `v`.

use crate::univariate::gauss;
use crate::Rule2d;

/// A collapsed Gauss rule on the reference triangle with `num_points_per_dim^2` points.
pub fn triangle_collapsed_gauss(num_points_per_dim: usize) -> Rule2d {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    // Move the rule from [-1, 1] to [0, 1]
    let unit: Vec<(f64, f64)> = weights1d
        .iter()
        .zip(&points1d)
        .map(|(&w, &[t])| (0.5 * w, 0.5 * (1.0 + t)))
        .collect();

    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for &(wv, v) in &unit {
        for &(wu, u) in &unit {
            weights.push(wu * wv * (1.0 - v));
            points.push([u * (1.0 - v), v]);
        }
    }
    (weights, points)
}

/// The collapsed rule that integrates polynomials of the given total degree exactly on the
/// reference triangle.
pub fn triangle_gauss_for_degree(degree: usize) -> Rule2d {
    // The Jacobian adds one degree in the collapsed direction
    triangle_collapsed_gauss((degree + 3) / 2)
}
