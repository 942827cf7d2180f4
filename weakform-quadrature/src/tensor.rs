//! 2D quadrature rules formed by tensor products of 1D rules.

use crate::univariate::gauss;
use crate::{gauss_points_for_degree, Rule2d};

/// A Gauss quadrature rule for the reference quadrilateral `[-1, 1]^2`.
///
/// The rule is constructed as a tensor product from 1D rules, with the provided number of
/// points per dimension.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule2d {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    let mut weights2d = Vec::with_capacity(n * n);
    let mut points2d = Vec::with_capacity(n * n);

    for (&wy, &[y]) in weights1d.iter().zip(&points1d) {
        for (&wx, &[x]) in weights1d.iter().zip(&points1d) {
            weights2d.push(wx * wy);
            points2d.push([x, y]);
        }
    }

    (weights2d, points2d)
}

/// The tensor Gauss rule that integrates polynomials of the given degree in each variable
/// exactly on the reference quadrilateral.
pub fn quadrilateral_gauss_for_degree(degree: usize) -> Rule2d {
    quadrilateral_gauss(gauss_points_for_degree(degree))
}
