//! Quadrature rules for the reference domains used by `weakform`.
//!
//! Reference domains follow these conventions:
//!
//! - segment: the interval `[-1, 1]`,
//! - quadrilateral: the square `[-1, 1]^2`,
//! - triangle: the simplex with vertices `(0, 0)`, `(1, 0)` and `(0, 1)`.
//!
//! Rules can be requested either by number of points or by the polynomial degree that must be
//! integrated exactly. The crate has no dependency on the rest of `weakform`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod legendre;
pub mod simplex;
pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
    /// The Newton iteration locating the roots of a Legendre polynomial did not settle.
    RootNotConverged { num_points: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
            Self::RootNotConverged { num_points } => {
                write!(f, "Failed to locate the roots of the Legendre polynomial of degree {num_points}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A two-dimensional point.
pub type Point2 = Point<2>;

/// A D-dimensional rule, stored as `(weights, points)`.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional quadrature rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// Approximates the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, x)| w * f(x)).sum()
}

/// Number of Gauss points per direction needed to integrate polynomials of the given degree
/// exactly along one tensor direction.
pub fn gauss_points_for_degree(degree: usize) -> usize {
    // n Gauss points integrate degree 2n - 1 exactly
    (degree + 2) / 2
}
