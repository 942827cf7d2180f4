//! Errors reported for runtime and numerical failures.
//!
//! Violations of declaration invariants (unknown regions or shape function types, integrands
//! that cannot be linearized, unsupported orders) are programmer errors and panic instead.

use crate::region::RegionId;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LinearSolveError {
    /// The system matrix is singular, or not positive definite for solvers requiring it.
    Singular,
    /// An iterative solver stopped before reaching its tolerance.
    DidNotConverge { iterations: usize, residual_norm: f64 },
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
}

impl Display for LinearSolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singular => write!(f, "The system matrix is singular"),
            Self::DidNotConverge {
                iterations,
                residual_norm,
            } => write!(
                f,
                "Linear solver did not converge within {} iterations (residual norm {:e})",
                iterations, residual_norm
            ),
            Self::DimensionMismatch { rows, cols, rhs } => write!(
                f,
                "Cannot solve a {}x{} system with a right-hand side of length {}",
                rows, cols, rhs
            ),
        }
    }
}

impl Error for LinearSolveError {}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EigenSolveError {
    /// The mass matrix is not symmetric positive definite.
    IndefiniteMass,
    DimensionMismatch { stiffness: usize, mass: usize },
}

impl Display for EigenSolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndefiniteMass => write!(f, "The mass matrix is not positive definite"),
            Self::DimensionMismatch { stiffness, mass } => write!(
                f,
                "Stiffness matrix has dimension {} but mass matrix has dimension {}",
                stiffness, mass
            ),
        }
    }
}

impl Error for EigenSolveError {}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InterpolationError {
    /// No face of the region contains the point.
    PointOutsideRegion { point: [f64; 2], region: RegionId },
}

impl Display for InterpolationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointOutsideRegion { point, region } => write!(
                f,
                "Point ({}, {}) is not contained in any face of region {}",
                point[0], point[1], region
            ),
        }
    }
}

impl Error for InterpolationError {}

/// Failure of a single assemble-and-solve step.
#[derive(Debug)]
pub enum SolveError {
    Assembly(eyre::Report),
    LinearSolver(LinearSolveError),
    /// The convergence measure could not be evaluated.
    Measure(eyre::Report),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assembly(report) => write!(f, "Assembly failed: {}", report),
            Self::LinearSolver(err) => write!(f, "Linear solve failed: {}", err),
            Self::Measure(report) => write!(f, "Evaluating the convergence measure failed: {}", report),
        }
    }
}

impl Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LinearSolver(err) => Some(err),
            Self::Assembly(report) | Self::Measure(report) => {
                let err: &(dyn Error + 'static) = report.as_ref();
                Some(err)
            }
        }
    }
}

impl From<LinearSolveError> for SolveError {
    fn from(err: LinearSolveError) -> Self {
        Self::LinearSolver(err)
    }
}

/// A fatal failure inside the nonlinear loop.
#[derive(Debug)]
pub struct NonlinearSolveError {
    pub iteration: usize,
    pub parameter: f64,
    pub source: SolveError,
}

impl Display for NonlinearSolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Nonlinear solve failed in iteration {} (parameter {}): {}",
            self.iteration, self.parameter, self.source
        )
    }
}

impl Error for NonlinearSolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
