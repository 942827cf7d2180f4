//! Sparse linear operators and Krylov solvers.
//!
//! The solvers work on anything implementing [`LinearOperator`], which includes dense and CSR
//! matrices from `nalgebra` and `nalgebra-sparse`.

use core::fmt;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;

pub mod bicgstab;
pub mod cg;

pub use nalgebra_sparse;

/// A linear map `y = A x`.
pub trait LinearOperator {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>);
}

impl<'a, A> LinearOperator for &'a A
where
    A: ?Sized + LinearOperator,
{
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        <A as LinearOperator>::apply(self, y, x)
    }
}

impl LinearOperator for DMatrix<f64> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        y.gemv(1.0, self, &x, 0.0);
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        spmm_csr_dense(0.0, &mut y, 1.0, Op::NoOp(self), Op::NoOp(&x));
    }
}

pub struct IdentityOperator;

impl LinearOperator for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        y.copy_from(&x);
    }
}

/// Diagonal (Jacobi) preconditioner, applying the inverse of the matrix diagonal.
///
/// Rows with a zero diagonal entry are passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobiPreconditioner {
    inverse_diagonal: DVector<f64>,
}

impl JacobiPreconditioner {
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Self {
        let mut diagonal = DVector::<f64>::zeros(matrix.nrows());
        for (i, j, v) in matrix.triplet_iter() {
            if i == j {
                diagonal[i] += *v;
            }
        }
        let inverse_diagonal = diagonal.map(|d| if d != 0.0 { 1.0 / d } else { 1.0 });
        Self { inverse_diagonal }
    }

    pub fn inverse_diagonal(&self) -> &DVector<f64> {
        &self.inverse_diagonal
    }
}

impl LinearOperator for JacobiPreconditioner {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        for i in 0..x.len() {
            y[i] = self.inverse_diagonal[i] * x[i];
        }
    }
}

/// When an iterative solve may stop.
///
/// A solve has converged once `||r|| <= max(relative_tolerance * ||b||, absolute_tolerance)`,
/// where `r` is the residual maintained by the iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingCriterion {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for StoppingCriterion {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-10,
            absolute_tolerance: 1e-14,
            max_iterations: 10_000,
        }
    }
}

impl StoppingCriterion {
    pub fn threshold(&self, b_norm: f64) -> f64 {
        (self.relative_tolerance * b_norm).max(self.absolute_tolerance)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutput {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
    /// Norm of the residual tracked by the iteration when it stopped.
    pub residual_norm: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolveErrorKind {
    DimensionMismatch { rows: usize, rhs: usize },
    IndefiniteOperator,
    IndefinitePreconditioner,
    /// A scalar the iteration divides by vanished.
    Breakdown,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { rows, rhs } => {
                write!(f, "Right-hand side of length {rhs} does not match operator with {rows} rows")
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner"),
            Self::Breakdown => write!(f, "Iteration broke down"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached", max_iter)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveError {
    pub output: SolveOutput,
    pub kind: SolveErrorKind,
}

impl SolveError {
    fn new(output: SolveOutput, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iterative solve failed after {} iterations (residual {:.3e}): {}",
            self.output.num_iterations, self.output.residual_norm, self.kind
        )
    }
}

impl std::error::Error for SolveError {}

/// y = Ax
fn apply_operator<A: LinearOperator>(y: &mut DVector<f64>, a: &A, x: &DVector<f64>) {
    a.apply(y.into(), x.into())
}
