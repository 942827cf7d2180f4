//! Linear solvers for assembled systems, and the single linear solve of a formulation.

use crate::assembly::{Assembler, LinearSystem};
use crate::error::{LinearSolveError, SolveError};
use crate::formulation::Formulation;
use crate::model::Model;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use weakform_sparse::bicgstab::BiCgStab;
use weakform_sparse::cg::ConjugateGradient;
use weakform_sparse::{JacobiPreconditioner, SolveErrorKind, StoppingCriterion};

/// Solves `matrix * x = rhs`.
pub trait LinearSolver {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError>;
}

impl<S: LinearSolver + ?Sized> LinearSolver for &mut S {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        S::solve(self, matrix, rhs)
    }
}

impl<S: LinearSolver + ?Sized> LinearSolver for Box<S> {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        S::solve(self, matrix, rhs)
    }
}

fn check_dimensions(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<(), LinearSolveError> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        Err(LinearSolveError::DimensionMismatch {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            rhs: rhs.len(),
        })
    } else {
        Ok(())
    }
}

/// Dense LU factorization with partial pivoting. Suited for small systems.
#[derive(Debug, Copy, Clone, Default)]
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        check_dimensions(matrix, rhs)?;
        let dense = DMatrix::from(matrix);
        let x = dense.lu().solve(rhs).ok_or(LinearSolveError::Singular)?;
        if x.iter().all(|x_i| x_i.is_finite()) {
            Ok(x)
        } else {
            Err(LinearSolveError::Singular)
        }
    }
}

/// Sparse Cholesky factorization for symmetric positive definite systems.
#[derive(Debug, Copy, Clone, Default)]
pub struct SparseCholesky;

impl LinearSolver for SparseCholesky {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        check_dimensions(matrix, rhs)?;
        let cholesky = CscCholesky::factor(&CscMatrix::from(matrix)).map_err(|_| LinearSolveError::Singular)?;
        let x = cholesky.solve(rhs);
        Ok(x.column(0).into_owned())
    }
}

/// Settings of the iterative solvers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeSolverSettings {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub max_iterations: usize,
    /// Scale with the inverse diagonal of the matrix.
    pub jacobi_preconditioner: bool,
}

impl Default for IterativeSolverSettings {
    fn default() -> Self {
        let criterion = StoppingCriterion::default();
        Self {
            relative_tolerance: criterion.relative_tolerance,
            absolute_tolerance: criterion.absolute_tolerance,
            max_iterations: criterion.max_iterations,
            jacobi_preconditioner: true,
        }
    }
}

impl IterativeSolverSettings {
    fn stopping_criterion(&self) -> StoppingCriterion {
        StoppingCriterion {
            relative_tolerance: self.relative_tolerance,
            absolute_tolerance: self.absolute_tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

fn convert_iterative_error(err: weakform_sparse::SolveError) -> LinearSolveError {
    match err.kind {
        SolveErrorKind::DimensionMismatch { rows, rhs } => LinearSolveError::DimensionMismatch {
            rows,
            cols: rows,
            rhs,
        },
        SolveErrorKind::IndefiniteOperator | SolveErrorKind::IndefinitePreconditioner | SolveErrorKind::Breakdown => {
            LinearSolveError::Singular
        }
        _ => LinearSolveError::DidNotConverge {
            iterations: err.output.num_iterations,
            residual_norm: err.output.residual_norm,
        },
    }
}

/// Preconditioned conjugate gradient for symmetric positive definite systems.
///
/// Starts from a zero initial guess.
#[derive(Debug, Clone, Default)]
pub struct ConjugateGradientSolver {
    pub settings: IterativeSolverSettings,
}

impl LinearSolver for ConjugateGradientSolver {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        check_dimensions(matrix, rhs)?;
        let mut x = DVector::zeros(rhs.len());
        let criterion = self.settings.stopping_criterion();
        let output = if self.settings.jacobi_preconditioner {
            ConjugateGradient::new(matrix)
                .with_preconditioner(JacobiPreconditioner::from_csr(matrix))
                .with_stopping_criterion(criterion)
                .solve_with_guess(rhs, &mut x)
        } else {
            ConjugateGradient::new(matrix)
                .with_stopping_criterion(criterion)
                .solve_with_guess(rhs, &mut x)
        }
        .map_err(convert_iterative_error)?;
        debug!("CG converged after {} iterations", output.num_iterations);
        Ok(x)
    }
}

/// Preconditioned BiCGSTAB for general systems.
#[derive(Debug, Clone, Default)]
pub struct BiCgStabSolver {
    pub settings: IterativeSolverSettings,
}

impl LinearSolver for BiCgStabSolver {
    fn solve(&mut self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        check_dimensions(matrix, rhs)?;
        let mut x = DVector::zeros(rhs.len());
        let criterion = self.settings.stopping_criterion();
        let output = if self.settings.jacobi_preconditioner {
            BiCgStab::new(matrix)
                .with_preconditioner(JacobiPreconditioner::from_csr(matrix))
                .with_stopping_criterion(criterion)
                .solve_with_guess(rhs, &mut x)
        } else {
            BiCgStab::new(matrix)
                .with_stopping_criterion(criterion)
                .solve_with_guess(rhs, &mut x)
        }
        .map_err(convert_iterative_error)?;
        debug!("BiCGSTAB converged after {} iterations", output.num_iterations);
        Ok(x)
    }
}

/// Assembles a formulation, solves it and writes the solution into the model's fields.
pub fn solve(model: &mut Model, formulation: &Formulation, solver: &mut dyn LinearSolver) -> Result<(), SolveError> {
    solve_with_assembler(model, formulation, solver, &Assembler::default())
}

/// Like [`solve`], with a given assembler.
pub fn solve_with_assembler(
    model: &mut Model,
    formulation: &Formulation,
    solver: &mut dyn LinearSolver,
    assembler: &Assembler,
) -> Result<(), SolveError> {
    let LinearSystem {
        matrix,
        rhs,
        numbering,
    } = assembler
        .assemble(model, formulation)
        .map_err(SolveError::Assembly)?;
    let x = solver.solve(&matrix, &rhs)?;
    numbering.write_solution(model.fields_mut(), &x);
    Ok(())
}
