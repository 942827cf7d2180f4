//! Generalized symmetric eigenvalue problems `K x = λ M x`.

use crate::assembly::{Assembler, GeneralizedSystem};
use crate::dof::DofNumbering;
use crate::error::EigenSolveError;
use crate::formulation::Formulation;
use crate::model::Model;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Eigenvalues in ascending order, with the corresponding eigenvectors as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPairs {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl EigenPairs {
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }
}

pub trait EigenSolver {
    /// Computes the `count` smallest eigenpairs of `stiffness * x = λ mass * x`.
    ///
    /// Fewer pairs are returned if the system has fewer than `count` unknowns.
    fn solve(
        &mut self,
        stiffness: &CsrMatrix<f64>,
        mass: &CsrMatrix<f64>,
        count: usize,
    ) -> Result<EigenPairs, EigenSolveError>;
}

/// Dense solver for symmetric stiffness and symmetric positive definite mass matrices.
///
/// Reduces the problem to a standard symmetric one with the Cholesky factor `M = L L^T`, so
/// eigenvectors are `M`-orthonormal.
#[derive(Debug, Copy, Clone, Default)]
pub struct DenseGeneralizedSymmetric;

impl EigenSolver for DenseGeneralizedSymmetric {
    fn solve(
        &mut self,
        stiffness: &CsrMatrix<f64>,
        mass: &CsrMatrix<f64>,
        count: usize,
    ) -> Result<EigenPairs, EigenSolveError> {
        let n = stiffness.nrows();
        if stiffness.ncols() != n || mass.nrows() != n || mass.ncols() != n {
            return Err(EigenSolveError::DimensionMismatch {
                stiffness: n,
                mass: mass.nrows(),
            });
        }

        let k = DMatrix::from(stiffness);
        let m = DMatrix::from(mass);
        let l = m.cholesky().ok_or(EigenSolveError::IndefiniteMass)?.l();

        // L^{-1} K L^{-T}, using the symmetry of K
        let l_inv_k = l
            .solve_lower_triangular(&k)
            .ok_or(EigenSolveError::IndefiniteMass)?;
        let a = l
            .solve_lower_triangular(&l_inv_k.transpose())
            .ok_or(EigenSolveError::IndefiniteMass)?;
        let a = (&a + a.transpose()) * 0.5;

        let eigen = a.symmetric_eigen();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));
        order.truncate(count.min(n));

        let eigenvalues = DVector::from_iterator(order.len(), order.iter().map(|&i| eigen.eigenvalues[i]));
        let mut y = DMatrix::<f64>::zeros(n, order.len());
        for (column, &i) in order.iter().enumerate() {
            y.set_column(column, &eigen.eigenvectors.column(i));
        }
        let eigenvectors = l
            .transpose()
            .solve_upper_triangular(&y)
            .ok_or(EigenSolveError::IndefiniteMass)?;

        Ok(EigenPairs {
            eigenvalues,
            eigenvectors,
        })
    }
}

/// Eigenpairs of a formulation together with the numbering of their unknowns.
#[derive(Debug, Clone)]
pub struct Eigenmodes {
    pub pairs: EigenPairs,
    pub numbering: DofNumbering,
}

impl Eigenmodes {
    /// Writes the eigenvector of a mode into the model's fields.
    pub fn apply_mode(&self, model: &mut Model, mode: usize) {
        let vector = self.pairs.eigenvectors.column(mode).into_owned();
        self.numbering.write_solution(model.fields_mut(), &vector);
    }
}

/// Assembles the stiffness and mass terms of a formulation and computes its smallest
/// eigenpairs.
pub fn solve_eigen(
    model: &Model,
    formulation: &Formulation,
    solver: &mut dyn EigenSolver,
    count: usize,
) -> eyre::Result<Eigenmodes> {
    let GeneralizedSystem {
        stiffness,
        mass,
        numbering,
    } = Assembler::default().assemble_generalized(model, formulation)?;
    debug!(
        "Solving generalized eigenvalue problem with {} unknowns for {} pairs",
        numbering.num_unknowns(),
        count
    );
    let pairs = solver.solve(&stiffness, &mass, count)?;
    Ok(Eigenmodes { pairs, numbering })
}
