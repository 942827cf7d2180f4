use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use proptest::prelude::*;
use weakform_sparse::bicgstab::BiCgStab;
use weakform_sparse::{JacobiPreconditioner, SolveErrorKind, StoppingCriterion};

/// Upwinded 1D convection-diffusion, which is non-symmetric.
fn convection_diffusion_1d(n: usize, peclet: f64) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n, n);
    for i in 0..n {
        coo.push(i, i, 2.0 + peclet);
        if i > 0 {
            coo.push(i, i - 1, -1.0 - peclet);
        }
        if i + 1 < n {
            coo.push(i, i + 1, -1.0);
        }
    }
    CsrMatrix::from(&coo)
}

fn criterion() -> StoppingCriterion {
    StoppingCriterion {
        relative_tolerance: 1e-13,
        absolute_tolerance: 0.0,
        max_iterations: 500,
    }
}

#[test]
fn solve_non_symmetric_dense() {
    let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, -2.0, 5.0, 1.0, 0.5, -1.0, 3.0]);
    let x0 = DVector::from_column_slice(&[1.0, -2.0, 0.5]);
    let b = &a * &x0;
    let mut x = DVector::zeros(3);
    BiCgStab::new(&a)
        .with_stopping_criterion(criterion())
        .solve_with_guess(&b, &mut x)
        .unwrap();
    assert_matrix_eq!(x, x0, comp = abs, tol = 1e-10);
}

#[test]
fn solve_convection_diffusion_with_jacobi() {
    let n = 60;
    let a = convection_diffusion_1d(n, 1.0);
    let x0 = DVector::from_fn(n, |i, _| 1.0 + (i as f64 / 7.0).cos());
    let b = &a * &x0;
    let mut x = DVector::zeros(n);
    let output = BiCgStab::new(&a)
        .with_preconditioner(JacobiPreconditioner::from_csr(&a))
        .with_stopping_criterion(criterion())
        .solve_with_guess(&b, &mut x)
        .unwrap();
    assert!(output.num_iterations > 0);
    assert_matrix_eq!(x, x0, comp = abs, tol = 1e-8);
}

#[test]
fn exact_initial_guess_needs_no_iterations() {
    let a = convection_diffusion_1d(10, 1.0);
    let x0 = DVector::repeat(10, 2.0);
    let b = &a * &x0;
    let mut x = x0.clone();
    let output = BiCgStab::new(&a).solve_with_guess(&b, &mut x).unwrap();
    assert_eq!(output.num_iterations, 0);
}

#[test]
fn iteration_limit_is_reported() {
    let a = convection_diffusion_1d(80, 0.5);
    let b = DVector::repeat(80, 1.0);
    let mut x = DVector::zeros(80);
    let err = BiCgStab::new(&a)
        .with_stopping_criterion(StoppingCriterion {
            relative_tolerance: 1e-15,
            absolute_tolerance: 0.0,
            max_iterations: 2,
        })
        .solve_with_guess(&b, &mut x)
        .unwrap_err();
    assert_eq!(err.kind, SolveErrorKind::MaxIterationsReached { max_iter: 2 });
}

proptest! {
    #[test]
    fn diagonally_dominant_systems_are_solved(
        entries in proptest::collection::vec(-1.0..1.0f64, 16),
        rhs in proptest::collection::vec(-10.0..10.0f64, 4),
    ) {
        let mut a = DMatrix::from_row_slice(4, 4, &entries);
        for i in 0..4 {
            a[(i, i)] = 5.0 + a[(i, i)].abs();
        }
        let b = DVector::from_vec(rhs);
        let mut x = DVector::zeros(4);
        let solved = BiCgStab::new(&a)
            .with_stopping_criterion(criterion())
            .solve_with_guess(&b, &mut x);
        prop_assume!(solved.is_ok());
        let residual = &b - &a * &x;
        prop_assert!(residual.norm() <= 1e-10 * (1.0 + b.norm()));
    }
}
