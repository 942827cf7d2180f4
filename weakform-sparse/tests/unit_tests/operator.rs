use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use weakform_sparse::{JacobiPreconditioner, LinearOperator, StoppingCriterion};

#[test]
fn csr_and_dense_operators_agree() {
    let dense = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0, -1.0, 0.0, 4.0]);
    let csr = CsrMatrix::from(&dense);
    let x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    let mut y_dense = DVector::zeros(3);
    let mut y_csr = DVector::zeros(3);
    dense.apply((&mut y_dense).into(), (&x).into());
    csr.apply((&mut y_csr).into(), (&x).into());
    assert_matrix_eq!(y_dense, y_csr, comp = abs, tol = 1e-14);
    assert_matrix_eq!(y_dense, DVector::from_column_slice(&[7.0, 6.0, 11.0]), comp = abs, tol = 1e-14);
}

#[test]
fn jacobi_inverts_the_diagonal_and_skips_zeros() {
    let mut coo = CooMatrix::new(3, 3);
    coo.push(0, 0, 2.0);
    coo.push(0, 1, 7.0);
    coo.push(2, 2, 1.0);
    coo.push(2, 2, 3.0);
    let a = CsrMatrix::from(&coo);
    let jacobi = JacobiPreconditioner::from_csr(&a);
    assert_eq!(jacobi.inverse_diagonal(), &DVector::from_column_slice(&[0.5, 1.0, 0.25]));

    let x = DVector::from_column_slice(&[4.0, 5.0, 8.0]);
    let mut y = DVector::zeros(3);
    jacobi.apply((&mut y).into(), (&x).into());
    assert_eq!(y, DVector::from_column_slice(&[2.0, 5.0, 2.0]));
}

#[test]
fn stopping_threshold_uses_the_larger_tolerance() {
    let criterion = StoppingCriterion {
        relative_tolerance: 1e-6,
        absolute_tolerance: 1e-3,
        max_iterations: 1,
    };
    assert_eq!(criterion.threshold(10.0), 1e-3);
    assert_eq!(criterion.threshold(1e4), 1e-6 * 1e4);
}
