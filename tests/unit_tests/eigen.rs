use std::f64::consts::PI;

use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use weakform::assembly::Assembler;
use weakform::eigen::{solve_eigen, DenseGeneralizedSymmetric, EigenSolver};
use weakform::error::EigenSolveError;
use weakform::expression::{dot, grad};
use weakform::field::FieldHandle;
use weakform::formulation::Formulation;
use weakform::mesh::procedural::create_unit_square_quad_mesh;
use weakform::model::Model;
use weakform::region::RegionId;

fn dirichlet_laplacian(cells: usize, order: u32) -> (Model, FieldHandle, Formulation) {
    let mut model = Model::new(create_unit_square_quad_mesh(cells));
    let u = model.add_field("u", "h1");
    model.set_order(&u, RegionId(1), order);
    model.set_constraint(&u, RegionId(2));
    let mut formulation = Formulation::new();
    formulation
        .add_term(RegionId(1), dot(&grad(&u.dof()), &grad(&u.tf())))
        .add_mass_term(RegionId(1), dot(&u.dof(), &u.tf()));
    (model, u, formulation)
}

#[test]
fn unit_square_dirichlet_eigenvalues() {
    let (model, _, formulation) = dirichlet_laplacian(8, 2);
    let modes = solve_eigen(&model, &formulation, &mut DenseGeneralizedSymmetric, 3).unwrap();
    assert_eq!(modes.pairs.len(), 3);

    let eigenvalues = &modes.pairs.eigenvalues;
    let expected = [2.0 * PI * PI, 5.0 * PI * PI, 5.0 * PI * PI];
    for (computed, exact) in eigenvalues.iter().zip(expected) {
        let relative_error = (computed - exact).abs() / exact;
        assert!(relative_error < 5e-3, "{} vs {}", computed, exact);
        // Conforming discretizations approximate eigenvalues from above
        assert!(*computed > exact - 1e-9);
    }
    assert!(eigenvalues[0] <= eigenvalues[1] && eigenvalues[1] <= eigenvalues[2]);
}

#[test]
fn eigenvectors_are_mass_orthonormal() {
    let (model, _, formulation) = dirichlet_laplacian(4, 2);
    let system = Assembler::default()
        .assemble_generalized(&model, &formulation)
        .unwrap();
    let pairs = DenseGeneralizedSymmetric
        .solve(&system.stiffness, &system.mass, 5)
        .unwrap();
    let m = DMatrix::from(&system.mass);
    let k = DMatrix::from(&system.stiffness);
    let v = &pairs.eigenvectors;
    assert_matrix_eq!(v.transpose() * &m * v, DMatrix::identity(5, 5), comp = abs, tol = 1e-9);
    let lambda = DMatrix::from_diagonal(&pairs.eigenvalues);
    assert_matrix_eq!(&k * v, &m * v * lambda, comp = abs, tol = 1e-8);
}

#[test]
fn applied_modes_have_unit_l2_norm() {
    let (mut model, u, formulation) = dirichlet_laplacian(6, 2);
    let modes = solve_eigen(&model, &formulation, &mut DenseGeneralizedSymmetric, 2).unwrap();
    for mode in 0..2 {
        modes.apply_mode(&mut model, mode);
        let value = u.value().into_scalar();
        let norm_squared = model.integrate(RegionId(1), &(value.clone() * value), 6).unwrap();
        assert_scalar_eq!(norm_squared, 1.0, comp = abs, tol = 1e-9);
    }
}

#[test]
fn requesting_more_pairs_than_unknowns_returns_all() {
    // A 2x2 mesh with bilinear elements has a single interior unknown
    let (model, _, formulation) = dirichlet_laplacian(2, 1);
    let modes = solve_eigen(&model, &formulation, &mut DenseGeneralizedSymmetric, 10).unwrap();
    assert_eq!(modes.pairs.len(), 1);
    assert_eq!(modes.numbering.num_unknowns(), 1);
    assert_eq!(modes.pairs.eigenvectors.shape(), (1, 1));
}

#[test]
fn indefinite_mass_matrices_are_rejected() {
    let k = CsrMatrix::from(&DMatrix::<f64>::identity(2, 2));
    let m = CsrMatrix::from(&DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]));
    assert_eq!(
        DenseGeneralizedSymmetric.solve(&k, &m, 2),
        Err(EigenSolveError::IndefiniteMass)
    );

    let m = CsrMatrix::from(&DMatrix::<f64>::identity(3, 3));
    assert!(matches!(
        DenseGeneralizedSymmetric.solve(&k, &m, 2),
        Err(EigenSolveError::DimensionMismatch { stiffness: 2, mass: 3 })
    ));
}
