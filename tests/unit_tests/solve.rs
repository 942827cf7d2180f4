use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use weakform::assembly::assemble;
use weakform::dof::Entity;
use weakform::error::{LinearSolveError, SolveError};
use weakform::expression::{dot, grad, x, y};
use weakform::field::FieldHandle;
use weakform::formulation::Formulation;
use weakform::mesh::procedural::{create_unit_square_quad_mesh, create_unit_square_triangle_mesh};
use weakform::mesh::Mesh;
use weakform::model::Model;
use weakform::region::RegionId;
use weakform::solve::{
    solve, BiCgStabSolver, ConjugateGradientSolver, DenseLu, IterativeSolverSettings, LinearSolver, SparseCholesky,
};

fn solvers() -> Vec<(&'static str, Box<dyn LinearSolver>)> {
    let mut solvers: Vec<(&'static str, Box<dyn LinearSolver>)> = Vec::new();
    solvers.push(("dense LU", Box::new(DenseLu)));
    solvers.push(("sparse Cholesky", Box::new(SparseCholesky)));
    solvers.push(("CG", Box::new(ConjugateGradientSolver::default())));
    solvers.push(("BiCGSTAB", Box::new(BiCgStabSolver::default())));
    solvers
}

/// Laplace problem with a linear exact solution prescribed on the boundary.
fn linear_dirichlet_problem(mesh: Mesh) -> (Model, FieldHandle, Formulation) {
    let mut model = Model::new(mesh);
    let u = model.add_field("u", "h1");
    model.set_constraint_value(&u, RegionId(2), 1.0 + x() + 2.0 * y());
    let mut formulation = Formulation::new();
    formulation.add_term(RegionId(1), dot(&grad(&u.dof()), &grad(&u.tf())));
    (model, u, formulation)
}

#[test]
fn linear_solutions_are_reproduced_exactly() {
    for (name, mut solver) in solvers() {
        let (mut model, u, formulation) = linear_dirichlet_problem(create_unit_square_quad_mesh(4));
        solve(&mut model, &formulation, solver.as_mut()).unwrap();
        for point in [[0.25, 0.5], [0.6, 0.1], [0.9, 0.9]] {
            let value = model.interpolate(RegionId(1), &u.value(), &point).unwrap()[0];
            let expected = 1.0 + point[0] + 2.0 * point[1];
            assert!((value - expected).abs() < 1e-8, "{}: {} != {}", name, value, expected);
        }
    }
}

#[test]
fn solvers_agree_on_a_poisson_problem() {
    let mut model = Model::new(create_unit_square_triangle_mesh(6));
    let u = model.add_field("u", "h1");
    model.set_order(&u, RegionId(1), 2);
    model.set_constraint(&u, RegionId(2));
    let mut formulation = Formulation::new();
    formulation.add_term(
        RegionId(1),
        dot(&grad(&u.dof()), &grad(&u.tf())) - (x() * y() + 1.0) * u.tf().into_scalar(),
    );
    let system = assemble(&model, &formulation).unwrap();

    let reference = DenseLu.solve(&system.matrix, &system.rhs).unwrap();
    for (name, mut solver) in solvers() {
        let solution = solver.solve(&system.matrix, &system.rhs).unwrap();
        let difference = (&solution - &reference).amax();
        assert!(difference < 1e-8 * reference.amax(), "{}: {}", name, difference);
    }
}

#[test]
fn singular_systems_are_reported() {
    let singular = CsrMatrix::from(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]));
    let rhs = DVector::from_column_slice(&[1.0, 1.0]);
    assert_eq!(DenseLu.solve(&singular, &rhs), Err(LinearSolveError::Singular));

    let indefinite = CsrMatrix::from(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]));
    assert_eq!(SparseCholesky.solve(&indefinite, &rhs), Err(LinearSolveError::Singular));
}

#[test]
fn mismatched_right_hand_sides_are_reported() {
    let matrix = CsrMatrix::from(&DMatrix::<f64>::identity(3, 3));
    let rhs = DVector::from_element(2, 1.0);
    for (_, mut solver) in solvers() {
        assert_eq!(
            solver.solve(&matrix, &rhs),
            Err(LinearSolveError::DimensionMismatch { rows: 3, cols: 3, rhs: 2 })
        );
    }
}

#[test]
fn iterative_solvers_report_missing_convergence() {
    let mut model = Model::new(create_unit_square_quad_mesh(8));
    let u = model.add_field("u", "h1");
    model.set_constraint(&u, RegionId(2));
    let mut formulation = Formulation::new();
    formulation.add_term(RegionId(1), dot(&grad(&u.dof()), &grad(&u.tf())) - u.tf().into_scalar());
    let system = assemble(&model, &formulation).unwrap();

    let settings = IterativeSolverSettings {
        max_iterations: 1,
        jacobi_preconditioner: false,
        ..Default::default()
    };
    let mut cg = ConjugateGradientSolver { settings };
    let result = cg.solve(&system.matrix, &system.rhs);
    assert!(matches!(result, Err(LinearSolveError::DidNotConverge { .. })), "{:?}", result);
}

#[test]
fn solve_propagates_linear_solver_failures() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let u = model.add_field("u", "h1");
    let mut formulation = Formulation::new();
    // Indefinite without constraints
    formulation.add_term(RegionId(1), -dot(&u.dof(), &u.tf()));
    let result = solve(&mut model, &formulation, &mut SparseCholesky);
    assert!(matches!(result, Err(SolveError::LinearSolver(LinearSolveError::Singular))));
}

#[test]
fn iterative_settings_deserialize_with_defaults() {
    let settings: IterativeSolverSettings = serde_json::from_str(r#"{ "max_iterations": 25 }"#).unwrap();
    assert_eq!(settings.max_iterations, 25);
    assert_eq!(settings.relative_tolerance, IterativeSolverSettings::default().relative_tolerance);
    assert!(settings.jacobi_preconditioner);
}

#[test]
fn mass_matrix_solve_recovers_projection() {
    // Projecting a bilinear function onto bilinear elements is exact
    let mut model = Model::new(create_unit_square_quad_mesh(3));
    let u = model.add_field("u", "h1");
    let mut formulation = Formulation::new();
    formulation.add_term(
        RegionId(1),
        dot(&u.dof(), &u.tf()) - (x() * y() - 0.5 * x()) * u.tf().into_scalar(),
    );
    let system = assemble(&model, &formulation).unwrap();
    let solution = SparseCholesky.solve(&system.matrix, &system.rhs).unwrap();
    let expected = DVector::from_iterator(
        solution.len(),
        system.numbering.keys().iter().map(|dof| match dof.key.entity {
            Entity::Vertex(v) => {
                let p = model.mesh().vertices()[v];
                p.x * p.y - 0.5 * p.x
            }
            _ => unreachable!(),
        }),
    );
    assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-12);
}
