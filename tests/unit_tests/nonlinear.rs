use std::time::Duration;

use matrixcompare::assert_scalar_eq;
use weakform::error::SolveError;
use weakform::expression::{dot, grad, x, ParameterId};
use weakform::field::FieldHandle;
use weakform::formulation::Formulation;
use weakform::mesh::procedural::create_unit_square_quad_mesh;
use weakform::model::Model;
use weakform::nonlinear::{
    ramp, relative_change, solve_nonlinear, DivergenceReason, NonlinearOutcome, NonlinearSettings, NonlinearState,
    RampedSolver,
};
use weakform::region::RegionId;
use weakform::solve::SparseCholesky;

#[test]
fn ramp_moves_toward_target_and_snaps() {
    assert_scalar_eq!(ramp(0.1, 0.3, 0.008, 1e-12), 0.108, comp = abs, tol = 1e-15);
    assert_eq!(ramp(0.295, 0.3, 0.008, 1e-12), 0.3);
    assert_eq!(ramp(0.3, 0.3, 0.008, 1e-12), 0.3);
    assert_scalar_eq!(ramp(1.0, 0.0, 0.3, 1e-12), 0.7, comp = abs, tol = 1e-15);
    // The sign of the increment is irrelevant
    assert_scalar_eq!(ramp(1.0, 0.0, -0.3, 1e-12), 0.7, comp = abs, tol = 1e-15);

    let mut parameter = 0.1;
    let mut steps = 0;
    while parameter != 0.3 {
        parameter = ramp(parameter, 0.3, 0.008, 1e-12);
        steps += 1;
        assert!(steps <= 25);
    }
    assert_eq!(steps, 25);
}

#[test]
fn relative_change_is_relative_to_the_new_value() {
    assert_eq!(relative_change(1.0, 2.0), 0.5);
    assert_eq!(relative_change(2.0, 2.0), 0.0);
    assert_eq!(relative_change(0.0, 4.0), 1.0);
    // Falls back to the absolute change at zero
    assert_eq!(relative_change(0.5, 0.0), 0.5);
}

/// Laplace problem whose boundary values scale with a parameter.
fn scaled_laplace() -> (Model, FieldHandle, ParameterId, Formulation) {
    let mut model = Model::new(create_unit_square_quad_mesh(3));
    let u = model.add_field("u", "h1");
    let scale = model.add_parameter("scale", 0.0);
    let value = model.parameter_expr(scale) * (1.0 + x());
    model.set_constraint_value(&u, RegionId(2), value);
    let mut formulation = Formulation::new();
    formulation.add_term(RegionId(1), dot(&grad(&u.dof()), &grad(&u.tf())));
    (model, u, scale, formulation)
}

fn integral_of(u: FieldHandle) -> impl FnMut(&Model) -> eyre::Result<f64> {
    move |model: &Model| model.integrate(RegionId(1), &u.value().into_scalar(), 2)
}

#[test]
fn linear_problem_converges_in_two_iterations() {
    let (mut model, u, scale, formulation) = scaled_laplace();
    let report = solve_nonlinear(
        &mut model,
        &formulation,
        &mut SparseCholesky,
        NonlinearSettings::default(),
        |model, s| model.set_parameter(scale, s),
        integral_of(u),
    )
    .unwrap();

    assert!(report.converged());
    assert_eq!(report.iterations, 2);
    assert_eq!(report.ramp_steps, 1);
    assert_eq!(report.parameter, 1.0);
    assert_eq!(report.history[0].change, 1.0);
    assert_eq!(report.final_change(), Some(0.0));
    // u = 1 + x is harmonic and integrates to 3/2
    assert_scalar_eq!(report.history[1].measure, 1.5, comp = abs, tol = 1e-12);
}

#[test]
fn ramped_problem_visits_every_parameter_value() {
    let (mut model, u, scale, formulation) = scaled_laplace();
    let settings = NonlinearSettings {
        initial: 0.0,
        target: 1.0,
        increment: 0.25,
        ..Default::default()
    };
    let mut observed = Vec::new();
    let report = {
        let mut solver = RampedSolver::new(settings).with_observer(|_, record| observed.push(record.parameter));
        let report = solver
            .solve(
                &mut model,
                &formulation,
                &mut SparseCholesky,
                |model, s| model.set_parameter(scale, s),
                integral_of(u),
            )
            .unwrap();
        assert_eq!(solver.state(), NonlinearState::Converged);
        report
    };

    assert!(report.converged());
    assert_eq!(report.ramp_steps, 4);
    assert_eq!(report.iterations, 5);
    assert_eq!(observed, vec![0.25, 0.5, 0.75, 1.0, 1.0]);
    let changes: Vec<f64> = report.history.iter().map(|record| record.change).collect();
    for (change, expected) in changes.iter().zip([1.0, 0.5, 1.0 / 3.0, 0.25, 0.0]) {
        assert_scalar_eq!(*change, expected, comp = abs, tol = 1e-10);
    }
    assert!(report.history.iter().all(|record| record.num_unknowns == 4));
}

#[test]
fn iteration_limit_is_reported_as_divergence() {
    let (mut model, u, scale, formulation) = scaled_laplace();
    let settings = NonlinearSettings {
        initial: 0.0,
        target: 1.0,
        increment: 0.25,
        max_iterations: 2,
        ..Default::default()
    };
    let report = solve_nonlinear(
        &mut model,
        &formulation,
        &mut SparseCholesky,
        settings,
        |model, s| model.set_parameter(scale, s),
        integral_of(u),
    )
    .unwrap();
    assert_eq!(report.outcome, NonlinearOutcome::Diverged(DivergenceReason::IterationLimit));
    assert_eq!(report.iterations, 2);
    assert_eq!(report.parameter, 0.5);
    assert!(!report.converged());
}

#[test]
fn stagnating_change_is_reported_as_divergence() {
    let (mut model, _, _, formulation) = scaled_laplace();
    let settings = NonlinearSettings {
        stagnation_window: Some(3),
        ..Default::default()
    };
    // Alternates between 1 and 2, so every iteration has a relative change of 1/2
    let mut calls = 0;
    let measure = |_: &Model| {
        calls += 1;
        Ok(if calls % 2 == 1 { 1.0 } else { 2.0 })
    };
    let report = solve_nonlinear(&mut model, &formulation, &mut SparseCholesky, settings, |_, _| {}, measure).unwrap();
    assert_eq!(report.outcome, NonlinearOutcome::Diverged(DivergenceReason::Stagnation));
    assert_eq!(report.iterations, 4);
}

#[test]
fn time_limit_is_reported_as_divergence() {
    let (mut model, u, scale, formulation) = scaled_laplace();
    let settings = NonlinearSettings {
        time_limit: Some(Duration::ZERO),
        ..Default::default()
    };
    // The field starts at zero, so the first solve changes the measure by 1
    let report = solve_nonlinear(
        &mut model,
        &formulation,
        &mut SparseCholesky,
        settings,
        |model, s| model.set_parameter(scale, s),
        integral_of(u),
    )
    .unwrap();
    assert_eq!(report.outcome, NonlinearOutcome::Diverged(DivergenceReason::TimeLimit));
    assert_eq!(report.iterations, 1);
    assert_eq!(report.final_change(), Some(1.0));
}

#[test]
fn measure_failures_abort_the_iteration() {
    let (mut model, _, _, formulation) = scaled_laplace();
    let result = solve_nonlinear(
        &mut model,
        &formulation,
        &mut SparseCholesky,
        NonlinearSettings::default(),
        |_, _| {},
        |_| Err(eyre::eyre!("measure unavailable")),
    );
    let err = result.unwrap_err();
    assert_eq!(err.iteration, 1);
    assert_eq!(err.parameter, 1.0);
    assert!(matches!(err.source, SolveError::Measure(_)));
}

#[test]
fn settings_deserialize_with_defaults() {
    let json = r#"{ "initial": 0.1, "target": 0.3, "increment": 0.008 }"#;
    let settings: NonlinearSettings = serde_json::from_str(json).unwrap();
    assert_eq!(settings.initial, 0.1);
    assert_eq!(settings.target, 0.3);
    assert_eq!(settings.increment, 0.008);
    assert_eq!(settings.tolerance, NonlinearSettings::default().tolerance);
    assert_eq!(settings.stagnation_window, Some(10));
    assert_eq!(settings.time_limit, None);

    let round_trip: NonlinearSettings = serde_json::from_str(&serde_json::to_string(&settings).unwrap()).unwrap();
    assert_eq!(round_trip, settings);
}
