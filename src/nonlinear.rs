//! Ramped fixed-point iteration for nonlinear formulations.
//!
//! Every iteration moves a scalar load parameter toward its target, reassembles the
//! formulation around the current field values, solves the linearized system and measures
//! the relative change of a scalar measure of the solution. The loop converges once the
//! parameter has reached its target and the change has dropped below the tolerance.

use crate::assembly::{Assembler, LinearSystem};
use crate::error::{NonlinearSolveError, SolveError};
use crate::formulation::Formulation;
use crate::model::Model;
use crate::solve::LinearSolver;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearSettings {
    /// The parameter value before the first ramp step.
    pub initial: f64,
    pub target: f64,
    /// Largest change of the parameter per iteration.
    pub increment: f64,
    /// The parameter snaps to the target once the remaining distance is within
    /// `increment + ramp_epsilon`.
    pub ramp_epsilon: f64,
    /// Tolerance on the relative change of the measure.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub time_limit: Option<Duration>,
    /// Diverge once the change at the target has not reached a new minimum for this many
    /// consecutive iterations.
    pub stagnation_window: Option<usize>,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        Self {
            initial: 1.0,
            target: 1.0,
            increment: 1.0,
            ramp_epsilon: 1e-12,
            tolerance: 1e-10,
            max_iterations: 100,
            time_limit: None,
            stagnation_window: Some(10),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NonlinearState {
    Ramping,
    Assembling,
    Solving,
    Converged,
    Diverged,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivergenceReason {
    IterationLimit,
    TimeLimit,
    Stagnation,
}

impl Display for DivergenceReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationLimit => write!(f, "iteration limit reached"),
            Self::TimeLimit => write!(f, "time limit reached"),
            Self::Stagnation => write!(f, "relative change stagnated"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum NonlinearOutcome {
    Converged,
    Diverged(DivergenceReason),
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub parameter: f64,
    /// The measure after the solve.
    pub measure: f64,
    pub change: f64,
    pub num_unknowns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonlinearReport {
    pub outcome: NonlinearOutcome,
    pub iterations: usize,
    /// Number of distinct parameter values the formulation was assembled with.
    pub ramp_steps: usize,
    /// The parameter value of the last iteration.
    pub parameter: f64,
    pub history: Vec<IterationRecord>,
}

impl NonlinearReport {
    pub fn converged(&self) -> bool {
        self.outcome == NonlinearOutcome::Converged
    }

    /// The relative change of the last iteration.
    pub fn final_change(&self) -> Option<f64> {
        self.history.last().map(|record| record.change)
    }
}

/// Moves `current` toward `target` by at most `increment`, snapping to the target when the
/// remaining distance is within `increment + epsilon`.
pub fn ramp(current: f64, target: f64, increment: f64, epsilon: f64) -> f64 {
    let remaining = target - current;
    if remaining.abs() <= increment.abs() + epsilon {
        target
    } else {
        current + increment.abs().copysign(remaining)
    }
}

/// `|after - before| / |after|`, or the absolute change if `after` is zero.
pub fn relative_change(before: f64, after: f64) -> f64 {
    let difference = (after - before).abs();
    if after == 0.0 {
        difference
    } else {
        difference / after.abs()
    }
}

/// Drives the ramped iteration.
pub struct RampedSolver<'a> {
    settings: NonlinearSettings,
    assembler: Assembler,
    observer: Option<Box<dyn FnMut(&Model, &IterationRecord) + 'a>>,
    state: NonlinearState,
}

impl<'a> RampedSolver<'a> {
    pub fn new(settings: NonlinearSettings) -> Self {
        Self {
            settings,
            assembler: Assembler::default(),
            observer: None,
            state: NonlinearState::Ramping,
        }
    }

    pub fn with_assembler(self, assembler: Assembler) -> Self {
        Self { assembler, ..self }
    }

    /// Registers a callback invoked after every iteration, e.g. to write intermediate output.
    pub fn with_observer(self, observer: impl FnMut(&Model, &IterationRecord) + 'a) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            ..self
        }
    }

    pub fn settings(&self) -> &NonlinearSettings {
        &self.settings
    }

    /// The state the solver is in, or stopped in.
    pub fn state(&self) -> NonlinearState {
        self.state
    }

    /// Iterates until convergence or divergence.
    ///
    /// `apply` receives the ramped parameter before every assembly and typically updates a
    /// constraint value or a model parameter. `measure` computes the scalar used for the
    /// convergence check, e.g. an integrated norm of a field.
    ///
    /// Failures of assembly, of the linear solver or of the measure abort the iteration with an
    /// error. Divergence is reported in the returned report, with the fields holding the last
    /// iterate.
    pub fn solve(
        &mut self,
        model: &mut Model,
        formulation: &Formulation,
        linear_solver: &mut dyn LinearSolver,
        mut apply: impl FnMut(&mut Model, f64),
        mut measure: impl FnMut(&Model) -> eyre::Result<f64>,
    ) -> Result<NonlinearReport, NonlinearSolveError> {
        let settings = self.settings;
        let start = Instant::now();
        let mut parameter = settings.initial;
        let mut previous_parameter = None;
        let mut ramp_steps = 0;
        let mut history = Vec::new();
        let mut best_change = f64::INFINITY;
        let mut stalled = 0;

        let report = |outcome, parameter, ramp_steps, history: Vec<IterationRecord>| NonlinearReport {
            outcome,
            iterations: history.len(),
            ramp_steps,
            parameter,
            history,
        };

        for iteration in 1..=settings.max_iterations {
            self.state = NonlinearState::Ramping;
            parameter = ramp(parameter, settings.target, settings.increment, settings.ramp_epsilon);
            if previous_parameter != Some(parameter) {
                ramp_steps += 1;
                debug!("Ramped parameter to {}", parameter);
            }
            previous_parameter = Some(parameter);
            apply(model, parameter);
            let fail = |source: SolveError| NonlinearSolveError {
                iteration,
                parameter,
                source,
            };
            let before = measure(model).map_err(|err| fail(SolveError::Measure(err)))?;

            self.state = NonlinearState::Assembling;
            let LinearSystem {
                matrix,
                rhs,
                numbering,
            } = self
                .assembler
                .assemble(model, formulation)
                .map_err(|err| fail(SolveError::Assembly(err)))?;
            debug!(
                "Iteration {}: {} unknowns, {} non-zeros",
                iteration,
                numbering.num_unknowns(),
                matrix.nnz()
            );

            self.state = NonlinearState::Solving;
            let solution = linear_solver
                .solve(&matrix, &rhs)
                .map_err(|err| fail(err.into()))?;
            numbering.write_solution(model.fields_mut(), &solution);

            let after = measure(model).map_err(|err| fail(SolveError::Measure(err)))?;
            let change = relative_change(before, after);
            info!(
                "Iteration {}: parameter {}, relative change {:e}",
                iteration, parameter, change
            );

            let record = IterationRecord {
                iteration,
                parameter,
                measure: after,
                change,
                num_unknowns: numbering.num_unknowns(),
            };
            if let Some(observer) = &mut self.observer {
                observer(model, &record);
            }
            history.push(record);

            let at_target = parameter == settings.target;
            if at_target && change < settings.tolerance {
                self.state = NonlinearState::Converged;
                info!("Converged after {} iterations", iteration);
                return Ok(report(NonlinearOutcome::Converged, parameter, ramp_steps, history));
            }

            let mut divergence = None;
            if at_target {
                if change < best_change {
                    best_change = change;
                    stalled = 0;
                } else {
                    stalled += 1;
                    if settings
                        .stagnation_window
                        .map_or(false, |window| stalled >= window)
                    {
                        divergence = Some(DivergenceReason::Stagnation);
                    }
                }
            }
            if divergence.is_none()
                && settings
                    .time_limit
                    .map_or(false, |limit| start.elapsed() >= limit)
            {
                divergence = Some(DivergenceReason::TimeLimit);
            }
            if let Some(reason) = divergence {
                self.state = NonlinearState::Diverged;
                info!("Diverged after {} iterations: {}", iteration, reason);
                return Ok(report(NonlinearOutcome::Diverged(reason), parameter, ramp_steps, history));
            }
        }

        self.state = NonlinearState::Diverged;
        info!("Diverged: {}", DivergenceReason::IterationLimit);
        Ok(report(
            NonlinearOutcome::Diverged(DivergenceReason::IterationLimit),
            parameter,
            ramp_steps,
            history,
        ))
    }
}

/// Runs a [`RampedSolver`] with the given settings.
pub fn solve_nonlinear(
    model: &mut Model,
    formulation: &Formulation,
    linear_solver: &mut dyn LinearSolver,
    settings: NonlinearSettings,
    apply: impl FnMut(&mut Model, f64),
    measure: impl FnMut(&Model) -> eyre::Result<f64>,
) -> Result<NonlinearReport, NonlinearSolveError> {
    RampedSolver::new(settings).solve(model, formulation, linear_solver, apply, measure)
}
