//! Preconditioned BiCGStab for general (non-symmetric) operators.
//!
//! Uses right preconditioning, so the tracked residual is the true residual of `A x = b`
//! up to round-off.

use crate::{apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput, StoppingCriterion};
use log::trace;
use nalgebra::DVector;

const BREAKDOWN_THRESHOLD: f64 = 1e-300;

#[derive(Debug, Clone)]
pub struct BiCgStabWorkspace {
    r: DVector<f64>,
    // Shadow residual, fixed for the whole solve
    r0: DVector<f64>,
    p: DVector<f64>,
    v: DVector<f64>,
    s: DVector<f64>,
    t: DVector<f64>,
    p_hat: DVector<f64>,
    s_hat: DVector<f64>,
}

impl Default for BiCgStabWorkspace {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            r0: DVector::zeros(0),
            p: DVector::zeros(0),
            v: DVector::zeros(0),
            s: DVector::zeros(0),
            t: DVector::zeros(0),
            p_hat: DVector::zeros(0),
            s_hat: DVector::zeros(0),
        }
    }
}

impl BiCgStabWorkspace {
    fn resize(&mut self, dim: usize) {
        for buffer in [
            &mut self.r,
            &mut self.r0,
            &mut self.p,
            &mut self.v,
            &mut self.s,
            &mut self.t,
            &mut self.p_hat,
            &mut self.s_hat,
        ] {
            buffer.resize_vertically_mut(dim, 0.0);
            buffer.fill(0.0);
        }
    }
}

#[derive(Debug)]
pub struct BiCgStab<A, P> {
    operator: A,
    preconditioner: P,
    criterion: StoppingCriterion,
    workspace: BiCgStabWorkspace,
}

impl<A: LinearOperator> BiCgStab<A, IdentityOperator> {
    pub fn new(operator: A) -> Self {
        Self {
            operator,
            preconditioner: IdentityOperator,
            criterion: StoppingCriterion::default(),
            workspace: BiCgStabWorkspace::default(),
        }
    }
}

impl<A, P> BiCgStab<A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiCgStab<A, P2> {
        BiCgStab {
            operator: self.operator,
            preconditioner,
            criterion: self.criterion,
            workspace: self.workspace,
        }
    }

    pub fn with_stopping_criterion(self, criterion: StoppingCriterion) -> Self {
        Self { criterion, ..self }
    }
}

impl<A, P> BiCgStab<A, P>
where
    A: LinearOperator,
    P: LinearOperator,
{
    /// Solves `A x = b`, using the contents of `x` as initial guess.
    pub fn solve_with_guess(&mut self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<SolveOutput, SolveError> {
        use SolveErrorKind::*;
        let mut output = SolveOutput {
            num_iterations: 0,
            residual_norm: 0.0,
        };
        if b.len() != x.len() {
            let kind = DimensionMismatch {
                rows: x.len(),
                rhs: b.len(),
            };
            return Err(SolveError::new(output, kind));
        }

        self.workspace.resize(x.len());
        let BiCgStabWorkspace {
            r,
            r0,
            p,
            v,
            s,
            t,
            p_hat,
            s_hat,
        } = &mut self.workspace;

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(output);
        }
        let threshold = self.criterion.threshold(b_norm);

        apply_operator(r, &self.operator, &*x);
        r.zip_apply(b, |ax_i, b_i| *ax_i = b_i - *ax_i);
        r0.copy_from(&*r);
        output.residual_norm = r.norm();
        if output.residual_norm <= threshold {
            return Ok(output);
        }

        let mut rho = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;

        while output.num_iterations < self.criterion.max_iterations {
            let rho_next = r0.dot(&*r);
            if rho_next.abs() < BREAKDOWN_THRESHOLD {
                return Err(SolveError::new(output, Breakdown));
            }

            if output.num_iterations == 0 {
                p.copy_from(&*r);
            } else {
                let beta = (rho_next / rho) * (alpha / omega);
                // p <- r + beta * (p - omega * v)
                p.axpy(-omega, &*v, 1.0);
                p.axpy(1.0, &*r, beta);
            }

            apply_operator(p_hat, &self.preconditioner, &*p);
            apply_operator(v, &self.operator, &*p_hat);
            let r0v = r0.dot(&*v);
            if r0v.abs() < BREAKDOWN_THRESHOLD {
                return Err(SolveError::new(output, Breakdown));
            }
            alpha = rho_next / r0v;

            // s = r - alpha * v
            s.copy_from(&*r);
            s.axpy(-alpha, &*v, 1.0);
            let s_norm = s.norm();
            if s_norm <= threshold {
                x.axpy(alpha, &*p_hat, 1.0);
                output.num_iterations += 1;
                output.residual_norm = s_norm;
                trace!("BiCGStab iter {}: residual = {:.6e}", output.num_iterations, s_norm);
                return Ok(output);
            }

            apply_operator(s_hat, &self.preconditioner, &*s);
            apply_operator(t, &self.operator, &*s_hat);
            let tt = t.dot(&*t);
            if tt < BREAKDOWN_THRESHOLD {
                return Err(SolveError::new(output, Breakdown));
            }
            omega = t.dot(&*s) / tt;

            x.axpy(alpha, &*p_hat, 1.0);
            x.axpy(omega, &*s_hat, 1.0);
            // r = s - omega * t
            r.copy_from(&*s);
            r.axpy(-omega, &*t, 1.0);

            output.num_iterations += 1;
            output.residual_norm = r.norm();
            trace!("BiCGStab iter {}: residual = {:.6e}", output.num_iterations, output.residual_norm);
            if output.residual_norm <= threshold {
                return Ok(output);
            }
            if omega.abs() < BREAKDOWN_THRESHOLD {
                return Err(SolveError::new(output, Breakdown));
            }
            rho = rho_next;
        }

        let max_iter = self.criterion.max_iterations;
        Err(SolveError::new(output, MaxIterationsReached { max_iter }))
    }
}
