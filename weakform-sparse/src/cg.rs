//! Preconditioned conjugate gradient for symmetric positive definite operators.

use crate::{apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput, StoppingCriterion};
use log::trace;
use nalgebra::DVector;

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace {
    r: DVector<f64>,
    z: DVector<f64>,
    p: DVector<f64>,
    Ap: DVector<f64>,
}

impl Default for CgWorkspace {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl CgWorkspace {
    fn resize(&mut self, dim: usize) {
        self.r.resize_vertically_mut(dim, 0.0);
        self.z.resize_vertically_mut(dim, 0.0);
        self.p.resize_vertically_mut(dim, 0.0);
        self.Ap.resize_vertically_mut(dim, 0.0);
    }
}

#[derive(Debug)]
pub struct ConjugateGradient<A, P> {
    operator: A,
    preconditioner: P,
    criterion: StoppingCriterion,
    workspace: CgWorkspace,
}

impl<A: LinearOperator> ConjugateGradient<A, IdentityOperator> {
    pub fn new(operator: A) -> Self {
        Self {
            operator,
            preconditioner: IdentityOperator,
            criterion: StoppingCriterion::default(),
            workspace: CgWorkspace::default(),
        }
    }
}

impl<A, P> ConjugateGradient<A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<A, P2> {
        ConjugateGradient {
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

impl<A, P> ConjugateGradient<A, P>
where
    A: LinearOperator,
    P: LinearOperator,
{
    /// Solves `A x = b`, using the contents of `x` as initial guess.
    #[allow(non_snake_case)]
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
        let CgWorkspace { r, z, p, Ap } = &mut self.workspace;

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(output);
        }
        let threshold = self.criterion.threshold(b_norm);

        // r = b - Ax
        apply_operator(r, &self.operator, &*x);
        r.zip_apply(b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);
        // z = Pr
        apply_operator(z, &self.preconditioner, &*r);
        p.copy_from(&*z);
        let mut zTr = z.dot(&*r);

        loop {
            output.residual_norm = r.norm();
            trace!("CG iter {}: residual = {:.6e}", output.num_iterations, output.residual_norm);
            if output.residual_norm <= threshold {
                return Ok(output);
            }
            if output.num_iterations >= self.criterion.max_iterations {
                let max_iter = self.criterion.max_iterations;
                return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
            }

            apply_operator(Ap, &self.operator, &*p);
            let pAp = p.dot(&*Ap);
            if pAp <= 0.0 {
                return Err(SolveError::new(output, IndefiniteOperator));
            }
            if zTr <= 0.0 {
                return Err(SolveError::new(output, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            x.axpy(alpha, &*p, 1.0);
            r.axpy(-alpha, &*Ap, 1.0);
            output.num_iterations += 1;

            apply_operator(z, &self.preconditioner, &*r);
            let zTr_next = z.dot(&*r);
            let beta = zTr_next / zTr;
            // p <- z + beta * p
            p.zip_apply(&*z, |p_i, z_i| *p_i = z_i + beta * *p_i);
            zTr = zTr_next;
        }
    }
}
