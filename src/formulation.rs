//! Weak formulations: ordered sums of integral terms.

use crate::expression::{Array, Expr};
use crate::region::RegionId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TermKind {
    /// Contributes to the system matrix and right-hand side.
    #[default]
    Stiffness,
    /// Contributes to the mass matrix of generalized eigenvalue problems.
    Mass,
}

/// An integral `int_region integrand`.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub region: RegionId,
    pub integrand: Expr,
    pub kind: TermKind,
    /// Added to the estimated quadrature degree. May be negative.
    pub integration_order_delta: i32,
}

impl Term {
    pub fn new(region: RegionId, integrand: impl Into<Array>) -> Self {
        Self {
            region,
            integrand: integrand.into().into_scalar(),
            kind: TermKind::Stiffness,
            integration_order_delta: 0,
        }
    }

    pub fn with_kind(self, kind: TermKind) -> Self {
        Self { kind, ..self }
    }

    pub fn with_integration_order_delta(self, delta: i32) -> Self {
        Self {
            integration_order_delta: delta,
            ..self
        }
    }
}

/// The system convention is `sum of terms = 0` for every test function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formulation {
    terms: Vec<Term>,
}

impl Formulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `int_region integrand` to the formulation.
    ///
    /// # Panics
    ///
    /// Panics if the integrand is not scalar.
    pub fn add_term(&mut self, region: RegionId, integrand: impl Into<Array>) -> &mut Self {
        self.terms.push(Term::new(region, integrand));
        self
    }

    /// Appends a mass term for generalized eigenvalue problems.
    pub fn add_mass_term(&mut self, region: RegionId, integrand: impl Into<Array>) -> &mut Self {
        self.terms
            .push(Term::new(region, integrand).with_kind(TermKind::Mass));
        self
    }

    pub fn push(&mut self, term: Term) -> &mut Self {
        self.terms.push(term);
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
