use crate::expression::{BinaryOp, Expr, Leaf, UnaryOp};
use crate::field::FieldId;

/// A product `coefficient * unknown * test` of a linearized integrand.
///
/// The coefficient never contains placeholders. A monomial without an unknown contributes to
/// the right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Monomial {
    pub coefficient: Expr,
    pub unknown: Option<Leaf>,
    pub test: Option<Leaf>,
}

impl Monomial {
    fn scalar(coefficient: Expr) -> Self {
        Self {
            coefficient,
            unknown: None,
            test: None,
        }
    }

    fn multiply(&self, other: &Monomial) -> Monomial {
        let unknown = match (self.unknown, other.unknown) {
            (Some(_), Some(_)) => panic!("integrand contains a product of two unknown placeholders"),
            (a, b) => a.or(b),
        };
        let test = match (self.test, other.test) {
            (Some(_), Some(_)) => panic!("integrand contains a product of two test placeholders"),
            (a, b) => a.or(b),
        };
        Monomial {
            coefficient: &self.coefficient * &other.coefficient,
            unknown,
            test,
        }
    }

    /// Estimated polynomial degree of the monomial over a face.
    pub fn degree(&self, leaf_degree: &dyn Fn(FieldId) -> u32) -> u32 {
        estimate_degree(&self.coefficient, leaf_degree)
            + self.unknown.map_or(0, |leaf| leaf_degree(leaf.field))
            + self.test.map_or(0, |leaf| leaf_degree(leaf.field))
    }
}

fn expand(expr: &Expr) -> Vec<Monomial> {
    if !expr.has_placeholder() {
        return vec![Monomial::scalar(expr.clone())];
    }
    match expr {
        Expr::Dof(leaf) => vec![Monomial {
            coefficient: Expr::Constant(1.0),
            unknown: Some(*leaf),
            test: None,
        }],
        Expr::Test(leaf) => vec![Monomial {
            coefficient: Expr::Constant(1.0),
            unknown: None,
            test: Some(*leaf),
        }],
        Expr::Unary(UnaryOp::Neg, operand) => negate(expand(operand)),
        Expr::Unary(op, _) => panic!("integrand applies {:?} to a placeholder", op),
        Expr::Binary(BinaryOp::Add, lhs, rhs) => {
            let mut terms = expand(lhs);
            terms.extend(expand(rhs));
            terms
        }
        Expr::Binary(BinaryOp::Sub, lhs, rhs) => {
            let mut terms = expand(lhs);
            terms.extend(negate(expand(rhs)));
            terms
        }
        Expr::Binary(BinaryOp::Mul, lhs, rhs) => {
            let (lhs, rhs) = (expand(lhs), expand(rhs));
            lhs.iter()
                .flat_map(|a| rhs.iter().map(move |b| a.multiply(b)))
                .collect()
        }
        Expr::Binary(BinaryOp::Div, lhs, rhs) => {
            assert!(!rhs.has_placeholder(), "integrand divides by a placeholder");
            expand(lhs)
                .into_iter()
                .map(|term| Monomial {
                    coefficient: term.coefficient / rhs.as_ref().clone(),
                    ..term
                })
                .collect()
        }
        Expr::Binary(BinaryOp::Pow, _, _) => panic!("integrand raises a placeholder to a power"),
        _ => unreachable!("leaf without placeholder"),
    }
}

fn negate(terms: Vec<Monomial>) -> Vec<Monomial> {
    terms
        .into_iter()
        .map(|term| Monomial {
            coefficient: -term.coefficient,
            ..term
        })
        .collect()
}

/// Expands an integrand into monomials, merging monomials with the same placeholders.
///
/// Monomials are returned in order of first appearance.
///
/// # Panics
///
/// Panics if the integrand is not linear in the unknown and in the test placeholders, or if
/// a monomial has no test placeholder.
pub fn linearize(integrand: &Expr) -> Vec<Monomial> {
    let mut merged: Vec<Monomial> = Vec::new();
    for term in expand(integrand) {
        assert!(
            term.test.is_some(),
            "integrand contains a term without a test function placeholder"
        );
        match merged
            .iter_mut()
            .find(|m| m.unknown == term.unknown && m.test == term.test)
        {
            Some(existing) => existing.coefficient = &existing.coefficient + &term.coefficient,
            None => merged.push(term),
        }
    }
    merged.retain(|m| m.coefficient != Expr::Constant(0.0));
    merged
}

/// Estimates the polynomial degree of an expression over a face.
///
/// `leaf_degree` gives the basis degree of a field. Non-polynomial functions keep the degree
/// of their argument.
pub fn estimate_degree(expr: &Expr, leaf_degree: &dyn Fn(FieldId) -> u32) -> u32 {
    match expr {
        Expr::Constant(_) | Expr::Normal(_) | Expr::Parameter(_) => 0,
        Expr::Coordinate(_) => 1,
        Expr::Field(leaf) | Expr::Dof(leaf) | Expr::Test(leaf) => leaf_degree(leaf.field),
        Expr::Unary(_, operand) => estimate_degree(operand, leaf_degree),
        Expr::Binary(op, lhs, rhs) => {
            let (a, b) = (estimate_degree(lhs, leaf_degree), estimate_degree(rhs, leaf_degree));
            match op {
                BinaryOp::Add | BinaryOp::Sub => a.max(b),
                BinaryOp::Mul | BinaryOp::Div => a + b,
                BinaryOp::Pow => match rhs.as_ref() {
                    Expr::Constant(n) if *n >= 0.0 && n.fract() == 0.0 => a.saturating_mul(*n as u32),
                    _ => a + 2,
                },
            }
        }
    }
}
