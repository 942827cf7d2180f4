//! Declarative expressions for integrands, constraint values and post-processing.
//!
//! An [`Expr`] is a tagged tree of leaves (constants, coordinates, normals, parameters, field
//! values and the unknown / test placeholders of a weak form) composed by unary and binary
//! nodes. Nothing is evaluated when an expression is built; assembly and the post-processing
//! evaluators interpret the tree at quadrature points.
//!
//! [`Array`] groups expressions into small matrices and provides the differential operators
//! used to write weak forms, e.g. `dot(&grad(&u.dof()), &grad(&u.tf()))`.

use crate::field::{FieldHandle, FieldId};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

mod evaluate;
mod expand;

pub use evaluate::{evaluate, Environment};
pub use expand::{estimate_degree, linearize, Monomial};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterId(pub usize);

/// A field quantity: one value component, optionally differentiated along one direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Leaf {
    pub field: FieldId,
    pub component: usize,
    pub derivative: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Exp,
    Log,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(f64),
    /// Spatial coordinate, `0` for x and `1` for y.
    Coordinate(usize),
    /// Component of the outward unit normal. Only defined on edges.
    Normal(usize),
    Parameter(ParameterId),
    /// The current value of a field.
    Field(Leaf),
    /// Unknown placeholder, `dof(...)`.
    Dof(Leaf),
    /// Test function placeholder, `tf(...)`.
    Test(Leaf),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(value)
    }
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Constant(value)
    }

    pub fn parameter(parameter: ParameterId) -> Self {
        Expr::Parameter(parameter)
    }

    fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(value) => Some(*value),
            _ => None,
        }
    }

    fn is_constant(&self, value: f64) -> bool {
        self.as_constant() == Some(value)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        match (op, operand) {
            (UnaryOp::Neg, Expr::Unary(UnaryOp::Neg, inner)) => *inner,
            (op, Expr::Constant(value)) => Expr::Constant(apply_unary(op, value)),
            (op, operand) => Expr::Unary(op, Box::new(operand)),
        }
    }

    /// Builds a binary node, folding constants and trivial identities.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (lhs.as_constant(), rhs.as_constant()) {
            return Expr::Constant(apply_binary(op, a, b));
        }
        match op {
            BinaryOp::Add if lhs.is_constant(0.0) => rhs,
            BinaryOp::Add | BinaryOp::Sub if rhs.is_constant(0.0) => lhs,
            BinaryOp::Sub if lhs.is_constant(0.0) => -rhs,
            BinaryOp::Mul if lhs.is_constant(0.0) || rhs.is_constant(0.0) => Expr::Constant(0.0),
            BinaryOp::Mul if lhs.is_constant(1.0) => rhs,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow if rhs.is_constant(1.0) => lhs,
            BinaryOp::Div if lhs.is_constant(0.0) => Expr::Constant(0.0),
            BinaryOp::Pow if rhs.is_constant(0.0) => Expr::Constant(1.0),
            _ => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Pow, self, exponent.into())
    }

    pub fn sqrt(self) -> Expr {
        Expr::unary(UnaryOp::Sqrt, self)
    }

    pub fn abs(self) -> Expr {
        Expr::unary(UnaryOp::Abs, self)
    }

    pub fn sin(self) -> Expr {
        Expr::unary(UnaryOp::Sin, self)
    }

    pub fn cos(self) -> Expr {
        Expr::unary(UnaryOp::Cos, self)
    }

    pub fn exp(self) -> Expr {
        Expr::unary(UnaryOp::Exp, self)
    }

    pub fn ln(self) -> Expr {
        Expr::unary(UnaryOp::Log, self)
    }

    /// Calls `f` on every leaf of the tree.
    pub fn visit_leaves<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        match self {
            Expr::Unary(_, operand) => operand.visit_leaves(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit_leaves(f);
                rhs.visit_leaves(f);
            }
            leaf => f(leaf),
        }
    }

    /// Whether the tree contains a `dof` or `tf` placeholder.
    pub fn has_placeholder(&self) -> bool {
        let mut found = false;
        self.visit_leaves(&mut |leaf| found |= matches!(leaf, Expr::Dof(_) | Expr::Test(_)));
        found
    }

    pub fn has_normal(&self) -> bool {
        let mut found = false;
        self.visit_leaves(&mut |leaf| found |= matches!(leaf, Expr::Normal(_)));
        found
    }

    /// Field value leaves of the tree, without duplicates, in order of appearance.
    pub fn field_leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        self.visit_leaves(&mut |leaf| {
            if let Expr::Field(leaf) = leaf {
                if !leaves.contains(leaf) {
                    leaves.push(*leaf);
                }
            }
        });
        leaves
    }

    /// Symbolic partial derivative along the given spatial direction.
    ///
    /// Normals are treated as piecewise constant, which holds on straight edges.
    ///
    /// # Panics
    ///
    /// Panics if a field or placeholder leaf is already differentiated, since second
    /// derivatives are not available.
    pub fn derivative(&self, direction: usize) -> Expr {
        let differentiate_leaf = |leaf: &Leaf| {
            assert!(
                leaf.derivative.is_none(),
                "second derivatives of fields are not supported"
            );
            Leaf {
                derivative: Some(direction),
                ..*leaf
            }
        };
        match self {
            Expr::Constant(_) | Expr::Normal(_) | Expr::Parameter(_) => Expr::Constant(0.0),
            Expr::Coordinate(i) => Expr::Constant(if *i == direction { 1.0 } else { 0.0 }),
            Expr::Field(leaf) => Expr::Field(differentiate_leaf(leaf)),
            Expr::Dof(leaf) => Expr::Dof(differentiate_leaf(leaf)),
            Expr::Test(leaf) => Expr::Test(differentiate_leaf(leaf)),
            Expr::Unary(op, operand) => {
                let a = operand.as_ref().clone();
                let da = operand.derivative(direction);
                match op {
                    UnaryOp::Neg => -da,
                    UnaryOp::Sqrt => da / (2.0 * a.sqrt()),
                    UnaryOp::Abs => da * a.clone() / a.abs(),
                    UnaryOp::Sin => a.cos() * da,
                    UnaryOp::Cos => -(a.sin() * da),
                    UnaryOp::Exp => a.exp() * da,
                    UnaryOp::Log => da / a,
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.as_ref().clone(), rhs.as_ref().clone());
                let (da, db) = (lhs.derivative(direction), rhs.derivative(direction));
                match op {
                    BinaryOp::Add => da + db,
                    BinaryOp::Sub => da - db,
                    BinaryOp::Mul => da * b + a * db,
                    BinaryOp::Div => (da * b.clone() - a * db) / b.pow(2.0),
                    BinaryOp::Pow => match b.as_constant() {
                        Some(n) => n * a.pow(n - 1.0) * da,
                        None => a.clone().pow(b.clone()) * (db * a.clone().ln() + b * da / a),
                    },
                }
            }
        }
    }
}

pub(crate) fn apply_unary(op: UnaryOp, value: f64) -> f64 {
    match op {
        UnaryOp::Neg => -value,
        UnaryOp::Sqrt => value.sqrt(),
        UnaryOp::Abs => value.abs(),
        UnaryOp::Sin => value.sin(),
        UnaryOp::Cos => value.cos(),
        UnaryOp::Exp => value.exp(),
        UnaryOp::Log => value.ln(),
    }
}

pub(crate) fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Pow => a.powf(b),
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

macro_rules! impl_expr_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, Expr::Constant(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::Constant(self), rhs)
            }
        }

        impl<'a> $trait<&'a Expr> for &'a Expr {
            type Output = Expr;

            fn $method(self, rhs: &'a Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs.clone())
            }
        }
    };
}

impl_expr_binary_op!(Add, add, BinaryOp::Add);
impl_expr_binary_op!(Sub, sub, BinaryOp::Sub);
impl_expr_binary_op!(Mul, mul, BinaryOp::Mul);
impl_expr_binary_op!(Div, div, BinaryOp::Div);

/// The x coordinate.
pub fn x() -> Expr {
    Expr::Coordinate(0)
}

/// The y coordinate.
pub fn y() -> Expr {
    Expr::Coordinate(1)
}

/// A small dense matrix of expressions, stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    rows: usize,
    cols: usize,
    entries: Vec<Expr>,
}

impl From<Expr> for Array {
    fn from(expr: Expr) -> Self {
        Array::scalar(expr)
    }
}

impl Array {
    /// # Panics
    ///
    /// Panics if the number of entries does not match the shape.
    pub fn new(rows: usize, cols: usize, entries: Vec<Expr>) -> Self {
        assert_eq!(rows * cols, entries.len(), "array entries do not match its shape");
        Self { rows, cols, entries }
    }

    pub fn scalar(expr: Expr) -> Self {
        Self::new(1, 1, vec![expr])
    }

    pub fn column(entries: Vec<Expr>) -> Self {
        Self::new(entries.len(), 1, entries)
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Expr) -> Self {
        let entries = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| f(i, j))
            .collect();
        Self::new(rows, cols, entries)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Expr] {
        &self.entries
    }

    pub fn entry(&self, i: usize, j: usize) -> &Expr {
        &self.entries[i * self.cols + j]
    }

    /// The single entry of a 1x1 array.
    ///
    /// # Panics
    ///
    /// Panics if the array is not 1x1.
    pub fn into_scalar(self) -> Expr {
        assert!(
            self.rows == 1 && self.cols == 1,
            "expected a scalar expression, got a {}x{} array",
            self.rows,
            self.cols
        );
        self.entries.into_iter().next().unwrap_or(Expr::Constant(0.0))
    }

    pub fn map(&self, f: impl FnMut(&Expr) -> Expr) -> Array {
        Array::new(self.rows, self.cols, self.entries.iter().map(f).collect())
    }

    fn zip_map(&self, other: &Array, mut f: impl FnMut(Expr, Expr) -> Expr) -> Array {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "array shapes {}x{} and {}x{} do not match",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        let entries = self
            .entries
            .iter()
            .zip(&other.entries)
            .map(|(a, b)| f(a.clone(), b.clone()))
            .collect();
        Array::new(self.rows, self.cols, entries)
    }

    pub fn transpose(&self) -> Array {
        Array::from_fn(self.cols, self.rows, |i, j| self.entry(j, i).clone())
    }

    /// # Panics
    ///
    /// Panics if the inner dimensions do not match.
    pub fn matmul(&self, other: &Array) -> Array {
        assert_eq!(self.cols, other.rows, "inner dimensions of array product do not match");
        Array::from_fn(self.rows, other.cols, |i, j| {
            (0..self.cols).fold(Expr::Constant(0.0), |acc, k| {
                acc + self.entry(i, k).clone() * other.entry(k, j).clone()
            })
        })
    }

    /// Pointwise Euclidean (Frobenius) norm.
    pub fn norm(&self) -> Expr {
        dot(self, self).sqrt()
    }

    pub fn derivative(&self, direction: usize) -> Array {
        self.map(|entry| entry.derivative(direction))
    }
}

impl Add for Array {
    type Output = Array;

    fn add(self, rhs: Array) -> Array {
        self.zip_map(&rhs, |a, b| a + b)
    }
}

impl Sub for Array {
    type Output = Array;

    fn sub(self, rhs: Array) -> Array {
        self.zip_map(&rhs, |a, b| a - b)
    }
}

impl Neg for Array {
    type Output = Array;

    fn neg(self) -> Array {
        self.map(|entry| -entry.clone())
    }
}

impl Mul<Expr> for Array {
    type Output = Array;

    fn mul(self, rhs: Expr) -> Array {
        self.map(|entry| entry.clone() * rhs.clone())
    }
}

impl Mul<f64> for Array {
    type Output = Array;

    fn mul(self, rhs: f64) -> Array {
        self * Expr::Constant(rhs)
    }
}

impl Mul<Array> for Expr {
    type Output = Array;

    fn mul(self, rhs: Array) -> Array {
        rhs.map(|entry| self.clone() * entry.clone())
    }
}

impl Mul<Array> for f64 {
    type Output = Array;

    fn mul(self, rhs: Array) -> Array {
        Expr::Constant(self) * rhs
    }
}

/// A 2x1 column.
pub fn array2x1(a: impl Into<Expr>, b: impl Into<Expr>) -> Array {
    Array::column(vec![a.into(), b.into()])
}

/// The outward unit normal as a 2x1 column. Only defined on edges.
pub fn normal() -> Array {
    Array::column(vec![Expr::Normal(0), Expr::Normal(1)])
}

/// Gradient: a scalar becomes a 2x1 column, an `n x 1` column an `n x 2` matrix whose row
/// `i` is the gradient of entry `i`.
///
/// # Panics
///
/// Panics if the argument is not a column.
pub fn grad(array: &Array) -> Array {
    assert_eq!(array.cols(), 1, "grad expects a scalar or a column");
    if array.rows() == 1 {
        Array::column(vec![array.entry(0, 0).derivative(0), array.entry(0, 0).derivative(1)])
    } else {
        Array::from_fn(array.rows(), 2, |i, j| array.entry(i, 0).derivative(j))
    }
}

/// Divergence of the first two entries of a column.
pub fn div(array: &Array) -> Expr {
    assert!(array.cols() == 1 && array.rows() >= 2, "div expects a column with at least 2 entries");
    array.entry(0, 0).derivative(0) + array.entry(1, 0).derivative(1)
}

/// Scalar curl `d v_y / dx - d v_x / dy` of the first two entries of a column.
pub fn curl(array: &Array) -> Expr {
    assert!(array.cols() == 1 && array.rows() >= 2, "curl expects a column with at least 2 entries");
    array.entry(1, 0).derivative(0) - array.entry(0, 0).derivative(1)
}

/// Sum of the entrywise products of two arrays of the same shape.
pub fn dot(a: &Array, b: &Array) -> Expr {
    a.zip_map(b, |a, b| a * b)
        .entries
        .into_iter()
        .fold(Expr::Constant(0.0), |acc, term| acc + term)
}

/// Pointwise Euclidean norm.
pub fn norm(array: &Array) -> Expr {
    array.norm()
}

/// The unknown placeholder of a field.
pub fn dof(field: &FieldHandle) -> Array {
    field.dof()
}

/// The test function placeholder of a field.
pub fn tf(field: &FieldHandle) -> Array {
    field.tf()
}
