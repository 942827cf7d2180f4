use crate::expression::{apply_binary, apply_unary, Expr, Leaf, ParameterId};

/// Point-wise values of the leaves of an expression.
pub trait Environment {
    fn coordinate(&self, direction: usize) -> f64;

    /// # Panics
    ///
    /// Implementations panic if no normal is defined at the point.
    fn normal(&self, direction: usize) -> f64;

    fn parameter(&self, parameter: ParameterId) -> f64;

    fn field(&self, leaf: &Leaf) -> f64;
}

/// Evaluates a placeholder-free expression.
///
/// # Panics
///
/// Panics if the expression contains a `dof` or `tf` placeholder.
pub fn evaluate(expr: &Expr, env: &dyn Environment) -> f64 {
    match expr {
        Expr::Constant(value) => *value,
        Expr::Coordinate(direction) => env.coordinate(*direction),
        Expr::Normal(direction) => env.normal(*direction),
        Expr::Parameter(parameter) => env.parameter(*parameter),
        Expr::Field(leaf) => env.field(leaf),
        Expr::Dof(_) | Expr::Test(_) => {
            panic!("cannot evaluate an expression containing dof or tf placeholders")
        }
        Expr::Unary(op, operand) => apply_unary(*op, evaluate(operand, env)),
        Expr::Binary(op, lhs, rhs) => apply_binary(*op, evaluate(lhs, env), evaluate(rhs, env)),
    }
}
