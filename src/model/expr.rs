//! Nonlinear expression trees attached to objectives and constraints.
//!
//! The tree is what a model reader hands over for everything that is not a
//! plain linear term list. The engine only inspects its structure
//! (see [`crate::unzip`] and [`crate::classify`]); evaluation exists so callers
//! and tests can check a point against the original element.

use super::VarId;

/// Single-argument functions understood by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFunc {
    Abs,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
}

impl UnaryFunc {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            UnaryFunc::Abs => value.abs(),
            UnaryFunc::Exp => value.exp(),
            UnaryFunc::Log => value.ln(),
            UnaryFunc::Sin => value.sin(),
            UnaryFunc::Cos => value.cos(),
            UnaryFunc::Tan => value.tan(),
        }
    }
}

/// Relational operators appearing in logical expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// Expression tree node.
///
/// Variables are referenced by [`VarId`]. Logical nodes (`And`, `Or`, `Not`,
/// `Compare`, `Implies`) take the value 1.0 when true and 0.0 otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(VarId),
    Neg(Box<Expr>),
    Sum(Vec<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Unary(UnaryFunc, Box<Expr>),
    /// Logarithm with a constant base.
    LogA(f64, Box<Expr>),
    Max(Vec<Expr>),
    Min(Vec<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare(Relation, Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    /// Call to a named external function. Never matched by any pattern.
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn var(id: VarId) -> Self {
        Expr::Var(id)
    }

    pub fn abs(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Abs, Box::new(arg.into()))
    }

    pub fn exp(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Exp, Box::new(arg.into()))
    }

    pub fn log(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Log, Box::new(arg.into()))
    }

    pub fn log_a(base: f64, arg: impl Into<Expr>) -> Self {
        Expr::LogA(base, Box::new(arg.into()))
    }

    pub fn sin(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Sin, Box::new(arg.into()))
    }

    pub fn cos(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Cos, Box::new(arg.into()))
    }

    pub fn tan(arg: impl Into<Expr>) -> Self {
        Expr::Unary(UnaryFunc::Tan, Box::new(arg.into()))
    }

    pub fn pow(base: impl Into<Expr>, exponent: impl Into<Expr>) -> Self {
        Expr::Pow(Box::new(base.into()), Box::new(exponent.into()))
    }

    pub fn max<I, E>(args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Max(args.into_iter().map(Into::into).collect())
    }

    pub fn min<I, E>(args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Min(args.into_iter().map(Into::into).collect())
    }

    pub fn and<I, E>(args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::And(args.into_iter().map(Into::into).collect())
    }

    pub fn or<I, E>(args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Or(args.into_iter().map(Into::into).collect())
    }

    pub fn not(arg: impl Into<Expr>) -> Self {
        Expr::Not(Box::new(arg.into()))
    }

    pub fn compare(relation: Relation, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Compare(relation, Box::new(lhs.into()), Box::new(rhs.into()))
    }

    pub fn le(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::compare(Relation::Le, lhs, rhs)
    }

    pub fn ge(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::compare(Relation::Ge, lhs, rhs)
    }

    pub fn equals(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::compare(Relation::Eq, lhs, rhs)
    }

    pub fn implies(condition: impl Into<Expr>, consequence: impl Into<Expr>) -> Self {
        Expr::Implies(Box::new(condition.into()), Box::new(consequence.into()))
    }

    pub fn call<I, E>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Call(name.into(), args.into_iter().map(Into::into).collect())
    }

    /// Value of a constant node, looking through negation.
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Const(value) => Some(*value),
            Expr::Neg(inner) => inner.as_constant().map(|value| -value),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self {
            Expr::Var(id) => Some(*id),
            _ => None,
        }
    }

    /// Evaluate the expression at `point`, indexed by variable.
    ///
    /// Variables outside `point` evaluate to NaN. External calls have no
    /// known semantics and also evaluate to NaN.
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        let truth = |flag: bool| if flag { 1.0 } else { 0.0 };
        match self {
            Expr::Const(value) => *value,
            Expr::Var(id) => point.get(id.index()).copied().unwrap_or(f64::NAN),
            Expr::Neg(inner) => -inner.evaluate(point),
            Expr::Sum(items) => items.iter().map(|item| item.evaluate(point)).sum(),
            Expr::Mul(lhs, rhs) => lhs.evaluate(point) * rhs.evaluate(point),
            Expr::Div(lhs, rhs) => lhs.evaluate(point) / rhs.evaluate(point),
            Expr::Pow(base, exponent) => base.evaluate(point).powf(exponent.evaluate(point)),
            Expr::Unary(func, arg) => func.apply(arg.evaluate(point)),
            Expr::LogA(base, arg) => arg.evaluate(point).ln() / base.ln(),
            Expr::Max(items) => items
                .iter()
                .map(|item| item.evaluate(point))
                .fold(f64::NEG_INFINITY, f64::max),
            Expr::Min(items) => items
                .iter()
                .map(|item| item.evaluate(point))
                .fold(f64::INFINITY, f64::min),
            Expr::And(items) => truth(items.iter().all(|item| item.evaluate(point) != 0.0)),
            Expr::Or(items) => truth(items.iter().any(|item| item.evaluate(point) != 0.0)),
            Expr::Not(inner) => truth(inner.evaluate(point) == 0.0),
            Expr::Compare(relation, lhs, rhs) => {
                let (lhs, rhs) = (lhs.evaluate(point), rhs.evaluate(point));
                truth(match relation {
                    Relation::Le => lhs <= rhs,
                    Relation::Ge => lhs >= rhs,
                    Relation::Eq => lhs == rhs,
                })
            }
            Expr::Implies(condition, consequence) => {
                truth(condition.evaluate(point) == 0.0 || consequence.evaluate(point) != 0.0)
            }
            Expr::Call(..) => f64::NAN,
        }
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::Var(id)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}
