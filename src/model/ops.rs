//! Operator overloading for building expression trees
//!
//! Variables, constants and expressions combine with the usual arithmetic
//! operators into an [`Expr`]:
//!
//! ```rust
//! use mpconv::model::{Expr, Model, VariableType};
//!
//! let mut model = Model::new();
//! let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//! let y = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//!
//! let linear = 2.0 * x + 3.0 * y - 5.0;
//! let quadratic = x * x + 2.0 * x;
//! let scaled = (x + y) / 2.0;
//! assert_eq!(linear.evaluate(&[1.0, 1.0]), 0.0);
//! assert_eq!(quadratic.evaluate(&[3.0, 0.0]), 15.0);
//! assert_eq!(scaled.evaluate(&[1.0, 3.0]), 2.0);
//! ```
//!
//! Sums are kept flat: `a + b + c` is one `Sum` node with three items.

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::{Expr, VarId};

fn sum(lhs: Expr, rhs: Expr) -> Expr {
    match lhs {
        Expr::Sum(mut items) => {
            items.push(rhs);
            Expr::Sum(items)
        }
        lhs => Expr::Sum(vec![lhs, rhs]),
    }
}

// ============================================================================
// Operators for Expr
// ============================================================================

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(self, other: T) -> Self::Output {
        sum(self, other.into())
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, other: T) -> Self::Output {
        let other: Expr = other.into();
        sum(self, -other)
    }
}

impl<T: Into<Expr>> Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, other: T) -> Self::Output {
        Expr::Mul(Box::new(self), Box::new(other.into()))
    }
}

impl<T: Into<Expr>> Div<T> for Expr {
    type Output = Expr;

    fn div(self, other: T) -> Self::Output {
        Expr::Div(Box::new(self), Box::new(other.into()))
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        Expr::Neg(Box::new(self))
    }
}

// ============================================================================
// Operators for VarId
// ============================================================================

impl<T: Into<Expr>> Add<T> for VarId {
    type Output = Expr;

    fn add(self, other: T) -> Self::Output {
        Expr::Var(self) + other
    }
}

impl<T: Into<Expr>> Sub<T> for VarId {
    type Output = Expr;

    fn sub(self, other: T) -> Self::Output {
        Expr::Var(self) - other
    }
}

impl<T: Into<Expr>> Mul<T> for VarId {
    type Output = Expr;

    fn mul(self, other: T) -> Self::Output {
        Expr::Var(self) * other
    }
}

impl<T: Into<Expr>> Div<T> for VarId {
    type Output = Expr;

    fn div(self, other: T) -> Self::Output {
        Expr::Var(self) / other
    }
}

impl Neg for VarId {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        -Expr::Var(self)
    }
}

// ============================================================================
// Reverse operators for f64
// ============================================================================

impl Add<VarId> for f64 {
    type Output = Expr;

    fn add(self, other: VarId) -> Self::Output {
        Expr::Const(self) + other
    }
}

impl Add<Expr> for f64 {
    type Output = Expr;

    fn add(self, other: Expr) -> Self::Output {
        Expr::Const(self) + other
    }
}

impl Sub<VarId> for f64 {
    type Output = Expr;

    fn sub(self, other: VarId) -> Self::Output {
        Expr::Const(self) - other
    }
}

impl Sub<Expr> for f64 {
    type Output = Expr;

    fn sub(self, other: Expr) -> Self::Output {
        Expr::Const(self) - other
    }
}

impl Mul<VarId> for f64 {
    type Output = Expr;

    fn mul(self, other: VarId) -> Self::Output {
        Expr::Const(self) * other
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, other: Expr) -> Self::Output {
        Expr::Const(self) * other
    }
}
