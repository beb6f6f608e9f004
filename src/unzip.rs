//! Expression unzipper
//!
//! Splits an objective or constraint body into its canonical linear part, a
//! constant offset, and whatever nonlinear terms remain. The classifier only
//! looks at the residual to decide the element's kind.

use crate::flat::{LinearForm, LinearFormBuilder};
use crate::model::{Expr, LinearExpression};

/// Result of unzipping one expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unzipped {
    pub form: LinearForm,
    pub constant: f64,
    /// Nonlinear terms, each with the scale it was reached under.
    pub residual: Vec<(f64, Expr)>,
}

impl Unzipped {
    pub fn is_linear(&self) -> bool {
        self.residual.is_empty()
    }

    /// Residual terms as a single expression, if any remain.
    pub fn residual_expr(&self) -> Option<Expr> {
        let mut items: Vec<Expr> = self
            .residual
            .iter()
            .map(|(scale, expr)| {
                if *scale == 1.0 {
                    expr.clone()
                } else {
                    Expr::Mul(Box::new(Expr::Const(*scale)), Box::new(expr.clone()))
                }
            })
            .collect();
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Expr::Sum(items)),
        }
    }

    /// Reassemble `form + constant + residual`.
    pub fn to_expr(&self) -> Expr {
        let linear = self.form.to_expr(self.constant);
        match self.residual_expr() {
            Some(residual) => Expr::Sum(vec![linear, residual]),
            None => linear,
        }
    }
}

/// Unzip a reader-supplied linear term list together with its optional
/// nonlinear expression.
pub fn unzip(linear: &LinearExpression, nonlinear: Option<&Expr>) -> Unzipped {
    let mut walker = Walker::default();
    for term in &linear.terms {
        walker.add_var(term.coefficient, term.variable);
    }
    walker.constant += linear.constant;
    if let Some(expr) = nonlinear {
        walker.walk(expr, 1.0);
    }
    walker.finish()
}

pub fn unzip_expr(expr: &Expr) -> Unzipped {
    unzip(&LinearExpression::default(), Some(expr))
}

#[derive(Default)]
struct Walker {
    linear: LinearFormBuilder,
    constant: f64,
    residual: Vec<(f64, Expr)>,
}

impl Walker {
    fn add_var(&mut self, coef: f64, var: crate::model::VarId) {
        if coef != 0.0 {
            self.linear.add(coef, var);
        }
    }

    fn walk(&mut self, expr: &Expr, scale: f64) {
        if scale == 0.0 {
            return;
        }
        match expr {
            Expr::Const(value) => self.constant += scale * value,
            Expr::Var(var) => self.add_var(scale, *var),
            Expr::Neg(inner) => self.walk(inner, -scale),
            Expr::Sum(items) => {
                for item in items {
                    self.walk(item, scale);
                }
            }
            Expr::Mul(lhs, rhs) => match (lhs.as_constant(), rhs.as_constant()) {
                (Some(factor), _) => self.walk(rhs, scale * factor),
                (None, Some(factor)) => self.walk(lhs, scale * factor),
                (None, None) => self.residual.push((scale, expr.clone())),
            },
            Expr::Div(numerator, denominator) => match denominator.as_constant() {
                Some(divisor) if divisor != 0.0 => self.walk(numerator, scale / divisor),
                _ => self.residual.push((scale, expr.clone())),
            },
            _ => self.residual.push((scale, expr.clone())),
        }
    }

    fn finish(self) -> Unzipped {
        Unzipped {
            form: self.linear.finish(),
            constant: self.constant,
            residual: self.residual,
        }
    }
}
