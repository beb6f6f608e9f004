//! Constraint and objective classifier
//!
//! Classification is structural and backend independent: the same element
//! always yields the same [`Kind`] and payload. The order of checks is
//! linear, then the named `result = f(args)` and indicator patterns, then
//! quadratic, and anything left over is kept verbatim as General.
//!
//! Objectives never take a named kind; they are Linear, Quadratic or
//! General.

use crate::flat::{
    FlatConstraint, FlatObjective, FuncConstraint, GeneralConstraint, GeneralObjective,
    IndicatorConstraintLinLE, Kind, LinearConstraint, LinearDefiningConstraint, LinearForm,
    LinearObjective, QuadTerms, QuadraticConstraint, QuadraticObjective,
};
use crate::model::{Constraint, Expr, Objective, Relation, UnaryFunc, VarId};
use crate::unzip::{Unzipped, unzip, unzip_expr};

/// Relative slack when checking that `a·r + s·f = 0` really means `r = f`.
const UNIT_RATIO_TOLERANCE: f64 = 1e-12;

pub fn classify_objective(objective: &Objective) -> FlatObjective {
    let unzipped = unzip(&objective.linear, objective.nonlinear.as_ref());
    if unzipped.is_linear() {
        return FlatObjective::Linear(LinearObjective {
            sense: objective.sense,
            form: unzipped.form,
            constant: unzipped.constant,
        });
    }

    match expand_quadratic(&unzipped.residual) {
        Some(poly) => {
            let linear = LinearObjective {
                sense: objective.sense,
                form: unzipped.form.extended(poly.linear),
                constant: unzipped.constant + poly.constant,
            };
            if poly.quad.is_empty() {
                FlatObjective::Linear(linear)
            } else {
                FlatObjective::Quadratic(QuadraticObjective {
                    linear,
                    quad: poly.quad,
                })
            }
        }
        None => FlatObjective::General(GeneralObjective {
            source: objective.clone(),
        }),
    }
}

pub fn classify_constraint(constraint: &Constraint) -> FlatConstraint {
    match constraint {
        Constraint::Algebraic(c) => {
            let unzipped = unzip(&c.linear, c.nonlinear.as_ref());
            let lower = c.lower - unzipped.constant;
            let upper = c.upper - unzipped.constant;
            if unzipped.is_linear() {
                return FlatConstraint::Linear(LinearConstraint::new(unzipped.form, lower, upper));
            }
            if let Some(functional) = functional_from_algebraic(&unzipped, lower, upper) {
                return functional;
            }
            quadratic_or_general(constraint, unzipped.form, &unzipped.residual, lower, upper)
        }
        Constraint::Defining(c) => {
            let unzipped = unzip(&c.linear, c.nonlinear.as_ref());
            if unzipped.is_linear() {
                return FlatConstraint::LinearDefining(LinearDefiningConstraint {
                    result: c.result,
                    form: unzipped.form,
                    constant: unzipped.constant,
                });
            }
            if let Some(functional) = functional_from_defining(c.result, &unzipped) {
                return functional;
            }
            // result = form + constant + residual  <=>  form - result + residual = -constant
            let form = unzipped.form.extended([(-1.0, c.result)]);
            quadratic_or_general(
                constraint,
                form,
                &unzipped.residual,
                -unzipped.constant,
                -unzipped.constant,
            )
        }
        Constraint::Logical(expr) => match indicator_from_logical(expr) {
            Some(indicator) => FlatConstraint::IndicatorLinLE(indicator),
            None => FlatConstraint::General(GeneralConstraint {
                source: constraint.clone(),
            }),
        },
    }
}

pub fn objective_kind(objective: &Objective) -> Kind {
    classify_objective(objective).kind()
}

pub fn constraint_kind(constraint: &Constraint) -> Kind {
    classify_constraint(constraint).kind()
}

fn quadratic_or_general(
    source: &Constraint,
    form: LinearForm,
    residual: &[(f64, Expr)],
    lower: f64,
    upper: f64,
) -> FlatConstraint {
    match expand_quadratic(residual) {
        Some(poly) => {
            let linear = LinearConstraint::new(
                form.extended(poly.linear),
                lower - poly.constant,
                upper - poly.constant,
            );
            if poly.quad.is_empty() {
                FlatConstraint::Linear(linear)
            } else {
                FlatConstraint::Quadratic(QuadraticConstraint {
                    linear,
                    quad: poly.quad,
                })
            }
        }
        None => FlatConstraint::General(GeneralConstraint {
            source: source.clone(),
        }),
    }
}

/// `a·r + s·f(args) = 0` with `-s/a = 1`.
fn functional_from_algebraic(unzipped: &Unzipped, lower: f64, upper: f64) -> Option<FlatConstraint> {
    if unzipped.form.len() != 1 || unzipped.residual.len() != 1 || lower != 0.0 || upper != 0.0 {
        return None;
    }
    let (coef, result) = unzipped.form.iter().next()?;
    let (scale, function) = &unzipped.residual[0];
    if (-scale / coef - 1.0).abs() > UNIT_RATIO_TOLERANCE {
        return None;
    }
    functional(result, function)
}

/// `r = f(args)` with no other term.
fn functional_from_defining(result: VarId, unzipped: &Unzipped) -> Option<FlatConstraint> {
    if !unzipped.form.is_empty() || unzipped.constant != 0.0 || unzipped.residual.len() != 1 {
        return None;
    }
    let (scale, function) = &unzipped.residual[0];
    if *scale != 1.0 {
        return None;
    }
    functional(result, function)
}

fn functional(result: VarId, function: &Expr) -> Option<FlatConstraint> {
    let (kind, args, params) = match_function(function)?;
    FlatConstraint::functional(
        kind,
        FuncConstraint {
            result,
            args,
            params,
        },
    )
}

fn variables(items: &[Expr]) -> Option<Vec<VarId>> {
    if items.is_empty() {
        return None;
    }
    items.iter().map(Expr::as_var).collect()
}

fn match_function(function: &Expr) -> Option<(Kind, Vec<VarId>, Vec<f64>)> {
    let plain = |kind: Kind, args: Vec<VarId>| Some((kind, args, Vec::new()));
    match function {
        Expr::Max(items) => plain(Kind::Max, variables(items)?),
        Expr::Min(items) => plain(Kind::Min, variables(items)?),
        Expr::And(items) => plain(Kind::Conjunction, variables(items)?),
        Expr::Or(items) => plain(Kind::Disjunction, variables(items)?),
        Expr::Unary(func, arg) => {
            let kind = match func {
                UnaryFunc::Abs => Kind::Abs,
                UnaryFunc::Exp => Kind::Exp,
                UnaryFunc::Log => Kind::Log,
                UnaryFunc::Sin => Kind::Sin,
                UnaryFunc::Cos => Kind::Cos,
                UnaryFunc::Tan => Kind::Tan,
            };
            plain(kind, vec![arg.as_var()?])
        }
        Expr::LogA(base, arg) => Some((Kind::LogA, vec![arg.as_var()?], vec![*base])),
        Expr::Pow(base, exponent) => match (base.as_var(), exponent.as_constant()) {
            (Some(var), Some(power)) => Some((Kind::Pow, vec![var], vec![power])),
            _ => {
                let base = base.as_constant()?;
                Some((Kind::ExpA, vec![exponent.as_var()?], vec![base]))
            }
        },
        _ => None,
    }
}

fn indicator_from_logical(expr: &Expr) -> Option<IndicatorConstraintLinLE> {
    let Expr::Implies(condition, consequence) = expr else {
        return None;
    };
    let (trigger, trigger_value) = trigger(condition)?;
    let Expr::Compare(relation, lhs, rhs) = consequence.as_ref() else {
        return None;
    };

    let lhs = unzip_expr(lhs);
    let rhs = unzip_expr(rhs);
    if !lhs.is_linear() || !rhs.is_linear() {
        return None;
    }
    // lhs - rhs  (<= | >=)  0
    let form = lhs.form.extended(rhs.form.iter().map(|(c, v)| (-c, v)));
    let constant = lhs.constant - rhs.constant;
    let (form, rhs) = match relation {
        Relation::Le => (form, -constant),
        Relation::Ge => (form.scaled(-1.0), constant),
        Relation::Eq => return None,
    };
    Some(IndicatorConstraintLinLE {
        trigger,
        trigger_value,
        form,
        rhs,
    })
}

fn trigger(condition: &Expr) -> Option<(VarId, i32)> {
    match condition {
        Expr::Var(var) => Some((*var, 1)),
        Expr::Not(inner) => Some((inner.as_var()?, 0)),
        Expr::Compare(Relation::Eq, lhs, rhs) => {
            let (var, value) = match (lhs.as_var(), rhs.as_var()) {
                (Some(var), _) => (var, rhs.as_constant()?),
                (None, Some(var)) => (var, lhs.as_constant()?),
                (None, None) => return None,
            };
            if value == 0.0 {
                Some((var, 0))
            } else if value == 1.0 {
                Some((var, 1))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Quadratic expansion of residual terms: `quad + linear + constant`.
struct Polynomial {
    quad: QuadTerms,
    linear: Vec<(f64, VarId)>,
    constant: f64,
}

/// `None` if any residual term is not a product of two linear factors.
fn expand_quadratic(residual: &[(f64, Expr)]) -> Option<Polynomial> {
    let mut poly = Polynomial {
        quad: QuadTerms::new(),
        linear: Vec::new(),
        constant: 0.0,
    };
    for (scale, term) in residual {
        expand_term(*scale, term, &mut poly)?;
    }
    poly.quad.canonicalize();
    Some(poly)
}

fn expand_term(scale: f64, term: &Expr, poly: &mut Polynomial) -> Option<()> {
    match term {
        Expr::Neg(inner) => expand_term(-scale, inner, poly),
        Expr::Sum(items) => items.iter().try_for_each(|item| expand_term(scale, item, poly)),
        Expr::Mul(lhs, rhs) => {
            let lhs = linear_factor(lhs)?;
            let rhs = linear_factor(rhs)?;
            multiply(scale, &lhs, &rhs, poly);
            Some(())
        }
        Expr::Pow(base, exponent) if exponent.as_constant() == Some(2.0) => {
            let base = linear_factor(base)?;
            multiply(scale, &base, &base, poly);
            Some(())
        }
        _ => None,
    }
}

fn linear_factor(expr: &Expr) -> Option<Unzipped> {
    let unzipped = unzip_expr(expr);
    unzipped.is_linear().then_some(unzipped)
}

fn multiply(scale: f64, lhs: &Unzipped, rhs: &Unzipped, poly: &mut Polynomial) {
    for (a, x) in lhs.form.iter() {
        for (b, y) in rhs.form.iter() {
            poly.quad.add_term(scale * a * b, x, y);
        }
    }
    poly.linear
        .extend(lhs.form.iter().map(|(a, x)| (scale * a * rhs.constant, x)));
    poly.linear
        .extend(rhs.form.iter().map(|(b, y)| (scale * b * lhs.constant, y)));
    poly.constant += scale * lhs.constant * rhs.constant;
}
