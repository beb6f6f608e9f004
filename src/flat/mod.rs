//! Classified ("flat") objectives and constraints.
//!
//! The classifier turns each model element into one of these tagged unions.
//! Every variant carries exactly the payload a backend needs to post it, and
//! can check itself against a point so rewrites can be verified.

mod form;

pub use form::{LinearForm, QuadTerms};
pub(crate) use form::LinearFormBuilder;

use std::fmt;

use crate::model::{Constraint, Objective, OptimizationSense, VarId};

/// Label of a classified element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Linear,
    Quadratic,
    LinearDefining,
    Max,
    Min,
    Abs,
    Conjunction,
    Disjunction,
    IndicatorLinLE,
    Exp,
    ExpA,
    Log,
    LogA,
    Pow,
    Sin,
    Cos,
    Tan,
    General,
}

impl Kind {
    pub const ALL: [Kind; 18] = [
        Kind::Linear,
        Kind::Quadratic,
        Kind::LinearDefining,
        Kind::Max,
        Kind::Min,
        Kind::Abs,
        Kind::Conjunction,
        Kind::Disjunction,
        Kind::IndicatorLinLE,
        Kind::Exp,
        Kind::ExpA,
        Kind::Log,
        Kind::LogA,
        Kind::Pow,
        Kind::Sin,
        Kind::Cos,
        Kind::Tan,
        Kind::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Linear => "Linear",
            Kind::Quadratic => "Quadratic",
            Kind::LinearDefining => "LinearDefining",
            Kind::Max => "Max",
            Kind::Min => "Min",
            Kind::Abs => "Abs",
            Kind::Conjunction => "Conjunction",
            Kind::Disjunction => "Disjunction",
            Kind::IndicatorLinLE => "IndicatorLinLE",
            Kind::Exp => "Exp",
            Kind::ExpA => "ExpA",
            Kind::Log => "Log",
            Kind::LogA => "LogA",
            Kind::Pow => "Pow",
            Kind::Sin => "Sin",
            Kind::Cos => "Cos",
            Kind::Tan => "Tan",
            Kind::General => "General",
        }
    }

    /// Kinds of the form `result = f(args; params)`.
    pub fn is_functional(&self) -> bool {
        matches!(
            self,
            Kind::Max
                | Kind::Min
                | Kind::Abs
                | Kind::Conjunction
                | Kind::Disjunction
                | Kind::Exp
                | Kind::ExpA
                | Kind::Log
                | Kind::LogA
                | Kind::Pow
                | Kind::Sin
                | Kind::Cos
                | Kind::Tan
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearObjective {
    pub sense: OptimizationSense,
    pub form: LinearForm,
    pub constant: f64,
}

impl LinearObjective {
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.form.evaluate(point) + self.constant
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticObjective {
    pub linear: LinearObjective,
    pub quad: QuadTerms,
}

/// Objective the classifier could not put in a more specific shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralObjective {
    pub source: Objective,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlatObjective {
    Linear(LinearObjective),
    Quadratic(QuadraticObjective),
    General(GeneralObjective),
}

impl FlatObjective {
    pub fn kind(&self) -> Kind {
        match self {
            FlatObjective::Linear(_) => Kind::Linear,
            FlatObjective::Quadratic(_) => Kind::Quadratic,
            FlatObjective::General(_) => Kind::General,
        }
    }

    pub fn sense(&self) -> OptimizationSense {
        match self {
            FlatObjective::Linear(obj) => obj.sense,
            FlatObjective::Quadratic(obj) => obj.linear.sense,
            FlatObjective::General(obj) => obj.source.sense,
        }
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        match self {
            FlatObjective::Linear(obj) => obj.evaluate(point),
            FlatObjective::Quadratic(obj) => obj.linear.evaluate(point) + obj.quad.evaluate(point),
            FlatObjective::General(obj) => obj.source.evaluate(point),
        }
    }
}

/// `lower <= form <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub form: LinearForm,
    pub lower: f64,
    pub upper: f64,
}

impl LinearConstraint {
    pub fn new(form: LinearForm, lower: f64, upper: f64) -> Self {
        Self { form, lower, upper }
    }

    pub fn equal(form: LinearForm, rhs: f64) -> Self {
        Self::new(form, rhs, rhs)
    }

    pub fn less_equal(form: LinearForm, rhs: f64) -> Self {
        Self::new(form, f64::NEG_INFINITY, rhs)
    }

    pub fn greater_equal(form: LinearForm, rhs: f64) -> Self {
        Self::new(form, rhs, f64::INFINITY)
    }

    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }
}

/// `lower <= form + quad <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticConstraint {
    pub linear: LinearConstraint,
    pub quad: QuadTerms,
}

/// `result = form + constant`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearDefiningConstraint {
    pub result: VarId,
    pub form: LinearForm,
    pub constant: f64,
}

impl LinearDefiningConstraint {
    /// `result - form = constant`
    pub fn to_linear_constraint(&self) -> LinearConstraint {
        let form = LinearForm::from_terms(
            std::iter::once((1.0, self.result)).chain(self.form.iter().map(|(c, v)| (-c, v))),
        );
        LinearConstraint::equal(form, self.constant)
    }
}

/// `result = f(args; params)` for the functional kinds.
///
/// `params` holds the constant of ExpA (base), LogA (base) and Pow
/// (exponent); it is empty otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncConstraint {
    pub result: VarId,
    pub args: Vec<VarId>,
    pub params: Vec<f64>,
}

impl FuncConstraint {
    pub fn new(result: VarId, args: Vec<VarId>) -> Self {
        Self {
            result,
            args,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: f64) -> Self {
        self.params.push(param);
        self
    }

    fn param(&self) -> f64 {
        self.params.first().copied().unwrap_or(f64::NAN)
    }
}

/// `trigger == trigger_value ⇒ form <= rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConstraintLinLE {
    pub trigger: VarId,
    pub trigger_value: i32,
    pub form: LinearForm,
    pub rhs: f64,
}

/// Constraint kept verbatim because no pattern matched.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralConstraint {
    pub source: Constraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlatConstraint {
    Linear(LinearConstraint),
    Quadratic(QuadraticConstraint),
    LinearDefining(LinearDefiningConstraint),
    Max(FuncConstraint),
    Min(FuncConstraint),
    Abs(FuncConstraint),
    Conjunction(FuncConstraint),
    Disjunction(FuncConstraint),
    IndicatorLinLE(IndicatorConstraintLinLE),
    Exp(FuncConstraint),
    ExpA(FuncConstraint),
    Log(FuncConstraint),
    LogA(FuncConstraint),
    Pow(FuncConstraint),
    Sin(FuncConstraint),
    Cos(FuncConstraint),
    Tan(FuncConstraint),
    General(GeneralConstraint),
}

impl FlatConstraint {
    /// Wrap a functional payload under `kind`; `None` if `kind` is not
    /// functional.
    pub fn functional(kind: Kind, payload: FuncConstraint) -> Option<Self> {
        Some(match kind {
            Kind::Max => FlatConstraint::Max(payload),
            Kind::Min => FlatConstraint::Min(payload),
            Kind::Abs => FlatConstraint::Abs(payload),
            Kind::Conjunction => FlatConstraint::Conjunction(payload),
            Kind::Disjunction => FlatConstraint::Disjunction(payload),
            Kind::Exp => FlatConstraint::Exp(payload),
            Kind::ExpA => FlatConstraint::ExpA(payload),
            Kind::Log => FlatConstraint::Log(payload),
            Kind::LogA => FlatConstraint::LogA(payload),
            Kind::Pow => FlatConstraint::Pow(payload),
            Kind::Sin => FlatConstraint::Sin(payload),
            Kind::Cos => FlatConstraint::Cos(payload),
            Kind::Tan => FlatConstraint::Tan(payload),
            _ => return None,
        })
    }

    pub fn kind(&self) -> Kind {
        match self {
            FlatConstraint::Linear(_) => Kind::Linear,
            FlatConstraint::Quadratic(_) => Kind::Quadratic,
            FlatConstraint::LinearDefining(_) => Kind::LinearDefining,
            FlatConstraint::Max(_) => Kind::Max,
            FlatConstraint::Min(_) => Kind::Min,
            FlatConstraint::Abs(_) => Kind::Abs,
            FlatConstraint::Conjunction(_) => Kind::Conjunction,
            FlatConstraint::Disjunction(_) => Kind::Disjunction,
            FlatConstraint::IndicatorLinLE(_) => Kind::IndicatorLinLE,
            FlatConstraint::Exp(_) => Kind::Exp,
            FlatConstraint::ExpA(_) => Kind::ExpA,
            FlatConstraint::Log(_) => Kind::Log,
            FlatConstraint::LogA(_) => Kind::LogA,
            FlatConstraint::Pow(_) => Kind::Pow,
            FlatConstraint::Sin(_) => Kind::Sin,
            FlatConstraint::Cos(_) => Kind::Cos,
            FlatConstraint::Tan(_) => Kind::Tan,
            FlatConstraint::General(_) => Kind::General,
        }
    }

    pub fn as_functional(&self) -> Option<&FuncConstraint> {
        match self {
            FlatConstraint::Max(c)
            | FlatConstraint::Min(c)
            | FlatConstraint::Abs(c)
            | FlatConstraint::Conjunction(c)
            | FlatConstraint::Disjunction(c)
            | FlatConstraint::Exp(c)
            | FlatConstraint::ExpA(c)
            | FlatConstraint::Log(c)
            | FlatConstraint::LogA(c)
            | FlatConstraint::Pow(c)
            | FlatConstraint::Sin(c)
            | FlatConstraint::Cos(c)
            | FlatConstraint::Tan(c) => Some(c),
            _ => None,
        }
    }

    /// Whether `point` satisfies the constraint within `tolerance`.
    ///
    /// Logical kinds treat any non-zero value as true; the indicator trigger
    /// is rounded to the nearest integer.
    pub fn is_satisfied(&self, point: &[f64], tolerance: f64) -> bool {
        let value = |var: VarId| point.get(var.index()).copied().unwrap_or(f64::NAN);
        let within = |lhs: f64, lower: f64, upper: f64| lhs >= lower - tolerance && lhs <= upper + tolerance;
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
        let truth = |flag: bool| if flag { 1.0 } else { 0.0 };

        match self {
            FlatConstraint::Linear(c) => within(c.form.evaluate(point), c.lower, c.upper),
            FlatConstraint::Quadratic(c) => within(
                c.linear.form.evaluate(point) + c.quad.evaluate(point),
                c.linear.lower,
                c.linear.upper,
            ),
            FlatConstraint::LinearDefining(c) => {
                close(value(c.result), c.form.evaluate(point) + c.constant)
            }
            FlatConstraint::IndicatorLinLE(c) => {
                value(c.trigger).round() != f64::from(c.trigger_value)
                    || c.form.evaluate(point) <= c.rhs + tolerance
            }
            FlatConstraint::General(c) => c.source.is_satisfied(point, tolerance),
            functional => {
                let Some(c) = functional.as_functional() else {
                    return false;
                };
                let mut args = c.args.iter().map(|arg| value(*arg));
                let first = c.args.first().map_or(f64::NAN, |arg| value(*arg));
                let expected = match functional.kind() {
                    Kind::Max => args.fold(f64::NEG_INFINITY, f64::max),
                    Kind::Min => args.fold(f64::INFINITY, f64::min),
                    Kind::Conjunction => truth(args.all(|arg| arg != 0.0)),
                    Kind::Disjunction => truth(args.any(|arg| arg != 0.0)),
                    Kind::Abs => first.abs(),
                    Kind::Exp => first.exp(),
                    Kind::ExpA => c.param().powf(first),
                    Kind::Log => first.ln(),
                    Kind::LogA => first.ln() / c.param().ln(),
                    Kind::Pow => first.powf(c.param()),
                    Kind::Sin => first.sin(),
                    Kind::Cos => first.cos(),
                    Kind::Tan => first.tan(),
                    _ => f64::NAN,
                };
                close(value(c.result), expected)
            }
        }
    }
}
