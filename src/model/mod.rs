//! Input problem representation.
//!
//! A [`Model`] is what a reader produces and what the conversion engine
//! consumes read-only: variables with bounds, objectives and constraints, each
//! split into a linear term list and an optional nonlinear [`Expr`].
//!
//! ```rust
//! use mpconv::constraint;
//! use mpconv::model::{Constraint, Expr, Model, Objective, OptimizationSense, VariableType};
//!
//! let mut model = Model::new();
//! let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//! let y = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//! let r = model.add_variable(VariableType::Continuous, f64::NEG_INFINITY, f64::INFINITY);
//!
//! model.add_objective(Objective::new(OptimizationSense::Minimize, r));
//! model.add_constraint(constraint!((x + y) <= 10.0));
//! model.add_constraint(Constraint::defining(r, Expr::max([x, y])));
//! assert_eq!(model.constraints().len(), 2);
//! ```

mod expr;
pub mod macros;
pub mod ops;

pub use expr::{Expr, Relation, UnaryFunc};

use std::fmt;

/// Variable types supported by the conversion layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Continuous variable (can take any real value)
    Continuous,
    /// Integer variable (can only take integer values)
    Integer,
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizationSense {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

/// Sequence index of a variable in its [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub const fn new(index: usize) -> Self {
        VarId(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Variable information stored in the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub var_type: VariableType,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl Variable {
    pub fn new(var_type: VariableType, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            var_type,
            lower_bound,
            upper_bound,
        }
    }

    pub fn continuous(lower_bound: f64, upper_bound: f64) -> Self {
        Self::new(VariableType::Continuous, lower_bound, upper_bound)
    }

    pub fn integer(lower_bound: f64, upper_bound: f64) -> Self {
        Self::new(VariableType::Integer, lower_bound, upper_bound)
    }

    pub fn binary() -> Self {
        Self::integer(0.0, 1.0)
    }

    /// Integer with bounds inside [0, 1].
    pub fn is_binary(&self) -> bool {
        self.var_type == VariableType::Integer && self.lower_bound >= 0.0 && self.upper_bound <= 1.0
    }
}

/// A linear expression term: coefficient * variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTerm {
    pub coefficient: f64,
    pub variable: VarId,
}

/// A linear expression: sum of terms plus constant
///
/// Terms may repeat a variable; canonicalization happens in [`crate::unzip`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    pub terms: Vec<LinearTerm>,
    pub constant: f64,
}

impl LinearExpression {
    /// Create a new linear expression with a constant term
    pub fn new(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    /// Add a term to the expression
    pub fn add_term(&mut self, coefficient: f64, variable: VarId) {
        self.terms.push(LinearTerm {
            coefficient,
            variable,
        });
    }

    pub fn with_term(mut self, coefficient: f64, variable: VarId) -> Self {
        self.add_term(coefficient, variable);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|term| term.coefficient * point.get(term.variable.index()).copied().unwrap_or(f64::NAN))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpression {
    fn from(variable: VarId) -> Self {
        LinearExpression::new(0.0).with_term(1.0, variable)
    }
}

/// An objective as delivered by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub sense: OptimizationSense,
    pub linear: LinearExpression,
    pub nonlinear: Option<Expr>,
}

impl Objective {
    /// Objective given as a single expression tree; linear terms are
    /// extracted during classification.
    pub fn new(sense: OptimizationSense, expr: impl Into<Expr>) -> Self {
        Self {
            sense,
            linear: LinearExpression::default(),
            nonlinear: Some(expr.into()),
        }
    }

    pub fn linear(sense: OptimizationSense, linear: impl Into<LinearExpression>) -> Self {
        Self {
            sense,
            linear: linear.into(),
            nonlinear: None,
        }
    }

    pub fn with_nonlinear(mut self, expr: impl Into<Expr>) -> Self {
        self.nonlinear = Some(expr.into());
        self
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.linear.evaluate(point)
            + self.nonlinear.as_ref().map_or(0.0, |expr| expr.evaluate(point))
    }
}

/// `lower <= linear + nonlinear <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct AlgebraicConstraint {
    pub linear: LinearExpression,
    pub nonlinear: Option<Expr>,
    pub lower: f64,
    pub upper: f64,
}

/// `result = linear + nonlinear`, naming a sub-expression with an auxiliary
/// variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DefiningConstraint {
    pub result: VarId,
    pub linear: LinearExpression,
    pub nonlinear: Option<Expr>,
}

/// A constraint as delivered by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Algebraic(AlgebraicConstraint),
    Defining(DefiningConstraint),
    /// A logical expression that must evaluate to true.
    Logical(Expr),
}

impl Constraint {
    pub fn algebraic(expr: impl Into<Expr>, lower: f64, upper: f64) -> Self {
        Constraint::Algebraic(AlgebraicConstraint {
            linear: LinearExpression::default(),
            nonlinear: Some(expr.into()),
            lower,
            upper,
        })
    }

    pub fn linear(linear: impl Into<LinearExpression>, lower: f64, upper: f64) -> Self {
        Constraint::Algebraic(AlgebraicConstraint {
            linear: linear.into(),
            nonlinear: None,
            lower,
            upper,
        })
    }

    pub fn eq(expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::algebraic(expr, rhs, rhs)
    }

    pub fn le(expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::algebraic(expr, f64::NEG_INFINITY, rhs)
    }

    pub fn ge(expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::algebraic(expr, rhs, f64::INFINITY)
    }

    pub fn defining(result: VarId, expr: impl Into<Expr>) -> Self {
        Constraint::Defining(DefiningConstraint {
            result,
            linear: LinearExpression::default(),
            nonlinear: Some(expr.into()),
        })
    }

    pub fn defining_linear(result: VarId, linear: impl Into<LinearExpression>) -> Self {
        Constraint::Defining(DefiningConstraint {
            result,
            linear: linear.into(),
            nonlinear: None,
        })
    }

    pub fn logical(expr: impl Into<Expr>) -> Self {
        Constraint::Logical(expr.into())
    }

    /// Whether `point` satisfies the constraint within `tolerance`.
    pub fn is_satisfied(&self, point: &[f64], tolerance: f64) -> bool {
        match self {
            Constraint::Algebraic(c) => {
                let value = c.linear.evaluate(point)
                    + c.nonlinear.as_ref().map_or(0.0, |expr| expr.evaluate(point));
                value >= c.lower - tolerance && value <= c.upper + tolerance
            }
            Constraint::Defining(c) => {
                let value = c.linear.evaluate(point)
                    + c.nonlinear.as_ref().map_or(0.0, |expr| expr.evaluate(point));
                let result = point.get(c.result.index()).copied().unwrap_or(f64::NAN);
                (result - value).abs() <= tolerance
            }
            Constraint::Logical(expr) => expr.evaluate(point) != 0.0,
        }
    }
}

/// A complete problem instance.
#[derive(Debug, Clone, Default)]
pub struct Model {
    variables: Vec<Variable>,
    objectives: Vec<Objective>,
    constraints: Vec<Constraint>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable to the model
    pub fn add_variable(&mut self, var_type: VariableType, lower_bound: f64, upper_bound: f64) -> VarId {
        self.push_variable(Variable::new(var_type, lower_bound, upper_bound))
    }

    pub fn push_variable(&mut self, variable: Variable) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(variable);
        id
    }

    pub fn add_objective(&mut self, objective: Objective) -> usize {
        self.objectives.push(objective);
        self.objectives.len() - 1
    }

    /// Add a constraint to the model
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// True if any variable is integer.
    pub fn is_mip(&self) -> bool {
        self.variables
            .iter()
            .any(|var| var.var_type == VariableType::Integer)
    }
}
