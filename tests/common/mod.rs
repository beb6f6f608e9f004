//! Bound-picking backend used by the integration tests.
//!
//! `BoundSolver` solves a linear objective over a box by moving each
//! variable to the bound its cost favours, then checks the posted rows
//! against that point. It is exact for box-constrained models and good
//! enough to drive a session end to end without a native solver.

#![allow(dead_code)]

use std::path::Path;

use anyhow::{Result, anyhow};

use mpconv::acceptance::{Acceptance, AcceptanceTable};
use mpconv::backend::{Backend, BaseOptions, lp_format};
use mpconv::error::OptionError;
use mpconv::flat::{Kind, LinearConstraint, LinearObjective, QuadraticObjective};
use mpconv::model::{OptimizationSense, Variable, VariableType};
use mpconv::options::OptionRegistry;
use mpconv::status::{SolveStatus, StatusEntry, StatusTable};

pub const OPTIMAL: i32 = 0;
pub const UNBOUNDED: i32 = 1;
pub const HEURISTIC: i32 = 2;
pub const VIOLATED: i32 = 3;
pub const NOT_SOLVED: i32 = 99;

const FEASIBILITY_TOLERANCE: f64 = 1e-9;

#[derive(Default)]
pub struct BoundSolver {
    base: BaseOptions,
    pub time_limit: f64,
    pub verbosity: i64,
    pub opened: bool,
    pub closed: usize,
    columns: Vec<Variable>,
    objective: Option<LinearObjective>,
    quadratic: Option<QuadraticObjective>,
    rows: Vec<LinearConstraint>,
    point: Vec<f64>,
    status: Option<i32>,
}

impl BoundSolver {
    pub fn new() -> Self {
        Self {
            time_limit: f64::INFINITY,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[LinearConstraint] {
        &self.rows
    }

    pub fn columns(&self) -> &[Variable] {
        &self.columns
    }

    pub fn quadratic_objective(&self) -> Option<&QuadraticObjective> {
        self.quadratic.as_ref()
    }

    fn linear_objective(&self) -> Option<&LinearObjective> {
        self.objective
            .as_ref()
            .or_else(|| self.quadratic.as_ref().map(|q| &q.linear))
    }

    fn cost(&self, index: usize) -> f64 {
        let Some(objective) = self.linear_objective() else {
            return 0.0;
        };
        let coef = objective
            .form
            .iter()
            .find(|(_, var)| var.index() == index)
            .map_or(0.0, |(coef, _)| coef);
        match objective.sense {
            OptimizationSense::Minimize => coef,
            OptimizationSense::Maximize => -coef,
        }
    }

    fn pick(lower: f64, upper: f64, cost: f64) -> f64 {
        if cost > 0.0 {
            lower
        } else if cost < 0.0 {
            upper
        } else if lower.is_finite() {
            lower
        } else if upper.is_finite() {
            upper
        } else {
            0.0
        }
    }
}

const STATUS: StatusTable = StatusTable::new(&[
    StatusEntry::new(OPTIMAL, SolveStatus::Optimal, "optimal solution"),
    StatusEntry::new(UNBOUNDED, SolveStatus::Unbounded, "unbounded problem"),
    StatusEntry::new(HEURISTIC, SolveStatus::FeasibleUncertain, "feasible point, optimality not proven"),
    StatusEntry::new(VIOLATED, SolveStatus::Infeasible, "bound point violates a row"),
]);

impl Backend for BoundSolver {
    const ACCEPTANCE: AcceptanceTable = AcceptanceTable::new(
        &[
            (Kind::Linear, Acceptance::Recommended),
            (Kind::Quadratic, Acceptance::Recommended),
        ],
        &[(Kind::Linear, Acceptance::Recommended)],
    );
    const STATUS_TABLE: StatusTable = STATUS;

    fn solver_name(&self) -> &str {
        "boundsolver"
    }

    fn solver_version(&self) -> String {
        "0.1".to_string()
    }

    fn base_options(&self) -> &BaseOptions {
        &self.base
    }

    fn base_options_mut(&mut self) -> &mut BaseOptions {
        &mut self.base
    }

    fn register_options(registry: &mut OptionRegistry<Self>) -> Result<(), OptionError> {
        mpconv::stored_option!(registry, "timelimit", "Time limit in seconds", time_limit)?;
        registry.add_method_option::<i64>(
            "verbosity",
            "Log level, 0 to 3",
            |solver: &BoundSolver| solver.verbosity,
            |solver: &mut BoundSolver, level: i64| {
                if !(0..=3).contains(&level) {
                    return Err(anyhow!("verbosity {level} out of range"));
                }
                solver.verbosity = level;
                Ok(())
            },
        )
    }

    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closed += 1;
    }

    fn export_model(&mut self, path: &Path) -> Result<()> {
        let text = lp_format::write_lp(&self.columns, self.linear_objective(), &self.rows);
        std::fs::write(path, text)?;
        Ok(())
    }

    fn add_variable(&mut self, variable: &Variable) -> Result<()> {
        self.columns.push(*variable);
        Ok(())
    }

    fn add_linear_objective(&mut self, objective: &LinearObjective) -> Result<()> {
        if self.objective.is_some() || self.quadratic.is_some() {
            return Err(anyhow!("only one objective is supported"));
        }
        self.objective = Some(objective.clone());
        Ok(())
    }

    fn add_quadratic_objective(&mut self, objective: &QuadraticObjective) -> Result<()> {
        if self.objective.is_some() || self.quadratic.is_some() {
            return Err(anyhow!("only one objective is supported"));
        }
        self.quadratic = Some(objective.clone());
        Ok(())
    }

    fn add_linear_constraint(&mut self, constraint: &LinearConstraint) -> Result<()> {
        self.rows.push(constraint.clone());
        Ok(())
    }

    fn solve(&mut self) -> Result<()> {
        let point: Vec<f64> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, var)| Self::pick(var.lower_bound, var.upper_bound, self.cost(index)))
            .collect();

        let status = if point.iter().any(|value| !value.is_finite()) {
            UNBOUNDED
        } else if !self.rows.iter().all(|row| {
            let lhs = row.form.evaluate(&point);
            lhs >= row.lower - FEASIBILITY_TOLERANCE && lhs <= row.upper + FEASIBILITY_TOLERANCE
        }) {
            VIOLATED
        } else if self.quadratic.is_some() {
            HEURISTIC
        } else {
            OPTIMAL
        };

        self.point = point;
        self.status = Some(status);
        Ok(())
    }

    fn native_status(&self) -> Result<i32> {
        Ok(self.status.unwrap_or(NOT_SOLVED))
    }

    fn has_feasible_solution(&self) -> bool {
        matches!(self.status, Some(OPTIMAL) | Some(HEURISTIC))
    }

    fn primal_solution(&self) -> Result<Vec<f64>> {
        Ok(self.point.clone())
    }

    fn objective_value(&self) -> Result<f64> {
        if let Some(quadratic) = &self.quadratic {
            return Ok(quadratic.linear.evaluate(&self.point) + quadratic.quad.evaluate(&self.point));
        }
        self.objective
            .as_ref()
            .map(|objective| objective.evaluate(&self.point))
            .ok_or_else(|| anyhow!("no objective"))
    }

    fn iterations(&self) -> u64 {
        self.columns.len() as u64
    }

    fn is_mip(&self) -> bool {
        self.columns
            .iter()
            .any(|var| var.var_type == VariableType::Integer)
    }

    fn num_objectives(&self) -> usize {
        usize::from(self.objective.is_some() || self.quadratic.is_some())
    }
}

