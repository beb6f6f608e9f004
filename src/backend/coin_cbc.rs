//! COIN-OR CBC backend
//!
//! CBC is driven through its high-level `coin_cbc::Model`, which is built
//! from scratch at solve time. Until then the backend keeps the posted
//! columns and rows itself, which is also what [`Backend::export_model`]
//! writes out.

use std::collections::BTreeMap;
use std::path::Path;

use ::coin_cbc::{Col, Model as CbcModel, Sense};
use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::output_suppression::Silenced;
use super::{Backend, BaseOptions, lp_format};
use crate::acceptance::{Acceptance, AcceptanceTable};
use crate::error::OptionError;
use crate::flat::{Kind, LinearConstraint, LinearObjective};
use crate::model::{OptimizationSense, Variable, VariableType};
use crate::options::{NativeParameters, OptionKind, OptionRegistry};
use crate::status::{Interrupter, SolveStatus, StatusEntry, StatusTable};
use crate::stored_option;

/// Result codes of [`CbcBackend::native_status`].
pub mod code {
    pub const OPTIMAL: i32 = 0;
    pub const INFEASIBLE: i32 = 1;
    pub const UNBOUNDED: i32 = 2;
    pub const TIME_LIMIT: i32 = 3;
    pub const NODE_LIMIT: i32 = 4;
    pub const SOLUTION_LIMIT: i32 = 5;
    pub const ABANDONED: i32 = 6;
    pub const STOPPED: i32 = 7;
    pub const UNDETERMINED: i32 = 8;
}

const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Round to `digits` significant digits, masking CBC's floating point noise.
fn round_to_sig_digits(value: f64, digits: u32) -> f64 {
    if value == 0.0 || digits == 0 || !value.is_finite() {
        return value;
    }

    let magnitude = value.abs().log10().floor() as i32;
    let scale = 10_f64.powi(digits as i32 - magnitude - 1);
    (value * scale).round() / scale
}

#[derive(Debug, Clone)]
struct CbcResult {
    status: i32,
    primal: Vec<f64>,
    objective: f64,
    feasible: bool,
}

pub struct CbcBackend {
    base: BaseOptions,
    round_digits: i64,
    params: BTreeMap<&'static str, String>,
    columns: Vec<Variable>,
    objective: Option<LinearObjective>,
    rows: Vec<LinearConstraint>,
    interrupter: Option<Interrupter>,
    result: Option<CbcResult>,
}

impl Default for CbcBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CbcBackend {
    pub fn new() -> Self {
        Self {
            base: BaseOptions::default(),
            round_digits: 8,
            params: BTreeMap::new(),
            columns: Vec::new(),
            objective: None,
            rows: Vec::new(),
            interrupter: None,
            result: None,
        }
    }

    fn log_level(&self) -> i64 {
        self.params
            .get("log")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    fn result(&self) -> Result<&CbcResult> {
        self.result
            .as_ref()
            .ok_or_else(|| anyhow!("CBC has not solved the model yet"))
    }

    fn is_feasible(&self, point: &[f64]) -> bool {
        let within = |value: f64, lower: f64, upper: f64| {
            value >= lower - FEASIBILITY_TOLERANCE && value <= upper + FEASIBILITY_TOLERANCE
        };
        self.columns
            .iter()
            .zip(point)
            .all(|(var, &value)| within(value, var.lower_bound, var.upper_bound))
            && self
                .rows
                .iter()
                .all(|row| within(row.form.evaluate(point), row.lower, row.upper))
    }

    fn build(&self) -> (CbcModel, Vec<Col>) {
        let mut model = CbcModel::default();

        let cols: Vec<_> = self
            .columns
            .iter()
            .map(|var| {
                let col = match var.var_type {
                    VariableType::Continuous => model.add_col(),
                    VariableType::Integer => model.add_integer(),
                };
                model.set_col_lower(col, var.lower_bound);
                model.set_col_upper(col, var.upper_bound);
                col
            })
            .collect();

        for constraint in &self.rows {
            let row = model.add_row();
            for (coef, var) in constraint.form.iter() {
                model.set_weight(row, cols[var.index()], coef);
            }
            if constraint.is_equality() {
                model.set_row_equal(row, constraint.lower);
            } else {
                if constraint.lower.is_finite() {
                    model.set_row_lower(row, constraint.lower);
                }
                if constraint.upper.is_finite() {
                    model.set_row_upper(row, constraint.upper);
                }
            }
        }

        if let Some(objective) = &self.objective {
            for (coef, var) in objective.form.iter() {
                model.set_obj_coeff(cols[var.index()], coef);
            }
            model.set_obj_sense(match objective.sense {
                OptimizationSense::Minimize => Sense::Minimize,
                OptimizationSense::Maximize => Sense::Maximize,
            });
        }

        for (name, value) in &self.params {
            model.set_parameter(name, value);
        }

        (model, cols)
    }
}

impl<T> NativeParameters<T> for CbcBackend
where
    T: OptionKind + ToString + std::str::FromStr,
{
    type Key = &'static str;

    fn get_native(&self, key: &&'static str) -> Result<T> {
        let text = self
            .params
            .get(key)
            .ok_or_else(|| anyhow!("CBC parameter {key} uses the solver default"))?;
        text.parse()
            .map_err(|_| anyhow!("CBC parameter {key} holds {text:?}"))
    }

    fn set_native(&mut self, key: &&'static str, value: T) -> Result<()> {
        self.params.insert(key, value.to_string());
        Ok(())
    }
}

const STATUS: StatusTable = StatusTable::new(&[
    StatusEntry::new(code::OPTIMAL, SolveStatus::Optimal, "optimal solution"),
    StatusEntry::new(code::INFEASIBLE, SolveStatus::Infeasible, "infeasible problem"),
    StatusEntry::new(code::UNBOUNDED, SolveStatus::Unbounded, "unbounded problem"),
    StatusEntry::new(code::TIME_LIMIT, SolveStatus::FeasibleUncertain, "time limit"),
    StatusEntry::new(code::NODE_LIMIT, SolveStatus::FeasibleUncertain, "node limit"),
    StatusEntry::new(code::SOLUTION_LIMIT, SolveStatus::FeasibleUncertain, "solution limit"),
    StatusEntry::new(code::ABANDONED, SolveStatus::Error, "solve abandoned"),
    StatusEntry::new(code::STOPPED, SolveStatus::Interrupted, "interrupted"),
]);

impl Backend for CbcBackend {
    const ACCEPTANCE: AcceptanceTable = AcceptanceTable::new(
        &[(Kind::Linear, Acceptance::Recommended)],
        &[(Kind::Linear, Acceptance::Recommended)],
    );
    const STATUS_TABLE: StatusTable = STATUS;

    fn solver_name(&self) -> &str {
        "CBC"
    }

    fn base_options(&self) -> &BaseOptions {
        &self.base
    }

    fn base_options_mut(&mut self) -> &mut BaseOptions {
        &mut self.base
    }

    fn register_options(registry: &mut OptionRegistry<Self>) -> Result<(), OptionError> {
        registry.add_solver_option::<f64>("timelim", "Limit on solve time in seconds", "sec")?;
        registry.add_solver_option::<i64>("threads", "Number of threads (0: single threaded)", "threads")?;
        registry.add_solver_option::<i64>("outlev", "CBC log level; 0 silences the solver", "log")?;
        registry.add_solver_option::<i64>("maxnodes", "Limit on branch and bound nodes", "maxN")?;
        registry.add_solver_option::<f64>("mipgap", "Relative MIP gap tolerance", "ratio")?;
        registry.add_solver_option::<String>(
            "cuts",
            "Global cut generation switch: off, on, root, ifmove or forceOn",
            "cuts",
        )?;
        stored_option!(
            registry,
            "round_digits",
            "Significant digits kept in reported values (0: no rounding)",
            round_digits
        )
    }

    fn open(&mut self) -> Result<()> {
        self.columns.clear();
        self.rows.clear();
        self.objective = None;
        self.result = None;
        Ok(())
    }

    fn close(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.objective = None;
        self.result = None;
    }

    fn export_model(&mut self, path: &Path) -> Result<()> {
        let text = lp_format::write_lp(&self.columns, self.objective.as_ref(), &self.rows);
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }

    fn add_variable(&mut self, variable: &Variable) -> Result<()> {
        self.columns.push(*variable);
        Ok(())
    }

    fn add_linear_objective(&mut self, objective: &LinearObjective) -> Result<()> {
        if self.objective.is_some() {
            return Err(anyhow!("CBC supports a single objective"));
        }
        self.objective = Some(objective.clone());
        Ok(())
    }

    fn add_linear_constraint(&mut self, constraint: &LinearConstraint) -> Result<()> {
        if let Some(var) = constraint.form.vars().iter().find(|var| var.index() >= self.columns.len()) {
            return Err(anyhow!("Variable {var} not found in model"));
        }
        self.rows.push(constraint.clone());
        Ok(())
    }

    fn set_interrupter(&mut self, interrupter: &Interrupter) -> Result<()> {
        self.interrupter = Some(interrupter.clone());
        Ok(())
    }

    fn solve(&mut self) -> Result<()> {
        if self.interrupter.as_ref().is_some_and(Interrupter::is_stopped) {
            self.result = Some(CbcResult {
                status: code::STOPPED,
                primal: Vec::new(),
                objective: 0.0,
                feasible: false,
            });
            return Ok(());
        }

        let _quiet = if self.log_level() == 0 {
            Some(Silenced::stdout()?)
        } else {
            None
        };

        let (model, cols) = self.build();
        let solution = model.solve();
        let raw = solution.raw();

        let status = if raw.is_proven_optimal() {
            code::OPTIMAL
        } else if raw.is_proven_infeasible() {
            code::INFEASIBLE
        } else if raw.is_continuous_unbounded() {
            code::UNBOUNDED
        } else if raw.is_seconds_limit_reached() {
            code::TIME_LIMIT
        } else if raw.is_node_limit_reached() {
            code::NODE_LIMIT
        } else if raw.is_solution_limit_reached() {
            code::SOLUTION_LIMIT
        } else if raw.is_abandoned() {
            code::ABANDONED
        } else {
            code::UNDETERMINED
        };

        let digits = u32::try_from(self.round_digits).unwrap_or(0);
        let primal: Vec<f64> = cols
            .iter()
            .map(|&col| round_to_sig_digits(solution.col(col), digits))
            .collect();
        let objective = self
            .objective
            .as_ref()
            .map_or(0.0, |obj| round_to_sig_digits(obj.evaluate(&primal), digits));
        let feasible = self.is_feasible(&primal);

        debug!(
            component = "cbc",
            operation = "solve",
            status,
            columns = self.columns.len(),
            rows = self.rows.len(),
            feasible,
            "CBC finished"
        );

        self.result = Some(CbcResult {
            status,
            primal,
            objective,
            feasible,
        });
        Ok(())
    }

    fn native_status(&self) -> Result<i32> {
        Ok(self.result()?.status)
    }

    fn has_feasible_solution(&self) -> bool {
        self.result.as_ref().is_some_and(|result| result.feasible)
    }

    fn primal_solution(&self) -> Result<Vec<f64>> {
        Ok(self.result()?.primal.clone())
    }

    fn objective_value(&self) -> Result<f64> {
        Ok(self.result()?.objective)
    }

    fn is_mip(&self) -> bool {
        self.columns
            .iter()
            .any(|var| var.var_type == VariableType::Integer)
    }

    fn num_objectives(&self) -> usize {
        usize::from(self.objective.is_some())
    }
}
