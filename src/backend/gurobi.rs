//! Gurobi backend
//!
//! Posts linear and quadratic elements directly into a native model. Native
//! parameters set before [`Backend::open`] go to the environment the model is
//! created from; later ones go to the model's own copy.

use ::gurobi::{
    ConstrSense, Env, LinExpr, Model, ModelSense, QuadExpr, Var, VarType, attr, param,
};
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::debug;

use super::{Backend, BaseOptions, IisReport, IisStatus, RowMap};
use crate::acceptance::{Acceptance, AcceptanceTable};
use crate::error::OptionError;
use crate::flat::{
    Kind, LinearConstraint, LinearForm, LinearObjective, QuadTerms, QuadraticConstraint,
    QuadraticObjective,
};
use crate::model::{OptimizationSense, Variable, VariableType};
use crate::options::{NativeParameters, OptionRegistry};
use crate::status::{Interrupter, SolveStatus, StatusEntry, StatusTable};

/// Native optimization status codes.
pub mod code {
    pub const LOADED: i32 = 1;
    pub const OPTIMAL: i32 = 2;
    pub const INFEASIBLE: i32 = 3;
    pub const INF_OR_UNBD: i32 = 4;
    pub const UNBOUNDED: i32 = 5;
    pub const CUTOFF: i32 = 6;
    pub const ITERATION_LIMIT: i32 = 7;
    pub const NODE_LIMIT: i32 = 8;
    pub const TIME_LIMIT: i32 = 9;
    pub const SOLUTION_LIMIT: i32 = 10;
    pub const INTERRUPTED: i32 = 11;
    pub const NUMERIC: i32 = 12;
    pub const SUBOPTIMAL: i32 = 13;
}

const STATUS: StatusTable = StatusTable::new(&[
    StatusEntry::new(code::LOADED, SolveStatus::Unknown, "model loaded but not solved"),
    StatusEntry::new(code::OPTIMAL, SolveStatus::Optimal, "optimal solution"),
    StatusEntry::new(code::INFEASIBLE, SolveStatus::Infeasible, "infeasible problem"),
    StatusEntry::new(code::INF_OR_UNBD, SolveStatus::InfeasibleOrUnbounded, "infeasible or unbounded problem"),
    StatusEntry::new(code::UNBOUNDED, SolveStatus::Unbounded, "unbounded problem"),
    StatusEntry::new(code::CUTOFF, SolveStatus::FeasibleUncertain, "objective cutoff"),
    StatusEntry::new(code::ITERATION_LIMIT, SolveStatus::FeasibleUncertain, "iteration limit"),
    StatusEntry::new(code::NODE_LIMIT, SolveStatus::FeasibleUncertain, "node limit"),
    StatusEntry::new(code::TIME_LIMIT, SolveStatus::FeasibleUncertain, "time limit"),
    StatusEntry::new(code::SOLUTION_LIMIT, SolveStatus::FeasibleUncertain, "solution limit"),
    StatusEntry::new(code::INTERRUPTED, SolveStatus::Interrupted, "interrupted"),
    StatusEntry::new(code::NUMERIC, SolveStatus::Error, "error"),
    StatusEntry::new(code::SUBOPTIMAL, SolveStatus::FeasibleUncertain, "suboptimal solution"),
]);

pub struct GurobiBackend {
    base: BaseOptions,
    env: Env,
    model: Option<Model>,
    vars: Vec<Var>,
    var_types: Vec<VariableType>,
    rows: Vec<::gurobi::Constr>,
    row_map: RowMap,
    quadratic_rows: usize,
    objectives: usize,
    interrupter: Option<Interrupter>,
    skipped_solve: bool,
}

impl GurobiBackend {
    /// Start a Gurobi environment with console output off.
    pub fn new() -> Result<Self> {
        let mut env = Env::new("").context("starting Gurobi environment")?;
        env.set(param::OutputFlag, 0)?;
        Ok(Self {
            base: BaseOptions::default(),
            env,
            model: None,
            vars: Vec::new(),
            var_types: Vec::new(),
            rows: Vec::new(),
            row_map: RowMap::new(),
            quadratic_rows: 0,
            objectives: 0,
            interrupter: None,
            skipped_solve: false,
        })
    }

    fn env(&self) -> &Env {
        self.model.as_ref().map_or(&self.env, Model::get_env)
    }

    fn env_mut(&mut self) -> &mut Env {
        match self.model.as_mut() {
            Some(model) => model.get_env_mut(),
            None => &mut self.env,
        }
    }

    fn model(&self) -> Result<&Model> {
        self.model
            .as_ref()
            .ok_or_else(|| anyhow!("Gurobi model is not open"))
    }

    fn model_mut(&mut self) -> Result<&mut Model> {
        self.model
            .as_mut()
            .ok_or_else(|| anyhow!("Gurobi model is not open"))
    }

    fn var(&self, index: usize) -> Result<Var> {
        self.vars
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("Variable x{index} not found in model"))
    }

    fn lin_expr(&self, form: &LinearForm, constant: f64) -> Result<LinExpr> {
        let mut expr = LinExpr::new();
        for (coef, var) in form.iter() {
            expr = expr.add_term(coef, self.var(var.index())?);
        }
        Ok(expr.add_constant(constant))
    }

    fn quad_expr(&self, form: &LinearForm, quad: &QuadTerms, constant: f64) -> Result<QuadExpr> {
        let mut expr = QuadExpr::new();
        for (coef, var) in form.iter() {
            expr = expr.add_term(coef, self.var(var.index())?);
        }
        for (coef, v1, v2) in quad.iter() {
            expr = expr.add_qterm(coef, self.var(v1.index())?, self.var(v2.index())?);
        }
        Ok(expr.add_constant(constant))
    }

    fn sides(lower: f64, upper: f64) -> Vec<(ConstrSense, f64)> {
        if lower == upper {
            return vec![(ConstrSense::Equal, lower)];
        }
        let mut sides = Vec::with_capacity(2);
        if lower.is_finite() {
            sides.push((ConstrSense::Greater, lower));
        }
        if upper.is_finite() {
            sides.push((ConstrSense::Less, upper));
        }
        sides
    }
}

fn model_sense(sense: OptimizationSense) -> ModelSense {
    match sense {
        OptimizationSense::Minimize => ModelSense::Minimize,
        OptimizationSense::Maximize => ModelSense::Maximize,
    }
}

impl NativeParameters<i64> for GurobiBackend {
    type Key = param::IntParam;

    fn get_native(&self, key: &param::IntParam) -> Result<i64> {
        Ok(i64::from(self.env().get(*key)?))
    }

    fn set_native(&mut self, key: &param::IntParam, value: i64) -> Result<()> {
        let value = i32::try_from(value)?;
        self.env_mut().set(*key, value)?;
        Ok(())
    }
}

impl NativeParameters<f64> for GurobiBackend {
    type Key = param::DoubleParam;

    fn get_native(&self, key: &param::DoubleParam) -> Result<f64> {
        Ok(self.env().get(*key)?)
    }

    fn set_native(&mut self, key: &param::DoubleParam, value: f64) -> Result<()> {
        self.env_mut().set(*key, value)?;
        Ok(())
    }
}

impl NativeParameters<String> for GurobiBackend {
    type Key = param::StringParam;

    fn get_native(&self, key: &param::StringParam) -> Result<String> {
        Ok(self.env().get(*key)?)
    }

    fn set_native(&mut self, key: &param::StringParam, value: String) -> Result<()> {
        self.env_mut().set(*key, value)?;
        Ok(())
    }
}

impl Backend for GurobiBackend {
    const ACCEPTANCE: AcceptanceTable = AcceptanceTable::new(
        &[
            (Kind::Linear, Acceptance::Recommended),
            (Kind::Quadratic, Acceptance::Recommended),
        ],
        &[
            (Kind::Linear, Acceptance::Recommended),
            (Kind::Quadratic, Acceptance::Recommended),
        ],
    );
    const STATUS_TABLE: StatusTable = STATUS;

    fn solver_name(&self) -> &str {
        "Gurobi"
    }

    fn base_options(&self) -> &BaseOptions {
        &self.base
    }

    fn base_options_mut(&mut self) -> &mut BaseOptions {
        &mut self.base
    }

    fn register_options(registry: &mut OptionRegistry<Self>) -> Result<(), OptionError> {
        registry.add_solver_option::<String>("logfile", "Log file name", param::LogFile)?;
        registry.add_solver_option::<f64>(
            "optimalitytolerance",
            "Dual feasibility tolerance",
            param::OptimalityTol,
        )?;
        registry.add_solver_option::<i64>(
            "outlev",
            "1: output logging (console and file), 0: no logging",
            param::OutputFlag,
        )?;
        registry.add_solver_option::<i64>(
            "threads",
            "How many threads to use when using the barrier algorithm or solving MIP problems; 0: automatic",
            param::Threads,
        )?;
        registry.add_solver_option::<f64>("timelim", "Limit on solve time in seconds", param::TimeLimit)?;
        registry.add_solver_option::<f64>("mipgap", "Relative MIP optimality gap", param::MIPGap)
    }

    fn open(&mut self) -> Result<()> {
        self.model = Some(Model::new("mpconv", &self.env)?);
        Ok(())
    }

    fn close(&mut self) {
        self.vars.clear();
        self.var_types.clear();
        self.rows.clear();
        self.row_map.clear();
        self.quadratic_rows = 0;
        self.model = None;
    }

    fn finish_modification(&mut self) -> Result<()> {
        self.model_mut()?.update()?;
        Ok(())
    }

    fn export_model(&mut self, path: &Path) -> Result<()> {
        let file = path
            .to_str()
            .ok_or_else(|| anyhow!("export path {} is not valid UTF-8", path.display()))?;
        self.model_mut()?.write(file)?;
        Ok(())
    }

    fn add_variable(&mut self, variable: &Variable) -> Result<()> {
        let vtype = match variable.var_type {
            VariableType::Continuous => VarType::Continuous,
            VariableType::Integer => VarType::Integer,
        };
        let name = format!("x{}", self.vars.len());
        let var = self.model_mut()?.add_var(
            &name,
            vtype,
            0.0,
            variable.lower_bound,
            variable.upper_bound,
            &[],
            &[],
        )?;
        self.vars.push(var);
        self.var_types.push(variable.var_type);
        Ok(())
    }

    fn add_linear_objective(&mut self, objective: &LinearObjective) -> Result<()> {
        if self.objectives > 0 {
            return Err(anyhow!("Gurobi backend supports a single objective"));
        }
        let expr = self.lin_expr(&objective.form, objective.constant)?;
        let model = self.model_mut()?;
        model.update()?;
        model.set_objective(expr, model_sense(objective.sense))?;
        self.objectives += 1;
        Ok(())
    }

    fn add_quadratic_objective(&mut self, objective: &QuadraticObjective) -> Result<()> {
        if self.objectives > 0 {
            return Err(anyhow!("Gurobi backend supports a single objective"));
        }
        let linear = &objective.linear;
        let expr = self.quad_expr(&linear.form, &objective.quad, linear.constant)?;
        let model = self.model_mut()?;
        model.update()?;
        model.set_objective(expr, model_sense(linear.sense))?;
        self.objectives += 1;
        Ok(())
    }

    fn start_constraint(&mut self, index: usize) {
        self.row_map.start_constraint(index);
    }

    fn add_linear_constraint(&mut self, constraint: &LinearConstraint) -> Result<()> {
        for (sense, rhs) in Self::sides(constraint.lower, constraint.upper) {
            let expr = self.lin_expr(&constraint.form, 0.0)?;
            let name = format!("c{}", self.rows.len());
            let row = self.model_mut()?.add_constr(&name, expr, sense, rhs)?;
            self.rows.push(row);
            self.row_map.push_row();
        }
        Ok(())
    }

    fn add_quadratic_constraint(&mut self, constraint: &QuadraticConstraint) -> Result<()> {
        let linear = &constraint.linear;
        for (sense, rhs) in Self::sides(linear.lower, linear.upper) {
            let expr = self.quad_expr(&linear.form, &constraint.quad, 0.0)?;
            // No Pi or IISConstr for these: their model slots stay 0 / not a member.
            let name = format!("q{}", self.quadratic_rows);
            self.model_mut()?.add_qconstr(&name, expr, sense, rhs)?;
            self.quadratic_rows += 1;
        }
        Ok(())
    }

    fn set_interrupter(&mut self, interrupter: &Interrupter) -> Result<()> {
        self.interrupter = Some(interrupter.clone());
        Ok(())
    }

    fn solve(&mut self) -> Result<()> {
        self.skipped_solve = self.interrupter.as_ref().is_some_and(Interrupter::is_stopped);
        if self.skipped_solve {
            debug!(component = "gurobi", operation = "solve", status = "skipped", "Stop requested before solve");
            return Ok(());
        }
        self.model_mut()?.optimize()?;
        Ok(())
    }

    fn native_status(&self) -> Result<i32> {
        if self.skipped_solve {
            return Ok(code::INTERRUPTED);
        }
        Ok(self.model()?.status()? as i32)
    }

    fn has_feasible_solution(&self) -> bool {
        self.model()
            .and_then(|model| Ok(model.get(attr::SolCount)?))
            .is_ok_and(|count| count > 0)
    }

    fn primal_solution(&self) -> Result<Vec<f64>> {
        let model = self.model()?;
        self.vars
            .iter()
            .map(|var| Ok(var.get(model, attr::X)?))
            .collect()
    }

    fn dual_solution(&self) -> Result<Vec<f64>> {
        let model = self.model()?;
        let row_duals = self
            .rows
            .iter()
            .map(|row| Ok(row.get(model, attr::Pi)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.row_map.fold_duals(&row_duals))
    }

    fn objective_value(&self) -> Result<f64> {
        Ok(self.model()?.get(attr::ObjVal)?)
    }

    fn iterations(&self) -> u64 {
        self.model()
            .and_then(|model| Ok(model.get(attr::IterCount)?))
            .map_or(0, |count| count as u64)
    }

    fn nodes(&self) -> u64 {
        self.model()
            .and_then(|model| Ok(model.get(attr::NodeCount)?))
            .map_or(0, |count| count as u64)
    }

    fn is_mip(&self) -> bool {
        self.var_types.contains(&VariableType::Integer)
    }

    fn num_objectives(&self) -> usize {
        self.objectives
    }

    fn compute_iis(&mut self) -> Result<IisReport> {
        self.model_mut()?.compute_iis()?;
        let model = self.model()?;

        let variables = self
            .vars
            .iter()
            .map(|var| {
                let lower = var.get(model, attr::IISLB)? != 0;
                let upper = var.get(model, attr::IISUB)? != 0;
                Ok(match (lower, upper) {
                    (true, true) => IisStatus::Fixed,
                    (true, false) => IisStatus::AtLower,
                    (false, true) => IisStatus::AtUpper,
                    (false, false) => IisStatus::NotMember,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let constraints = self
            .rows
            .iter()
            .map(|row| {
                Ok(if row.get(model, attr::IISConstr)? != 0 {
                    IisStatus::Member
                } else {
                    IisStatus::NotMember
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(IisReport {
            variables,
            constraints: self.row_map.fold_iis(&constraints),
        })
    }

    fn mip_gap(&self) -> Option<f64> {
        self.model()
            .and_then(|model| Ok(model.get(attr::MIPGap)?))
            .ok()
    }
}
