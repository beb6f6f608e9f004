//! Scripted backend for exercising the session without a native solver.
//!
//! The backend records every call it receives and answers queries from a
//! [`Script`]. The acceptance table comes from a [`Policy`] type so tests can
//! pick what the "solver" supports.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Result, anyhow};

use super::{Backend, BaseOptions, IisReport, IisStatus, RowMap};
use crate::acceptance::{Acceptance, AcceptanceTable};
use crate::flat::{
    FuncConstraint, IndicatorConstraintLinLE, Kind, LinearConstraint, LinearObjective,
    QuadraticObjective,
};
use crate::model::{Variable, VariableType};
use crate::options::{NativeParameters, OptionRegistry};
use crate::error::OptionError;
use crate::status::{Interrupter, SolveStatus, StatusEntry, StatusTable};

pub const OPTIMAL: i32 = 2;
pub const INFEASIBLE: i32 = 3;
pub const TIME_LIMIT: i32 = 9;

pub trait Policy: 'static {
    const ACCEPTANCE: AcceptanceTable;
}

/// Linear elements only; everything else must be rewritten.
pub struct LinearPolicy;

impl Policy for LinearPolicy {
    const ACCEPTANCE: AcceptanceTable = crate::acceptance::LINEAR_ONLY;
}

/// Linear and quadratic objectives, plus native max and indicator constraints.
pub struct RichPolicy;

impl Policy for RichPolicy {
    const ACCEPTANCE: AcceptanceTable = AcceptanceTable::new(
        &[
            (Kind::Linear, Acceptance::Recommended),
            (Kind::Quadratic, Acceptance::Recommended),
        ],
        &[
            (Kind::Linear, Acceptance::Recommended),
            (Kind::Max, Acceptance::Recommended),
            (Kind::IndicatorLinLE, Acceptance::AcceptedButNotRecommended),
        ],
    );
}

/// Answers the scripted backend gives after a solve.
#[derive(Debug, Clone)]
pub struct Script {
    pub native_status: i32,
    pub feasible: bool,
    pub primal: Vec<f64>,
    pub dual: Vec<f64>,
    pub objective: f64,
    pub iterations: u64,
    pub nodes: u64,
    pub solve_error: Option<String>,
    pub reject_variables: bool,
    pub stop_during_solve: bool,
    pub iis: Option<IisReport>,
    pub mip_gap: Option<f64>,
    /// Per native row; folded onto model constraints when set.
    pub row_duals: Vec<f64>,
    pub row_iis: Vec<IisStatus>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            native_status: OPTIMAL,
            feasible: true,
            primal: Vec::new(),
            dual: Vec::new(),
            objective: 0.0,
            iterations: 0,
            nodes: 0,
            solve_error: None,
            reject_variables: false,
            stop_during_solve: false,
            iis: None,
            mip_gap: None,
            row_duals: Vec::new(),
            row_iis: Vec::new(),
        }
    }
}

pub struct ScriptedBackend<P: Policy = LinearPolicy> {
    pub script: Script,
    pub base: BaseOptions,
    pub threads: i64,
    pub params: Vec<(String, f64)>,
    calls: Rc<RefCell<Vec<String>>>,
    closes: Rc<Cell<usize>>,
    interrupter: Option<Interrupter>,
    variables: Vec<Variable>,
    objectives: usize,
    row_map: RowMap,
    _policy: std::marker::PhantomData<P>,
}

/// Handles a test keeps after moving the backend into a session.
#[derive(Clone)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<String>>>,
    closes: Rc<Cell<usize>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.get()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.borrow().iter().filter(|call| call.starts_with(prefix)).count()
    }
}

impl<P: Policy> ScriptedBackend<P> {
    pub fn new(script: Script) -> (Self, Recorder) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let closes = Rc::new(Cell::new(0));
        let recorder = Recorder {
            calls: Rc::clone(&calls),
            closes: Rc::clone(&closes),
        };
        let backend = Self {
            script,
            base: BaseOptions::default(),
            threads: 0,
            params: Vec::new(),
            calls,
            closes,
            interrupter: None,
            variables: Vec::new(),
            objectives: 0,
            row_map: RowMap::new(),
            _policy: std::marker::PhantomData,
        };
        (backend, recorder)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl<P: Policy> NativeParameters<f64> for ScriptedBackend<P> {
    type Key = &'static str;

    fn get_native(&self, key: &&'static str) -> Result<f64> {
        self.params
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
            .ok_or_else(|| anyhow!("parameter {key} not set"))
    }

    fn set_native(&mut self, key: &&'static str, value: f64) -> Result<()> {
        if value < 0.0 {
            return Err(anyhow!("{key} must be non-negative"));
        }
        self.params.push((key.to_string(), value));
        Ok(())
    }
}

const STATUS: StatusTable = StatusTable::new(&[
    StatusEntry::new(OPTIMAL, SolveStatus::Optimal, "optimal solution"),
    StatusEntry::new(INFEASIBLE, SolveStatus::Infeasible, "infeasible problem"),
    StatusEntry::new(TIME_LIMIT, SolveStatus::FeasibleUncertain, "time limit"),
]);

impl<P: Policy> Backend for ScriptedBackend<P> {
    const ACCEPTANCE: AcceptanceTable = P::ACCEPTANCE;
    const STATUS_TABLE: StatusTable = STATUS;

    fn solver_name(&self) -> &str {
        "scripted"
    }

    fn solver_version(&self) -> String {
        "1.0".to_string()
    }

    fn base_options(&self) -> &BaseOptions {
        &self.base
    }

    fn base_options_mut(&mut self) -> &mut BaseOptions {
        &mut self.base
    }

    fn register_options(registry: &mut OptionRegistry<Self>) -> Result<(), OptionError> {
        crate::stored_option!(registry, "threads", "Number of threads", threads)?;
        registry.add_solver_option::<f64>("timelim", "Time limit in seconds", "TimeLimit")
    }

    fn open(&mut self) -> Result<()> {
        self.record("open");
        Ok(())
    }

    fn close(&mut self) {
        self.record("close");
        self.closes.set(self.closes.get() + 1);
    }

    fn init_modification(&mut self) -> Result<()> {
        self.record("init_modification");
        Ok(())
    }

    fn finish_modification(&mut self) -> Result<()> {
        self.record("finish_modification");
        Ok(())
    }

    fn export_model(&mut self, path: &Path) -> Result<()> {
        self.record(format!("export {}", path.display()));
        std::fs::write(path, "scripted model\n")?;
        Ok(())
    }

    fn add_variable(&mut self, variable: &Variable) -> Result<()> {
        if self.script.reject_variables {
            return Err(anyhow!("variable rejected"));
        }
        self.record("add_variable");
        self.variables.push(*variable);
        Ok(())
    }

    fn add_linear_objective(&mut self, objective: &LinearObjective) -> Result<()> {
        self.record(format!("add_linear_objective {}", objective.form.len()));
        self.objectives += 1;
        Ok(())
    }

    fn add_quadratic_objective(&mut self, objective: &QuadraticObjective) -> Result<()> {
        self.record(format!("add_quadratic_objective {}", objective.quad.len()));
        self.objectives += 1;
        Ok(())
    }

    fn start_constraint(&mut self, index: usize) {
        self.row_map.start_constraint(index);
    }

    /// Ranged rows take two native rows, like a solver without range rows.
    fn add_linear_constraint(&mut self, constraint: &LinearConstraint) -> Result<()> {
        self.record(format!("add_linear_constraint {}", constraint.form.len()));
        let sides = if constraint.is_equality() {
            1
        } else {
            usize::from(constraint.lower.is_finite()) + usize::from(constraint.upper.is_finite())
        };
        for _ in 0..sides {
            self.row_map.push_row();
        }
        Ok(())
    }

    fn add_max_constraint(&mut self, constraint: &FuncConstraint) -> Result<()> {
        self.record(format!("add_max_constraint {}", constraint.args.len()));
        Ok(())
    }

    fn add_indicator_constraint(&mut self, _constraint: &IndicatorConstraintLinLE) -> Result<()> {
        self.record("add_indicator_constraint");
        Ok(())
    }

    fn set_interrupter(&mut self, interrupter: &Interrupter) -> Result<()> {
        self.record("set_interrupter");
        self.interrupter = Some(interrupter.clone());
        Ok(())
    }

    fn solve(&mut self) -> Result<()> {
        self.record("solve");
        if self.script.stop_during_solve {
            if let Some(interrupter) = &self.interrupter {
                interrupter.stop();
            }
        }
        match &self.script.solve_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn native_status(&self) -> Result<i32> {
        Ok(self.script.native_status)
    }

    fn has_feasible_solution(&self) -> bool {
        self.script.feasible
    }

    fn primal_solution(&self) -> Result<Vec<f64>> {
        Ok(self.script.primal.clone())
    }

    fn dual_solution(&self) -> Result<Vec<f64>> {
        if self.script.row_duals.is_empty() {
            return Ok(self.script.dual.clone());
        }
        Ok(self.row_map.fold_duals(&self.script.row_duals))
    }

    fn objective_value(&self) -> Result<f64> {
        Ok(self.script.objective)
    }

    fn iterations(&self) -> u64 {
        self.script.iterations
    }

    fn nodes(&self) -> u64 {
        self.script.nodes
    }

    fn is_mip(&self) -> bool {
        self.variables
            .iter()
            .any(|var| var.var_type == VariableType::Integer)
    }

    fn num_objectives(&self) -> usize {
        self.objectives
    }

    fn compute_iis(&mut self) -> Result<IisReport> {
        self.record("compute_iis");
        let mut iis = self
            .script
            .iis
            .clone()
            .ok_or_else(|| anyhow!("no IIS available"))?;
        if !self.script.row_iis.is_empty() {
            iis.constraints = self.row_map.fold_iis(&self.script.row_iis);
        }
        Ok(iis)
    }

    fn mip_gap(&self) -> Option<f64> {
        self.script.mip_gap
    }
}
