//! Lifecycle driver between a [`Model`] and a [`Backend`]
//!
//! A [`Session`] owns one backend instance and walks it through
//!
//! ```text
//! Created -> ModificationOpen -> ModificationClosed -> Solved -> Reported -> Closed
//! ```
//!
//! Every element added during the modification phase is classified,
//! resolved against the backend's acceptance table and posted through the
//! matching typed method. The first failure aborts the phase: later
//! modifications, `finish_modification` and `solve` all fail with
//! [`ConvertError::ModificationAborted`]. The backend's native resources are
//! released exactly once, either by [`Session::close`] or on drop.
//!
//! ```rust
//! use mpconv::backend::CollectedSolution;
//! use mpconv::model::{Model, Objective, OptimizationSense, VariableType};
//! # use mpconv::session::Session;
//! # fn solve<B: mpconv::backend::Backend>(backend: B) -> Result<(), mpconv::ConvertError> {
//! let mut model = Model::new();
//! let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//! model.add_objective(Objective::new(OptimizationSense::Minimize, x));
//!
//! let mut sink = CollectedSolution::new();
//! let mut session = Session::new(backend, &mut sink)?;
//! session.set_option("timing", 1_i64)?;
//! let report = session.run(&model)?;
//! println!("{}", report.message);
//! # Ok(())
//! # }
//! ```

mod report;

pub use report::{SolveReport, SolveTimes};

use std::fmt;
use std::path::Path;
use std::time::Instant;

use itertools::Itertools;
use tracing::{debug, error, trace, warn};

use crate::acceptance::{RewriteContext, resolve_constraint, resolve_objective};
use crate::backend::{
    Backend, SolutionSink, Suffix, post_constraint, post_objective, register_base_options,
};
use crate::classify::{classify_constraint, classify_objective};
use crate::error::{ConvertError, Element};
use crate::flat::Kind;
use crate::model::{Constraint, Model, Objective, VarId, Variable};
use crate::options::{OptionKind, OptionRegistry, OptionValue};
use crate::status::{Interrupter, SolveStatus, Translation, solve_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    ModificationOpen,
    ModificationClosed,
    Solved,
    Reported,
    Closed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "Created",
            LifecycleState::ModificationOpen => "ModificationOpen",
            LifecycleState::ModificationClosed => "ModificationClosed",
            LifecycleState::Solved => "Solved",
            LifecycleState::Reported => "Reported",
            LifecycleState::Closed => "Closed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session behaviour switches.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Skip unsupported elements with a warning instead of failing.
    pub permissive: bool,
    /// Stop flag handed to the backend before the first solve.
    pub interrupter: Interrupter,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            permissive: false,
            interrupter: Interrupter::global(),
        }
    }
}

impl SessionConfig {
    pub fn with_permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    pub fn with_interrupter(mut self, interrupter: Interrupter) -> Self {
        self.interrupter = interrupter;
        self
    }
}

#[derive(Debug, Default)]
struct Stats {
    opened_at: Option<Instant>,
    solve_ended_at: Option<Instant>,
    times: SolveTimes,
}

pub struct Session<B: Backend, S: SolutionSink> {
    backend: B,
    sink: S,
    options: OptionRegistry<B>,
    config: SessionConfig,
    state: LifecycleState,
    opened: bool,
    aborted: bool,
    interrupter_registered: bool,
    variables: Vec<Variable>,
    skipped: Vec<(Element, Kind)>,
    solve_failure: Option<String>,
    stats: Stats,
}

impl<B: Backend, S: SolutionSink> Session<B, S> {
    pub fn new(backend: B, sink: S) -> Result<Self, ConvertError> {
        Self::with_config(backend, sink, SessionConfig::default())
    }

    pub fn with_config(backend: B, sink: S, config: SessionConfig) -> Result<Self, ConvertError> {
        let mut options = OptionRegistry::new();
        register_base_options(&mut options)
            .and_then(|()| B::register_options(&mut options))
            .map_err(|source| ConvertError::Option {
                backend: backend.long_name(),
                source,
            })?;

        debug!(
            component = "session",
            operation = "new",
            backend = %backend.long_name(),
            options = options.len(),
            permissive = config.permissive,
            "Session created"
        );

        Ok(Self {
            backend,
            sink,
            options,
            config,
            state: LifecycleState::Created,
            opened: false,
            aborted: false,
            interrupter_registered: false,
            variables: Vec::new(),
            skipped: Vec::new(),
            solve_failure: None,
            stats: Stats::default(),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Elements skipped in permissive mode.
    pub fn skipped(&self) -> &[(Element, Kind)] {
        &self.skipped
    }

    /// Phase durations, available once the session has been solved.
    pub fn times(&self) -> Option<SolveTimes> {
        self.stats.solve_ended_at.map(|_| self.stats.times)
    }

    pub fn options(&self) -> &OptionRegistry<B> {
        &self.options
    }

    fn backend_name(&self) -> String {
        self.backend.long_name()
    }

    fn violation(&self, operation: &'static str) -> ConvertError {
        ConvertError::LifecycleViolation {
            backend: self.backend_name(),
            state: self.state.as_str(),
            operation,
        }
    }

    fn native_failure(&self, operation: &'static str, err: anyhow::Error) -> ConvertError {
        ConvertError::NativeFailure {
            backend: self.backend_name(),
            operation,
            message: format!("{err:#}"),
        }
    }

    fn expect_state(&self, expected: LifecycleState, operation: &'static str) -> Result<(), ConvertError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.violation(operation))
        }
    }

    fn check_not_aborted(&self, operation: &'static str) -> Result<(), ConvertError> {
        if self.aborted {
            Err(ConvertError::ModificationAborted {
                backend: self.backend_name(),
                operation,
            })
        } else {
            Ok(())
        }
    }

    fn check_modifiable(&self, operation: &'static str) -> Result<(), ConvertError> {
        self.expect_state(LifecycleState::ModificationOpen, operation)?;
        self.check_not_aborted(operation)
    }

    fn abort(&mut self, err: ConvertError) -> ConvertError {
        self.aborted = true;
        error!(
            component = "session",
            operation = "modify",
            status = "aborted",
            code = err.code(),
            error = %err,
            "Modification phase aborted"
        );
        err
    }

    fn check_options_usable(&self, operation: &'static str) -> Result<(), ConvertError> {
        if self.state == LifecycleState::Closed {
            Err(self.violation(operation))
        } else {
            Ok(())
        }
    }

    pub fn get_option<T: OptionKind>(&self, name: &str) -> Result<T, ConvertError> {
        self.check_options_usable("read option")?;
        self.options
            .get(&self.backend, name)
            .map_err(|source| ConvertError::Option {
                backend: self.backend_name(),
                source,
            })
    }

    pub fn set_option(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), ConvertError> {
        self.check_options_usable("set option")?;
        let value = value.into();
        trace!(component = "session", operation = "set_option", option = name, value = %value);
        self.options
            .set(&mut self.backend, name, value)
            .map_err(|source| ConvertError::Option {
                backend: self.backend.long_name(),
                source,
            })
    }

    /// Apply an option string such as `"timing=1 threads 4"`. Returns the
    /// number of options set.
    pub fn parse_options(&mut self, text: &str) -> Result<usize, ConvertError> {
        self.check_options_usable("set option")?;
        let count = self
            .options
            .parse_option_string(&mut self.backend, text)
            .map_err(|source| ConvertError::Option {
                backend: self.backend.long_name(),
                source,
            })?;
        debug!(component = "session", operation = "parse_options", count, "Options applied");
        Ok(count)
    }

    pub fn option_help(&self) -> String {
        self.options.format_help()
    }

    pub fn open(&mut self) -> Result<(), ConvertError> {
        self.expect_state(LifecycleState::Created, "open")?;
        self.stats.opened_at = Some(Instant::now());

        if let Err(err) = self.backend.open() {
            self.state = LifecycleState::Closed;
            let err = self.native_failure("open", err);
            error!(component = "session", operation = "open", status = "error", error = %err, "Failed to open backend");
            return Err(err);
        }
        self.opened = true;

        if let Err(err) = self.backend.init_modification() {
            let err = self.native_failure("start modification", err);
            error!(component = "session", operation = "open", status = "error", error = %err, "Failed to start modification");
            self.release();
            return Err(err);
        }

        self.state = LifecycleState::ModificationOpen;
        debug!(component = "session", operation = "open", status = "success", backend = %self.backend_name(), "Backend opened");
        Ok(())
    }

    pub fn add_variable(&mut self, variable: &Variable) -> Result<VarId, ConvertError> {
        self.check_modifiable("add variable")?;
        if let Err(err) = self.backend.add_variable(variable) {
            let err = self.native_failure("add variable", err);
            return Err(self.abort(err));
        }
        let id = VarId::new(self.variables.len());
        self.variables.push(*variable);
        trace!(component = "session", operation = "add_variable", variable = %id, var_type = ?variable.var_type);
        Ok(id)
    }

    fn unsupported(&mut self, element: Element, kind: Kind) -> Result<(), ConvertError> {
        if self.config.permissive {
            warn!(
                component = "session",
                operation = "add",
                status = "skipped",
                element = %element,
                kind = %kind,
                "Element not supported by backend, skipping"
            );
            self.skipped.push((element, kind));
            return Ok(());
        }
        let err = ConvertError::UnsupportedConstruct {
            backend: self.backend_name(),
            element,
            kind,
        };
        Err(self.abort(err))
    }

    pub fn add_objective(&mut self, index: usize, objective: &Objective) -> Result<(), ConvertError> {
        self.check_modifiable("add objective")?;
        let element = Element::Objective(index);
        let flat = classify_objective(objective);

        let flat = match resolve_objective(flat, &B::ACCEPTANCE) {
            Ok(flat) => flat,
            Err(unsupported) => return self.unsupported(element, unsupported.kind),
        };
        trace!(component = "session", operation = "add_objective", element = %element, kind = %flat.kind());

        if let Err(err) = post_objective(&mut self.backend, &flat) {
            let err = self.native_failure("add objective", err);
            return Err(self.abort(err));
        }
        Ok(())
    }

    pub fn add_constraint(&mut self, index: usize, constraint: &Constraint) -> Result<(), ConvertError> {
        self.check_modifiable("add constraint")?;
        let element = Element::Constraint(index);
        self.backend.start_constraint(index);
        let flat = classify_constraint(constraint);
        let kind = flat.kind();

        let context = RewriteContext::new(&self.variables);
        let pieces = match resolve_constraint(flat, &B::ACCEPTANCE, &context) {
            Ok(pieces) => pieces,
            Err(unsupported) => return self.unsupported(element, unsupported.kind),
        };
        trace!(
            component = "session",
            operation = "add_constraint",
            element = %element,
            kind = %kind,
            posted = %pieces.iter().map(|piece| piece.kind()).join(", "),
        );

        for piece in &pieces {
            if let Err(err) = post_constraint(&mut self.backend, piece) {
                let err = self.native_failure("add constraint", err);
                return Err(self.abort(err));
            }
        }
        Ok(())
    }

    /// Add every variable, objective and constraint of `model`, in order.
    pub fn load_model(&mut self, model: &Model) -> Result<(), ConvertError> {
        self.check_modifiable("load model")?;
        let start = Instant::now();

        for variable in model.variables() {
            self.add_variable(variable)?;
        }
        for (index, objective) in model.objectives().iter().enumerate() {
            self.add_objective(index, objective)?;
        }
        for (index, constraint) in model.constraints().iter().enumerate() {
            self.add_constraint(index, constraint)?;
        }

        debug!(
            component = "session",
            operation = "load_model",
            status = "success",
            variables = model.num_variables(),
            objectives = model.objectives().len(),
            constraints = model.constraints().len(),
            skipped = self.skipped.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );
        Ok(())
    }

    pub fn finish_modification(&mut self) -> Result<(), ConvertError> {
        self.expect_state(LifecycleState::ModificationOpen, "finish modification")?;
        self.check_not_aborted("finish modification")?;

        if let Err(err) = self.backend.finish_modification() {
            let err = self.native_failure("finish modification", err);
            return Err(self.abort(err));
        }

        let export_file = self.backend.base_options().export_file.clone();
        if !export_file.is_empty() {
            if let Err(err) = self.backend.export_model(Path::new(&export_file)) {
                let err = self.native_failure("export model", err);
                return Err(self.abort(err));
            }
            debug!(component = "session", operation = "export", file = %export_file, "Model exported");
        }

        if !self.skipped.is_empty() {
            warn!(
                component = "session",
                operation = "finish_modification",
                skipped = %self.skipped.iter().map(|(element, kind)| format!("{element} ({kind})")).join(", "),
                "Some elements were not passed to the backend"
            );
        }

        self.state = LifecycleState::ModificationClosed;
        debug!(component = "session", operation = "finish_modification", status = "success", "Modification phase closed");
        Ok(())
    }

    pub fn solve(&mut self) -> Result<(), ConvertError> {
        self.expect_state(LifecycleState::ModificationClosed, "solve")?;
        self.check_not_aborted("solve")?;

        // A stop left over from an earlier solve must not leak into this one.
        self.config.interrupter.reset();
        if !self.interrupter_registered {
            if let Err(err) = self.backend.set_interrupter(&self.config.interrupter) {
                return Err(self.native_failure("register interrupter", err));
            }
            self.interrupter_registered = true;
        }

        let started = Instant::now();
        self.stats.times.setup = self
            .stats
            .opened_at
            .map(|opened| started.duration_since(opened))
            .unwrap_or_default();

        let result = self.backend.solve();

        let ended = Instant::now();
        self.stats.times.solution = ended.duration_since(started);
        self.stats.solve_ended_at = Some(ended);
        self.state = LifecycleState::Solved;

        match result {
            Ok(()) => {
                debug!(
                    component = "session",
                    operation = "solve",
                    status = "success",
                    duration_ms = self.stats.times.solution.as_millis() as u64,
                    "Solve finished"
                );
                Ok(())
            }
            Err(err) => {
                let err = self.native_failure("solve", err);
                if let ConvertError::NativeFailure { message, .. } = &err {
                    self.solve_failure = Some(message.clone());
                }
                error!(component = "session", operation = "solve", status = "error", error = %err, "Native solve failed");
                Err(err)
            }
        }
    }

    fn translate(&self) -> Result<Translation, ConvertError> {
        if self.config.interrupter.is_stopped() {
            return Ok(Translation::new(SolveStatus::Interrupted, "interrupted"));
        }
        if let Some(message) = &self.solve_failure {
            return Ok(Translation::new(SolveStatus::Error, message.clone()));
        }
        let native = self
            .backend
            .native_status()
            .map_err(|err| self.native_failure("query status", err))?;
        Ok(B::STATUS_TABLE.translate(
            native,
            self.config.interrupter.is_stopped(),
            self.backend.has_feasible_solution(),
        ))
    }

    pub fn report(&mut self) -> Result<SolveReport, ConvertError> {
        self.expect_state(LifecycleState::Solved, "report")?;
        let translation = self.translate()?;
        let long_name = self.backend_name();
        let mut message = report::summary_line(&long_name, &translation.message);

        let mut primal = None;
        let mut dual = None;
        let mut objective_value = None;

        if self.solve_failure.is_none() {
            let is_mip = self.backend.is_mip();
            if translation.solve_code < solve_code::INFEASIBLE {
                primal = Some(
                    self.backend
                        .primal_solution()
                        .map_err(|err| self.native_failure("read primal solution", err))?,
                );
                if !is_mip {
                    let values = self
                        .backend
                        .dual_solution()
                        .map_err(|err| self.native_failure("read dual solution", err))?;
                    if !values.is_empty() {
                        dual = Some(values);
                    }
                }
                if self.backend.num_objectives() > 0 {
                    objective_value = Some(
                        self.backend
                            .objective_value()
                            .map_err(|err| self.native_failure("read objective value", err))?,
                    );
                }
            }

            let nodes = is_mip.then(|| self.backend.nodes());
            message.push_str(&report::statistics_line(
                self.backend.iterations(),
                nodes,
                objective_value,
            ));

            self.report_suffixes(translation.status, is_mip);
        }

        self.sink.handle_solution(
            translation.solve_code,
            &message,
            primal.as_deref(),
            dual.as_deref(),
            objective_value,
        );

        if let Some(ended) = self.stats.solve_ended_at {
            self.stats.times.output = ended.elapsed();
        }
        if self.backend.base_options().timing != 0 {
            self.sink.print(&report::timing_block(&self.stats.times));
        }

        self.state = LifecycleState::Reported;
        debug!(
            component = "session",
            operation = "report",
            status = %translation.status,
            solve_code = translation.solve_code,
            "Solution reported"
        );

        Ok(SolveReport {
            status: translation.status,
            solve_code: translation.solve_code,
            message,
            objective_value,
            primal,
            dual,
        })
    }

    fn report_suffixes(&mut self, status: SolveStatus, is_mip: bool) {
        let options = self.backend.base_options().clone();

        if options.iis_find != 0
            && matches!(status, SolveStatus::Infeasible | SolveStatus::InfeasibleOrUnbounded)
        {
            match self.backend.compute_iis() {
                Ok(iis) => {
                    let variables: Vec<i64> = iis.variables.iter().map(|s| s.code()).collect();
                    let constraints: Vec<i64> = iis.constraints.iter().map(|s| s.code()).collect();
                    self.sink.report_int_suffix(Suffix::IIS_VARIABLES, &variables);
                    self.sink.report_int_suffix(Suffix::IIS_CONSTRAINTS, &constraints);
                }
                Err(err) => warn!(
                    component = "session",
                    operation = "compute_iis",
                    status = "error",
                    error = %err,
                    "IIS computation failed"
                ),
            }
        }

        if options.return_mip_gap & 3 != 0 && is_mip {
            let gap = self.backend.mip_gap().unwrap_or(f64::INFINITY);
            if options.return_mip_gap & 1 != 0 {
                let values = vec![gap; self.backend.num_objectives()];
                self.sink.report_dbl_suffix(Suffix::MIP_GAP_OBJECTIVE, &values);
            }
            if options.return_mip_gap & 2 != 0 {
                self.sink.report_dbl_suffix(Suffix::MIP_GAP_PROBLEM, &[gap]);
            }
        }
    }

    fn release(&mut self) {
        if self.opened {
            self.backend.close();
            self.opened = false;
            debug!(component = "session", operation = "close", backend = %self.backend_name(), "Backend closed");
        }
        self.state = LifecycleState::Closed;
    }

    /// Release native resources. Allowed from any state but `Closed`.
    pub fn close(&mut self) -> Result<(), ConvertError> {
        if self.state == LifecycleState::Closed {
            return Err(self.violation("close"));
        }
        self.release();
        Ok(())
    }

    /// Open, load, finish, solve and report `model`, then close.
    ///
    /// A failed native solve is still reported to the sink before the error
    /// is returned.
    pub fn run(&mut self, model: &Model) -> Result<SolveReport, ConvertError> {
        let outcome = self.drive(model);
        if self.state != LifecycleState::Closed {
            self.release();
        }
        outcome
    }

    fn drive(&mut self, model: &Model) -> Result<SolveReport, ConvertError> {
        self.open()?;
        self.load_model(model)?;
        self.finish_modification()?;
        if let Err(err) = self.solve() {
            if self.state == LifecycleState::Solved {
                self.report()?;
            }
            return Err(err);
        }
        self.report()
    }
}

impl<B: Backend, S: SolutionSink> Drop for Session<B, S> {
    fn drop(&mut self) {
        if self.state != LifecycleState::Closed {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests;
