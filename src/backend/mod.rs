//! Solver backend abstraction
//!
//! A [`Backend`] wraps one native solver. It declares which element kinds it
//! accepts ([`Backend::ACCEPTANCE`]), how its native result codes translate
//! ([`Backend::STATUS_TABLE`]), and exposes one typed `add_*` method per kind.
//! Methods for kinds a backend never accepts keep their default, which
//! returns an error naming the solver.
//!
//! Backends report failures with [`anyhow::Result`]; the
//! [`Session`](crate::session::Session) driving them converts those into
//! [`ConvertError`](crate::ConvertError)s.
//!
//! # Solver Selection
//!
//! The native backend can be selected via the `MPCONV_SOLVER` environment
//! variable:
//! - `"gurobi"` - Use Gurobi (requires `gurobi` feature)
//! - `"coin_cbc"` or `"cbc"` - Use COIN-OR CBC (requires `coin_cbc` feature)
//!
//! If not set, the solver defaults to Gurobi if available, otherwise CBC.

mod sink;

#[cfg(feature = "coin_cbc")]
pub mod coin_cbc;
#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod lp_format;
#[cfg(feature = "coin_cbc")]
mod output_suppression;
mod row_map;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use row_map::RowMap;
pub use sink::{CollectedSolution, SolutionSink, Suffix, SuffixTarget};

use std::env;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::acceptance::AcceptanceTable;
use crate::error::OptionError;
use crate::flat::{
    FlatConstraint, FlatObjective, FuncConstraint, GeneralConstraint, GeneralObjective,
    IndicatorConstraintLinLE, LinearConstraint, LinearDefiningConstraint, LinearObjective,
    QuadraticConstraint, QuadraticObjective,
};
use crate::model::{Model, Variable};
use crate::options::OptionRegistry;
use crate::session::{Session, SessionConfig, SolveReport};
use crate::status::{Interrupter, StatusTable};

/// Options every backend carries, registered by the session for all
/// backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseOptions {
    /// Print setup, solution and output times after the report.
    pub timing: i64,
    /// Export the model to this file before solving.
    pub export_file: String,
    /// Compute an irreducible infeasible subsystem for infeasible problems.
    pub iis_find: i64,
    /// Bit 1: report the relative MIP gap on objectives; bit 2: on the problem.
    pub return_mip_gap: i64,
}

/// Per-element membership in an irreducible infeasible subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum IisStatus {
    NotMember = 0,
    AtLower = 1,
    Fixed = 2,
    AtUpper = 3,
    Member = 4,
    PossibleMember = 5,
    PossiblyAtLower = 6,
    PossiblyAtUpper = 7,
}

impl IisStatus {
    pub fn code(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IisReport {
    pub variables: Vec<IisStatus>,
    pub constraints: Vec<IisStatus>,
}

fn unsupported(solver: &str, what: &str) -> anyhow::Error {
    anyhow!("{solver} does not support {what}")
}

pub trait Backend: Sized + 'static {
    const ACCEPTANCE: AcceptanceTable;
    const STATUS_TABLE: StatusTable;

    fn solver_name(&self) -> &str;

    fn solver_version(&self) -> String {
        String::new()
    }

    /// Name used in reports, e.g. `"CBC 2.10.5"`.
    fn long_name(&self) -> String {
        let version = self.solver_version();
        if version.is_empty() {
            self.solver_name().to_string()
        } else {
            format!("{} {}", self.solver_name(), version)
        }
    }

    fn base_options(&self) -> &BaseOptions;

    fn base_options_mut(&mut self) -> &mut BaseOptions;

    /// Register backend specific options.
    fn register_options(_registry: &mut OptionRegistry<Self>) -> Result<(), OptionError> {
        Ok(())
    }

    /// Acquire native resources.
    fn open(&mut self) -> Result<()>;

    /// Release native resources. Called exactly once per opened session.
    fn close(&mut self);

    fn init_modification(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish_modification(&mut self) -> Result<()> {
        Ok(())
    }

    fn export_model(&mut self, _path: &Path) -> Result<()> {
        Err(unsupported(self.solver_name(), "model export"))
    }

    fn add_variable(&mut self, variable: &Variable) -> Result<()>;

    fn add_linear_objective(&mut self, objective: &LinearObjective) -> Result<()>;

    fn add_quadratic_objective(&mut self, _objective: &QuadraticObjective) -> Result<()> {
        Err(unsupported(self.solver_name(), "quadratic objectives"))
    }

    fn add_general_objective(&mut self, _objective: &GeneralObjective) -> Result<()> {
        Err(unsupported(self.solver_name(), "general nonlinear objectives"))
    }

    /// Called before the pieces of model constraint `index` are posted, also
    /// when the constraint ends up skipped.
    fn start_constraint(&mut self, _index: usize) {}

    fn add_linear_constraint(&mut self, constraint: &LinearConstraint) -> Result<()>;

    fn add_quadratic_constraint(&mut self, _constraint: &QuadraticConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "quadratic constraints"))
    }

    fn add_linear_defining_constraint(&mut self, constraint: &LinearDefiningConstraint) -> Result<()> {
        self.add_linear_constraint(&constraint.to_linear_constraint())
    }

    fn add_max_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "max constraints"))
    }

    fn add_min_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "min constraints"))
    }

    fn add_abs_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "abs constraints"))
    }

    fn add_conjunction_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "and constraints"))
    }

    fn add_disjunction_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "or constraints"))
    }

    fn add_indicator_constraint(&mut self, _constraint: &IndicatorConstraintLinLE) -> Result<()> {
        Err(unsupported(self.solver_name(), "indicator constraints"))
    }

    fn add_exp_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "exp constraints"))
    }

    fn add_expa_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "exponential constraints with a constant base"))
    }

    fn add_log_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "log constraints"))
    }

    fn add_loga_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "logarithm constraints with a constant base"))
    }

    fn add_pow_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "power constraints"))
    }

    fn add_sin_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "sin constraints"))
    }

    fn add_cos_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "cos constraints"))
    }

    fn add_tan_constraint(&mut self, _constraint: &FuncConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "tan constraints"))
    }

    fn add_general_constraint(&mut self, _constraint: &GeneralConstraint) -> Result<()> {
        Err(unsupported(self.solver_name(), "general nonlinear constraints"))
    }

    /// Hand the stop flag to the native solver. Called once, before the
    /// first solve.
    fn set_interrupter(&mut self, _interrupter: &Interrupter) -> Result<()> {
        Ok(())
    }

    fn solve(&mut self) -> Result<()>;

    /// Native result code of the last solve, looked up in
    /// [`Backend::STATUS_TABLE`].
    fn native_status(&self) -> Result<i32>;

    fn has_feasible_solution(&self) -> bool;

    fn primal_solution(&self) -> Result<Vec<f64>>;

    /// One value per model constraint, see [`RowMap`].
    fn dual_solution(&self) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn objective_value(&self) -> Result<f64>;

    fn iterations(&self) -> u64 {
        0
    }

    fn nodes(&self) -> u64 {
        0
    }

    fn is_mip(&self) -> bool;

    fn num_objectives(&self) -> usize;

    /// Constraint statuses are indexed like model constraints.
    fn compute_iis(&mut self) -> Result<IisReport> {
        Err(unsupported(self.solver_name(), "IIS computation"))
    }

    /// Relative MIP gap of the last solve, if the solver reports one.
    fn mip_gap(&self) -> Option<f64> {
        None
    }
}

/// Register the options every backend shares.
pub(crate) fn register_base_options<B: Backend>(
    registry: &mut OptionRegistry<B>,
) -> Result<(), OptionError> {
    registry.add_stored_option(
        "timing",
        "Print setup, solution and output times (0 or 1)",
        |backend: &B| &backend.base_options().timing,
        |backend: &mut B| &mut backend.base_options_mut().timing,
    )?;
    registry.add_stored_option(
        "writeprob",
        "Export the model to this file before solving",
        |backend: &B| &backend.base_options().export_file,
        |backend: &mut B| &mut backend.base_options_mut().export_file,
    )?;
    registry.add_stored_option(
        "iisfind",
        "Report an irreducible infeasible subsystem for infeasible problems (0 or 1)",
        |backend: &B| &backend.base_options().iis_find,
        |backend: &mut B| &mut backend.base_options_mut().iis_find,
    )?;
    registry.add_stored_option(
        "return_mipgap",
        "Report the relative MIP gap: 1 on objectives, 2 on the problem, 3 both",
        |backend: &B| &backend.base_options().return_mip_gap,
        |backend: &mut B| &mut backend.base_options_mut().return_mip_gap,
    )?;
    Ok(())
}

/// Post an objective through the matching typed method.
pub fn post_objective<B: Backend>(backend: &mut B, objective: &FlatObjective) -> Result<()> {
    match objective {
        FlatObjective::Linear(obj) => backend.add_linear_objective(obj),
        FlatObjective::Quadratic(obj) => backend.add_quadratic_objective(obj),
        FlatObjective::General(obj) => backend.add_general_objective(obj),
    }
}

/// Post a constraint through the matching typed method.
pub fn post_constraint<B: Backend>(backend: &mut B, constraint: &FlatConstraint) -> Result<()> {
    match constraint {
        FlatConstraint::Linear(c) => backend.add_linear_constraint(c),
        FlatConstraint::Quadratic(c) => backend.add_quadratic_constraint(c),
        FlatConstraint::LinearDefining(c) => backend.add_linear_defining_constraint(c),
        FlatConstraint::Max(c) => backend.add_max_constraint(c),
        FlatConstraint::Min(c) => backend.add_min_constraint(c),
        FlatConstraint::Abs(c) => backend.add_abs_constraint(c),
        FlatConstraint::Conjunction(c) => backend.add_conjunction_constraint(c),
        FlatConstraint::Disjunction(c) => backend.add_disjunction_constraint(c),
        FlatConstraint::IndicatorLinLE(c) => backend.add_indicator_constraint(c),
        FlatConstraint::Exp(c) => backend.add_exp_constraint(c),
        FlatConstraint::ExpA(c) => backend.add_expa_constraint(c),
        FlatConstraint::Log(c) => backend.add_log_constraint(c),
        FlatConstraint::LogA(c) => backend.add_loga_constraint(c),
        FlatConstraint::Pow(c) => backend.add_pow_constraint(c),
        FlatConstraint::Sin(c) => backend.add_sin_constraint(c),
        FlatConstraint::Cos(c) => backend.add_cos_constraint(c),
        FlatConstraint::Tan(c) => backend.add_tan_constraint(c),
        FlatConstraint::General(c) => backend.add_general_constraint(c),
    }
}

/// Native solver backends compiled into this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverBackend {
    #[cfg(feature = "gurobi")]
    /// Gurobi commercial solver
    Gurobi,
    #[cfg(feature = "coin_cbc")]
    /// COIN-OR CBC open-source solver
    CoinCbc,
}

impl SolverBackend {
    pub const ENV_VAR: &'static str = "MPCONV_SOLVER";

    /// Get the solver backend from environment variable or use fallback logic
    pub fn from_env_or_default() -> Result<Self> {
        Self::from_name(env::var(Self::ENV_VAR).ok().as_deref())
    }

    /// Resolve a solver name; `None` picks the preferred compiled-in backend.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        if let Some(solver_name) = name {
            match solver_name.to_lowercase().as_str() {
                "gurobi" => {
                    #[cfg(feature = "gurobi")]
                    return Ok(SolverBackend::Gurobi);
                    #[cfg(not(feature = "gurobi"))]
                    return Err(anyhow!(
                        "Gurobi solver requested via {} but gurobi feature not enabled",
                        Self::ENV_VAR
                    ));
                }
                "coin_cbc" | "coin-cbc" | "cbc" => {
                    #[cfg(feature = "coin_cbc")]
                    return Ok(SolverBackend::CoinCbc);
                    #[cfg(not(feature = "coin_cbc"))]
                    return Err(anyhow!(
                        "Coin CBC solver requested via {} but coin_cbc feature not enabled",
                        Self::ENV_VAR
                    ));
                }
                _ => {
                    return Err(anyhow!(
                        "Invalid solver '{}' in {}. Valid options: gurobi, coin_cbc",
                        solver_name,
                        Self::ENV_VAR
                    ));
                }
            }
        }

        // Fallback logic: prefer gurobi if available, then coin_cbc
        #[cfg(feature = "gurobi")]
        return Ok(SolverBackend::Gurobi);

        #[allow(unreachable_code)]
        #[cfg(feature = "coin_cbc")]
        return Ok(SolverBackend::CoinCbc);

        #[cfg(not(any(feature = "gurobi", feature = "coin_cbc")))]
        Err(anyhow!(
            "No solver backend available. Please enable a solver feature (e.g., 'gurobi' or 'coin_cbc')"
        ))
    }
}

/// Convert and solve `model` with the backend picked by
/// [`SolverBackend::from_env_or_default`], applying `options` (an option
/// string such as `"timelim=10 threads=2"`) first.
#[cfg_attr(
    not(any(feature = "gurobi", feature = "coin_cbc")),
    allow(unused_variables)
)]
pub fn solve_with_default_backend<S: SolutionSink>(
    model: &Model,
    sink: S,
    config: SessionConfig,
    options: &str,
) -> Result<SolveReport> {
    let solver = SolverBackend::from_env_or_default()?;

    match solver {
        #[cfg(feature = "gurobi")]
        SolverBackend::Gurobi => run_session(gurobi::GurobiBackend::new()?, model, sink, config, options),

        #[cfg(feature = "coin_cbc")]
        SolverBackend::CoinCbc => run_session(coin_cbc::CbcBackend::new(), model, sink, config, options),
    }
}

#[allow(dead_code)]
fn run_session<B: Backend, S: SolutionSink>(
    backend: B,
    model: &Model,
    sink: S,
    config: SessionConfig,
    options: &str,
) -> Result<SolveReport> {
    let mut session = Session::with_config(backend, sink, config)?;
    session.parse_options(options)?;
    Ok(session.run(model)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_solver_names_are_rejected() {
        let err = SolverBackend::from_name(Some("glpk")).unwrap_err();
        assert!(err.to_string().contains("Invalid solver 'glpk'"));
    }

    #[cfg(not(feature = "gurobi"))]
    #[test]
    fn disabled_backends_are_reported() {
        let err = SolverBackend::from_name(Some("Gurobi")).unwrap_err();
        assert!(err.to_string().contains("gurobi feature not enabled"));
    }

    #[cfg(not(any(feature = "gurobi", feature = "coin_cbc")))]
    #[test]
    fn no_backend_without_features() {
        assert!(SolverBackend::from_name(None).is_err());
    }

    #[test]
    fn iis_codes_match_the_suffix_convention() {
        assert_eq!(IisStatus::NotMember.code(), 0);
        assert_eq!(IisStatus::Member.code(), 4);
        assert_eq!(IisStatus::PossiblyAtUpper.code(), 7);
    }
}
