//! Conversion and dispatch layer between optimization models and solver backends
//!
//! `mpconv` takes a solver-independent [`Model`](model::Model) made of
//! variables, objectives and constraints, and hands it to a native solver in
//! the form that solver understands best.
//!
//! # Overview
//!
//! Every objective and constraint goes through the same pipeline:
//!
//! 1. **Unzipping** ([`unzip`]): split an expression into a canonical linear
//!    form, a constant offset and nonlinear residual terms.
//! 2. **Classification** ([`classify`]): label the element with a
//!    [`Kind`](flat::Kind) and build its typed payload ([`flat`]).
//! 3. **Acceptance** ([`acceptance`]): look the kind up in the backend's
//!    acceptance table and reformulate it (big-M indicators, linearized
//!    boolean connectives, ...) when the backend does not take it natively.
//! 4. **Dispatch** ([`backend`]): post the result through the typed
//!    [`Backend`](backend::Backend) method for that kind.
//!
//! A [`Session`](session::Session) drives this pipeline and the backend's
//! lifecycle (open, modify, solve, report, close), translates native result
//! codes into portable [`SolveStatus`](status::SolveStatus) values and passes
//! the outcome to a [`SolutionSink`](backend::SolutionSink).
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use mpconv::backend::{CollectedSolution, solve_with_default_backend};
//! use mpconv::constraint;
//! use mpconv::model::{Model, Objective, OptimizationSense, VariableType};
//! use mpconv::session::SessionConfig;
//!
//! let mut model = Model::new();
//! let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
//! let y = model.add_variable(VariableType::Integer, 0.0, 5.0);
//! model.add_objective(Objective::new(OptimizationSense::Maximize, x + 2.0 * y));
//! model.add_constraint(constraint!((x + y) <= 8.0));
//!
//! let mut sink = CollectedSolution::new();
//! let report = solve_with_default_backend(&model, &mut sink, SessionConfig::default(), "timelim=10")?;
//! print!("{}", report.message);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **[`model`]**: the input model and its expression trees
//! - **[`unzip`]**, **[`classify`]**, **[`flat`]**: element classification
//! - **[`acceptance`]**: acceptance tables and reformulations
//! - **[`backend`]**: the backend trait, solution sinks and native backends
//!   (behind the `gurobi` and `coin_cbc` features)
//! - **[`session`]**: the lifecycle driver
//! - **[`status`]**: solve codes, status translation and interruption
//! - **[`options`]**: typed, named solver options

pub mod acceptance;
pub mod backend;
pub mod classify;
pub mod error;
pub mod flat;
pub mod model;
pub mod options;
pub mod session;
pub mod status;
pub mod unzip;

pub use error::{ConvertError, Element, OptionError};
pub use session::{Session, SessionConfig, SolveReport};
pub use status::{Interrupter, SolveStatus};
