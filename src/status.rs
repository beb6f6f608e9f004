//! Solve-status taxonomy and native code translation
//!
//! Portable statuses carry AMPL-style solve codes grouped in bands of 100:
//!
//! | band    | meaning                         |
//! |---------|---------------------------------|
//! | 0-99    | solved, optimal                 |
//! | 100-199 | solved, optimality uncertain    |
//! | 200-299 | infeasible                      |
//! | 300-399 | unbounded                       |
//! | 400-499 | limit reached                   |
//! | 500-599 | failure                         |
//! | 600-699 | interrupted                     |

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;

pub mod solve_code {
    pub const SOLVED: i32 = 0;
    pub const UNCERTAIN: i32 = 100;
    pub const INFEASIBLE: i32 = 200;
    pub const UNBOUNDED: i32 = 300;
    pub const LIMIT: i32 = 400;
    pub const FAILURE: i32 = 500;
    pub const INTERRUPTED: i32 = 600;
}

/// Portable solve status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    Optimal,
    FeasibleUncertain,
    Infeasible,
    Unbounded,
    InfeasibleOrUnbounded,
    Interrupted,
    Error,
    Unknown,
}

impl SolveStatus {
    pub fn solve_code(&self) -> i32 {
        match self {
            SolveStatus::Optimal => solve_code::SOLVED,
            SolveStatus::FeasibleUncertain => solve_code::UNCERTAIN,
            SolveStatus::Infeasible => solve_code::INFEASIBLE,
            SolveStatus::InfeasibleOrUnbounded => solve_code::INFEASIBLE + 1,
            SolveStatus::Unbounded => solve_code::UNBOUNDED,
            SolveStatus::Error => solve_code::FAILURE,
            SolveStatus::Unknown => solve_code::FAILURE + 1,
            SolveStatus::Interrupted => solve_code::INTERRUPTED,
        }
    }

    /// Decode a solve code by band. Limit codes decode to
    /// `FeasibleUncertain`; anything outside 0..700 is `Unknown`.
    pub fn from_solve_code(code: i32) -> Self {
        match code {
            0..=99 => SolveStatus::Optimal,
            100..=199 | 400..=499 => SolveStatus::FeasibleUncertain,
            201 => SolveStatus::InfeasibleOrUnbounded,
            200..=299 => SolveStatus::Infeasible,
            300..=399 => SolveStatus::Unbounded,
            500 => SolveStatus::Error,
            600..=699 => SolveStatus::Interrupted,
            _ => SolveStatus::Unknown,
        }
    }

    /// Whether a primal solution is worth reporting.
    pub fn has_solution(&self) -> bool {
        self.solve_code() < solve_code::INFEASIBLE
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::FeasibleUncertain => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::InfeasibleOrUnbounded => "infeasible or unbounded",
            SolveStatus::Interrupted => "interrupted",
            SolveStatus::Error => "error",
            SolveStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a backend's native status table.
#[derive(Debug, Clone, Copy)]
pub struct StatusEntry {
    pub native: i32,
    pub status: SolveStatus,
    pub message: &'static str,
}

impl StatusEntry {
    pub const fn new(native: i32, status: SolveStatus, message: &'static str) -> Self {
        Self {
            native,
            status,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    entries: &'static [StatusEntry],
}

/// Translated outcome of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub status: SolveStatus,
    pub solve_code: i32,
    pub message: String,
}

impl Translation {
    pub fn new(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            solve_code: status.solve_code(),
            message: message.into(),
        }
    }
}

impl StatusTable {
    pub const fn new(entries: &'static [StatusEntry]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [StatusEntry] {
        self.entries
    }

    /// Translate a native result code.
    ///
    /// An observed interruption wins over whatever the native code says. An
    /// entry promising a feasible solution is downgraded to `Unknown` when the
    /// backend has none. Unmapped codes are `Unknown` and echo the native code.
    pub fn translate(&self, native: i32, interrupted: bool, has_feasible: bool) -> Translation {
        if interrupted {
            return Translation::new(SolveStatus::Interrupted, "interrupted");
        }
        match self.entries.iter().find(|entry| entry.native == native) {
            Some(entry) if entry.status == SolveStatus::FeasibleUncertain && !has_feasible => {
                Translation::new(
                    SolveStatus::Unknown,
                    format!("{}, no feasible solution", entry.message),
                )
            }
            Some(entry) => Translation::new(entry.status, entry.message),
            None => Translation::new(
                SolveStatus::Unknown,
                format!("unknown solution status (native code {native})"),
            ),
        }
    }
}

lazy_static! {
    static ref GLOBAL_STOP: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Cooperative stop flag shared with a native solver's callback.
///
/// The session never polls it. It clears the flag right before each solve
/// and reads it once afterwards to decide whether the run was interrupted.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide flag, e.g. for a signal handler.
    pub fn global() -> Self {
        Self {
            flag: Arc::clone(&GLOBAL_STOP),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Shared handle for native callbacks.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}
