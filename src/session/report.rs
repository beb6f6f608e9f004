use std::fmt::Write;
use std::time::Duration;

use crate::status::SolveStatus;

/// Outcome of [`Session::report`](super::Session::report).
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub solve_code: i32,
    /// Full report text as handed to the sink.
    pub message: String,
    pub objective_value: Option<f64>,
    pub primal: Option<Vec<f64>>,
    pub dual: Option<Vec<f64>>,
}

/// Phase durations of one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveTimes {
    pub setup: Duration,
    pub solution: Duration,
    pub output: Duration,
}

pub(crate) fn summary_line(long_name: &str, message: &str) -> String {
    format!("{long_name}: {message}\n")
}

pub(crate) fn statistics_line(iterations: u64, nodes: Option<u64>, objective: Option<f64>) -> String {
    let mut line = format!("{iterations} iterations");
    if let Some(nodes) = nodes {
        let _ = write!(line, ", {nodes} nodes");
    }
    if let Some(objective) = objective {
        let _ = write!(line, ", objective {objective}");
    }
    line.push('\n');
    line
}

pub(crate) fn timing_block(times: &SolveTimes) -> String {
    format!(
        "Setup time = {:.6}s\nSolution time = {:.6}s\nOutput time = {:.6}s\n",
        times.setup.as_secs_f64(),
        times.solution.as_secs_f64(),
        times.output.as_secs_f64()
    )
}
