//! Receiver of the final report.

use std::fmt;

/// What a suffix is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuffixTarget {
    Variables,
    Constraints,
    Objectives,
    Problem,
}

impl fmt::Display for SuffixTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuffixTarget::Variables => "var",
            SuffixTarget::Constraints => "con",
            SuffixTarget::Objectives => "obj",
            SuffixTarget::Problem => "problem",
        })
    }
}

/// Named per-element result value reported alongside a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Suffix {
    pub name: &'static str,
    pub target: SuffixTarget,
}

impl Suffix {
    pub const IIS_VARIABLES: Suffix = Suffix::new("iis", SuffixTarget::Variables);
    pub const IIS_CONSTRAINTS: Suffix = Suffix::new("iis", SuffixTarget::Constraints);
    pub const MIP_GAP_OBJECTIVE: Suffix = Suffix::new("relmipgap", SuffixTarget::Objectives);
    pub const MIP_GAP_PROBLEM: Suffix = Suffix::new("relmipgap", SuffixTarget::Problem);

    pub const fn new(name: &'static str, target: SuffixTarget) -> Self {
        Self { name, target }
    }
}

/// Sink for the outcome of a solve: status, vectors, suffixes and any
/// printed text.
pub trait SolutionSink {
    fn handle_solution(
        &mut self,
        solve_code: i32,
        message: &str,
        primal: Option<&[f64]>,
        dual: Option<&[f64]>,
        objective_value: Option<f64>,
    );

    fn report_int_suffix(&mut self, _suffix: Suffix, _values: &[i64]) {}

    fn report_dbl_suffix(&mut self, _suffix: Suffix, _values: &[f64]) {}

    fn print(&mut self, text: &str) {
        print!("{text}");
    }
}

impl<S: SolutionSink + ?Sized> SolutionSink for &mut S {
    fn handle_solution(
        &mut self,
        solve_code: i32,
        message: &str,
        primal: Option<&[f64]>,
        dual: Option<&[f64]>,
        objective_value: Option<f64>,
    ) {
        (**self).handle_solution(solve_code, message, primal, dual, objective_value);
    }

    fn report_int_suffix(&mut self, suffix: Suffix, values: &[i64]) {
        (**self).report_int_suffix(suffix, values);
    }

    fn report_dbl_suffix(&mut self, suffix: Suffix, values: &[f64]) {
        (**self).report_dbl_suffix(suffix, values);
    }

    fn print(&mut self, text: &str) {
        (**self).print(text);
    }
}

/// Sink that keeps everything it is given, including printed text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedSolution {
    pub solve_code: Option<i32>,
    pub message: String,
    pub primal: Option<Vec<f64>>,
    pub dual: Option<Vec<f64>>,
    pub objective_value: Option<f64>,
    pub int_suffixes: Vec<(Suffix, Vec<i64>)>,
    pub dbl_suffixes: Vec<(Suffix, Vec<f64>)>,
    pub output: String,
}

impl CollectedSolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_suffix(&self, suffix: Suffix) -> Option<&[i64]> {
        self.int_suffixes
            .iter()
            .find(|(s, _)| *s == suffix)
            .map(|(_, values)| values.as_slice())
    }

    pub fn dbl_suffix(&self, suffix: Suffix) -> Option<&[f64]> {
        self.dbl_suffixes
            .iter()
            .find(|(s, _)| *s == suffix)
            .map(|(_, values)| values.as_slice())
    }
}

impl SolutionSink for CollectedSolution {
    fn handle_solution(
        &mut self,
        solve_code: i32,
        message: &str,
        primal: Option<&[f64]>,
        dual: Option<&[f64]>,
        objective_value: Option<f64>,
    ) {
        self.solve_code = Some(solve_code);
        self.message = message.to_string();
        self.primal = primal.map(<[f64]>::to_vec);
        self.dual = dual.map(<[f64]>::to_vec);
        self.objective_value = objective_value;
    }

    fn report_int_suffix(&mut self, suffix: Suffix, values: &[i64]) {
        self.int_suffixes.push((suffix, values.to_vec()));
    }

    fn report_dbl_suffix(&mut self, suffix: Suffix, values: &[f64]) {
        self.dbl_suffixes.push((suffix, values.to_vec()));
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}
