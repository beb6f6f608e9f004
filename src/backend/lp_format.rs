//! CPLEX LP text writer for backends without a native export.

use std::fmt::Write;

use itertools::Itertools;

use crate::flat::{LinearConstraint, LinearForm, LinearObjective};
use crate::model::{OptimizationSense, VarId, Variable, VariableType};

fn format_form(form: &LinearForm) -> String {
    format_expression(form, 0.0)
}

/// `form + constant`, with a bare `0` when both are empty.
fn format_expression(form: &LinearForm, constant: f64) -> String {
    let mut terms: Vec<String> = form
        .iter()
        .enumerate()
        .map(|(position, (coef, var))| {
            let sign = if coef < 0.0 { "-" } else if position == 0 { "" } else { "+" };
            format!("{sign} {} {var}", coef.abs())
        })
        .collect();
    if constant != 0.0 {
        let sign = if constant < 0.0 { "-" } else if terms.is_empty() { "" } else { "+" };
        terms.push(format!("{sign} {}", constant.abs()));
    }
    if terms.is_empty() {
        return "0".to_string();
    }
    terms.join(" ").trim_start().to_string()
}

fn format_bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// Render a linear model. Ranged rows are written as a `>=` row and a
/// `<=` row named with `_lo` / `_hi` suffixes. The objective keeps its
/// constant term.
pub fn write_lp(
    variables: &[Variable],
    objective: Option<&LinearObjective>,
    rows: &[LinearConstraint],
) -> String {
    let mut out = String::from("\\ Problem written by mpconv\n");

    match objective {
        Some(obj) => {
            let sense = match obj.sense {
                OptimizationSense::Minimize => "Minimize",
                OptimizationSense::Maximize => "Maximize",
            };
            let _ = writeln!(out, "{sense}\n obj: {}", format_expression(&obj.form, obj.constant));
        }
        None => out.push_str("Minimize\n obj: 0\n"),
    }

    out.push_str("Subject To\n");
    for (index, row) in rows.iter().enumerate() {
        let body = format_form(&row.form);
        if row.is_equality() {
            let _ = writeln!(out, " c{index}: {body} = {}", row.lower);
        } else {
            match (row.lower.is_finite(), row.upper.is_finite()) {
                (true, true) => {
                    let _ = writeln!(out, " c{index}_lo: {body} >= {}", row.lower);
                    let _ = writeln!(out, " c{index}_hi: {body} <= {}", row.upper);
                }
                (true, false) => {
                    let _ = writeln!(out, " c{index}: {body} >= {}", row.lower);
                }
                (false, true) => {
                    let _ = writeln!(out, " c{index}: {body} <= {}", row.upper);
                }
                (false, false) => {}
            }
        }
    }

    out.push_str("Bounds\n");
    for (index, var) in variables.iter().enumerate() {
        let id = VarId::new(index);
        if var.lower_bound == f64::NEG_INFINITY && var.upper_bound == f64::INFINITY {
            let _ = writeln!(out, " {id} free");
        } else {
            let _ = writeln!(
                out,
                " {} <= {id} <= {}",
                format_bound(var.lower_bound),
                format_bound(var.upper_bound)
            );
        }
    }

    let integers = variables
        .iter()
        .enumerate()
        .filter(|(_, var)| var.var_type == VariableType::Integer)
        .map(|(index, _)| VarId::new(index))
        .join(" ");
    if !integers.is_empty() {
        let _ = writeln!(out, "General\n {integers}");
    }

    out.push_str("End\n");
    out
}
