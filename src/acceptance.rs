//! Acceptance registry and rewrites
//!
//! Each backend declares, per [`Kind`], whether it takes an element as-is
//! ([`Acceptance::Recommended`]), takes it but prefers an equivalent
//! reformulation ([`Acceptance::AcceptedButNotRecommended`]), or cannot take
//! it at all ([`Acceptance::NotAccepted`]). Resolution applies the fixed
//! rewrites below until every piece lands on a kind the backend accepts.
//!
//! | kind           | rewritten into | applicable when                       |
//! |----------------|----------------|---------------------------------------|
//! | LinearDefining | Linear         | always                                |
//! | IndicatorLinLE | Linear (big-M) | trigger binary, big-M finite          |
//! | Conjunction    | Linear         | result and arguments binary           |
//! | Disjunction    | Linear         | result and arguments binary           |
//!
//! Objectives have no rewrites.

use std::fmt;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

use crate::flat::{
    FlatConstraint, FlatObjective, FuncConstraint, IndicatorConstraintLinLE, Kind,
    LinearConstraint, LinearForm,
};
use crate::model::{VarId, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acceptance {
    NotAccepted,
    AcceptedButNotRecommended,
    Recommended,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Acceptance::NotAccepted)
    }
}

impl fmt::Display for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Acceptance::NotAccepted => "not accepted",
            Acceptance::AcceptedButNotRecommended => "accepted but not recommended",
            Acceptance::Recommended => "recommended",
        })
    }
}

/// Static per-backend acceptance table. Kinds not listed are NotAccepted.
#[derive(Debug, Clone, Copy)]
pub struct AcceptanceTable {
    objectives: &'static [(Kind, Acceptance)],
    constraints: &'static [(Kind, Acceptance)],
}

impl AcceptanceTable {
    pub const fn new(
        objectives: &'static [(Kind, Acceptance)],
        constraints: &'static [(Kind, Acceptance)],
    ) -> Self {
        Self {
            objectives,
            constraints,
        }
    }

    pub fn objective(&self, kind: Kind) -> Acceptance {
        lookup(self.objectives, kind)
    }

    pub fn constraint(&self, kind: Kind) -> Acceptance {
        lookup(self.constraints, kind)
    }
}

fn lookup(entries: &[(Kind, Acceptance)], kind: Kind) -> Acceptance {
    entries
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(Acceptance::NotAccepted, |(_, acceptance)| *acceptance)
}

/// Linear objectives and constraints only; everything else goes through a
/// rewrite or is rejected.
pub const LINEAR_ONLY: AcceptanceTable = AcceptanceTable::new(
    &[(Kind::Linear, Acceptance::Recommended)],
    &[(Kind::Linear, Acceptance::Recommended)],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} is not accepted and cannot be reformulated into an accepted kind")]
pub struct Unsupported {
    pub kind: Kind,
}

/// Model facts a rewrite may need, such as bounds for big-M.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    variables: &'a [Variable],
}

impl<'a> RewriteContext<'a> {
    pub fn new(variables: &'a [Variable]) -> Self {
        Self { variables }
    }

    fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(var.index())
    }

    fn is_binary(&self, var: VarId) -> bool {
        self.variable(var).is_some_and(Variable::is_binary)
    }
}

/// Target kind of the rewrite registered for `kind`, if any.
pub fn rewrite_target(kind: Kind) -> Option<Kind> {
    match kind {
        Kind::LinearDefining | Kind::IndicatorLinLE | Kind::Conjunction | Kind::Disjunction => {
            Some(Kind::Linear)
        }
        _ => None,
    }
}

/// Graph with an edge from every rewritable kind to its target.
pub fn rewrite_graph() -> DiGraphMap<Kind, ()> {
    let mut graph = DiGraphMap::new();
    for kind in Kind::ALL {
        graph.add_node(kind);
        if let Some(target) = rewrite_target(kind) {
            graph.add_edge(kind, target, ());
        }
    }
    graph
}

/// Kinds in an order where every rewrite source precedes its target.
///
/// Fails with the offending kind if the rewrite relation has a cycle.
pub fn rewrite_order() -> Result<Vec<Kind>, Kind> {
    toposort(&rewrite_graph(), None).map_err(|cycle| cycle.node_id())
}

/// Apply the rewrite for this element. `None` when the kind has no rewrite or
/// the rewrite does not apply to this instance.
pub fn rewrite(constraint: &FlatConstraint, context: &RewriteContext) -> Option<Vec<FlatConstraint>> {
    let pieces = match constraint {
        FlatConstraint::LinearDefining(c) => vec![c.to_linear_constraint()],
        FlatConstraint::IndicatorLinLE(c) => indicator_big_m(c, context)?,
        FlatConstraint::Conjunction(c) => conjunction(c, context)?,
        FlatConstraint::Disjunction(c) => disjunction(c, context)?,
        _ => return None,
    };
    Some(pieces.into_iter().map(FlatConstraint::Linear).collect())
}

/// Resolve one constraint against `table`, rewriting as needed.
pub fn resolve_constraint(
    constraint: FlatConstraint,
    table: &AcceptanceTable,
    context: &RewriteContext,
) -> Result<Vec<FlatConstraint>, Unsupported> {
    let kind = constraint.kind();
    match table.constraint(kind) {
        Acceptance::Recommended => Ok(vec![constraint]),
        Acceptance::AcceptedButNotRecommended => match rewrite(&constraint, context) {
            Some(pieces)
                if pieces
                    .iter()
                    .all(|piece| all_recommended(piece, table, context)) =>
            {
                resolve_all(pieces, table, context)
            }
            _ => Ok(vec![constraint]),
        },
        Acceptance::NotAccepted => match rewrite(&constraint, context) {
            Some(pieces) => resolve_all(pieces, table, context).map_err(|_| Unsupported { kind }),
            None => Err(Unsupported { kind }),
        },
    }
}

pub fn resolve_objective(
    objective: FlatObjective,
    table: &AcceptanceTable,
) -> Result<FlatObjective, Unsupported> {
    let kind = objective.kind();
    if table.objective(kind).is_accepted() {
        Ok(objective)
    } else {
        Err(Unsupported { kind })
    }
}

fn resolve_all(
    pieces: Vec<FlatConstraint>,
    table: &AcceptanceTable,
    context: &RewriteContext,
) -> Result<Vec<FlatConstraint>, Unsupported> {
    let mut resolved = Vec::with_capacity(pieces.len());
    for piece in pieces {
        resolved.extend(resolve_constraint(piece, table, context)?);
    }
    Ok(resolved)
}

/// Whether `piece` ends up entirely on Recommended kinds.
fn all_recommended(piece: &FlatConstraint, table: &AcceptanceTable, context: &RewriteContext) -> bool {
    match table.constraint(piece.kind()) {
        Acceptance::Recommended => true,
        _ => rewrite(piece, context).is_some_and(|pieces| {
            pieces
                .iter()
                .all(|piece| all_recommended(piece, table, context))
        }),
    }
}

/// `b == 1 ⇒ a·x <= rhs` becomes `a·x + M·b <= rhs + M`,
/// `b == 0 ⇒ a·x <= rhs` becomes `a·x - M·b <= rhs`,
/// with `M` the largest violation `a·x - rhs` can reach within the bounds.
fn indicator_big_m(
    indicator: &IndicatorConstraintLinLE,
    context: &RewriteContext,
) -> Option<Vec<LinearConstraint>> {
    if !context.is_binary(indicator.trigger) {
        return None;
    }
    let mut big_m = -indicator.rhs;
    for (coef, var) in indicator.form.iter() {
        let bounds = context.variable(var)?;
        big_m += (coef * bounds.lower_bound).max(coef * bounds.upper_bound);
    }
    if !big_m.is_finite() {
        return None;
    }
    if big_m <= 0.0 {
        // The implication holds everywhere in the box.
        return Some(Vec::new());
    }

    let (trigger_coef, rhs) = match indicator.trigger_value {
        0 => (-big_m, indicator.rhs),
        _ => (big_m, indicator.rhs + big_m),
    };
    let form = indicator.form.extended([(trigger_coef, indicator.trigger)]);
    Some(vec![LinearConstraint::less_equal(form, rhs)])
}

/// `r = x1 ∧ … ∧ xn`:  `r <= xi` for each i, `r >= Σx - (n - 1)`.
fn conjunction(c: &FuncConstraint, context: &RewriteContext) -> Option<Vec<LinearConstraint>> {
    if !all_binary(c, context) {
        return None;
    }
    let n = c.args.len() as f64;
    let mut pieces: Vec<LinearConstraint> = c
        .args
        .iter()
        .map(|arg| LinearConstraint::less_equal(LinearForm::from_terms([(1.0, c.result), (-1.0, *arg)]), 0.0))
        .collect();
    let lower = LinearForm::from_terms(
        std::iter::once((1.0, c.result)).chain(c.args.iter().map(|arg| (-1.0, *arg))),
    );
    pieces.push(LinearConstraint::greater_equal(lower, 1.0 - n));
    Some(pieces)
}

/// `r = x1 ∨ … ∨ xn`:  `r >= xi` for each i, `r <= Σx`.
fn disjunction(c: &FuncConstraint, context: &RewriteContext) -> Option<Vec<LinearConstraint>> {
    if !all_binary(c, context) {
        return None;
    }
    let mut pieces: Vec<LinearConstraint> = c
        .args
        .iter()
        .map(|arg| {
            LinearConstraint::greater_equal(LinearForm::from_terms([(1.0, c.result), (-1.0, *arg)]), 0.0)
        })
        .collect();
    let upper = LinearForm::from_terms(
        std::iter::once((1.0, c.result)).chain(c.args.iter().map(|arg| (-1.0, *arg))),
    );
    pieces.push(LinearConstraint::less_equal(upper, 0.0));
    Some(pieces)
}

fn all_binary(c: &FuncConstraint, context: &RewriteContext) -> bool {
    !c.args.is_empty()
        && context.is_binary(c.result)
        && c.args.iter().all(|arg| context.is_binary(*arg))
}
