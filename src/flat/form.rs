use std::collections::HashMap;

use crate::model::{Expr, VarId};

/// Canonical linear part: parallel coefficient and variable sequences.
///
/// Each variable appears at most once, in order of first occurrence, and
/// exact-zero coefficients are elided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearForm {
    coefs: Vec<f64>,
    vars: Vec<VarId>,
}

impl LinearForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `(coefficient, variable)` pairs into canonical form.
    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (f64, VarId)>,
    {
        let mut builder = LinearFormBuilder::default();
        for (coef, var) in terms {
            builder.add(coef, var);
        }
        builder.finish()
    }

    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, VarId)> + '_ {
        self.coefs.iter().copied().zip(self.vars.iter().copied())
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.iter()
            .find(|(_, v)| *v == var)
            .map_or(0.0, |(coef, _)| coef)
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.iter()
            .map(|(coef, var)| coef * point.get(var.index()).copied().unwrap_or(f64::NAN))
            .sum()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_terms(self.iter().map(|(coef, var)| (coef * factor, var)))
    }

    /// Form with `extra` appended and re-merged.
    pub fn extended<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = (f64, VarId)>,
    {
        Self::from_terms(self.iter().chain(extra))
    }

    /// Same variable/coefficient map, independent of term order.
    pub fn same_terms(&self, other: &LinearForm) -> bool {
        self.len() == other.len() && self.iter().all(|(coef, var)| other.coefficient(var) == coef)
    }

    /// Rebuild an expression tree equivalent to `form + constant`.
    pub fn to_expr(&self, constant: f64) -> Expr {
        let mut items: Vec<Expr> = self
            .iter()
            .map(|(coef, var)| {
                if coef == 1.0 {
                    Expr::Var(var)
                } else {
                    Expr::Mul(Box::new(Expr::Const(coef)), Box::new(Expr::Var(var)))
                }
            })
            .collect();
        if constant != 0.0 || items.is_empty() {
            items.push(Expr::Const(constant));
        }
        match items.len() {
            1 => items.remove(0),
            _ => Expr::Sum(items),
        }
    }
}

/// Accumulates linear terms, merging repeated variables in place.
#[derive(Debug, Default)]
pub(crate) struct LinearFormBuilder {
    coefs: Vec<f64>,
    vars: Vec<VarId>,
    position: HashMap<VarId, usize>,
}

impl LinearFormBuilder {
    pub(crate) fn add(&mut self, coef: f64, var: VarId) {
        match self.position.get(&var) {
            Some(&slot) => self.coefs[slot] += coef,
            None => {
                self.position.insert(var, self.vars.len());
                self.coefs.push(coef);
                self.vars.push(var);
            }
        }
    }

    pub(crate) fn finish(self) -> LinearForm {
        let (coefs, vars) = self
            .coefs
            .into_iter()
            .zip(self.vars)
            .filter(|(coef, _)| *coef != 0.0)
            .unzip();
        LinearForm { coefs, vars }
    }
}

/// Canonical quadratic part `Σ c · x_i · x_j`.
///
/// Pairs are stored with `var1 <= var2`, each unordered pair at most once,
/// zero coefficients elided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadTerms {
    vars1: Vec<VarId>,
    vars2: Vec<VarId>,
    coefs: Vec<f64>,
}

impl QuadTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (f64, VarId, VarId)>,
    {
        let mut quad = Self::new();
        for (coef, v1, v2) in terms {
            quad.add_term(coef, v1, v2);
        }
        quad.canonicalize();
        quad
    }

    /// Add `coef · v1 · v2`, merging with an existing pair.
    ///
    /// Zero coefficients are kept until [`QuadTerms::canonicalize`] runs so
    /// that cancelling terms can still merge.
    pub fn add_term(&mut self, coef: f64, v1: VarId, v2: VarId) {
        let (v1, v2) = if v1 <= v2 { (v1, v2) } else { (v2, v1) };
        match self
            .vars1
            .iter()
            .zip(&self.vars2)
            .position(|(a, b)| *a == v1 && *b == v2)
        {
            Some(slot) => self.coefs[slot] += coef,
            None => {
                self.vars1.push(v1);
                self.vars2.push(v2);
                self.coefs.push(coef);
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &QuadTerms) {
        for (coef, v1, v2) in other.iter() {
            self.add_term(coef, v1, v2);
        }
    }

    pub fn canonicalize(&mut self) {
        let mut slot = 0;
        while slot < self.coefs.len() {
            if self.coefs[slot] == 0.0 {
                self.coefs.remove(slot);
                self.vars1.remove(slot);
                self.vars2.remove(slot);
            } else {
                slot += 1;
            }
        }
    }

    pub fn vars1(&self) -> &[VarId] {
        &self.vars1
    }

    pub fn vars2(&self) -> &[VarId] {
        &self.vars2
    }

    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    pub fn len(&self) -> usize {
        self.coefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, VarId, VarId)> + '_ {
        self.coefs
            .iter()
            .zip(self.vars1.iter().zip(&self.vars2))
            .map(|(coef, (v1, v2))| (*coef, *v1, *v2))
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        let value = |var: VarId| point.get(var.index()).copied().unwrap_or(f64::NAN);
        self.iter()
            .map(|(coef, v1, v2)| coef * value(v1) * value(v2))
            .sum()
    }

    pub(crate) fn scale(&mut self, factor: f64) {
        for coef in &mut self.coefs {
            *coef *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_merge_in_first_seen_order() {
        let (x, y, z) = (VarId::new(0), VarId::new(1), VarId::new(2));
        let form = LinearForm::from_terms([(1.0, y), (2.0, x), (3.0, y), (1.0, z), (-1.0, z)]);

        assert_eq!(form.vars(), &[y, x]);
        assert_eq!(form.coefs(), &[4.0, 2.0]);
    }

    #[test]
    fn same_terms_ignores_order() {
        let (x, y) = (VarId::new(0), VarId::new(1));
        let a = LinearForm::from_terms([(1.0, x), (2.0, y)]);
        let b = LinearForm::from_terms([(2.0, y), (1.0, x)]);
        assert!(a.same_terms(&b));
        assert!(!a.same_terms(&LinearForm::from_terms([(1.0, x)])));
    }

    #[test]
    fn quadratic_pairs_are_ordered_and_merged() {
        let (x, y) = (VarId::new(0), VarId::new(1));
        let quad = QuadTerms::from_terms([(1.0, y, x), (2.0, x, y), (1.0, x, x), (-1.0, x, x)]);

        assert_eq!(quad.len(), 1);
        assert_eq!(quad.vars1(), &[x]);
        assert_eq!(quad.vars2(), &[y]);
        assert_eq!(quad.coefs(), &[3.0]);
        assert_eq!(quad.evaluate(&[2.0, 5.0]), 30.0);
    }

    #[test]
    fn to_expr_reproduces_the_value() {
        let (x, y) = (VarId::new(0), VarId::new(1));
        let form = LinearForm::from_terms([(3.0, x), (1.0, y)]);
        assert_eq!(form.to_expr(2.0).evaluate(&[1.0, 4.0]), 9.0);
        assert_eq!(LinearForm::new().to_expr(0.0), Expr::Const(0.0));
    }
}
