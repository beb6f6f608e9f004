//! Native row bookkeeping.
//!
//! A model constraint can become several native rows: ranged rows are split
//! into two sides and reformulations post one row per piece. Backends record
//! the owner of every row here and fold per-row results back onto model
//! constraint indices.

use super::IisStatus;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap {
    current: Option<usize>,
    constraints: usize,
    owners: Vec<usize>,
}

impl RowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows pushed from now on belong to model constraint `index`.
    pub fn start_constraint(&mut self, index: usize) {
        self.current = Some(index);
        self.constraints = self.constraints.max(index + 1);
    }

    /// Record a native row and return its native index. Without a current
    /// constraint every row stands for a constraint of its own.
    pub fn push_row(&mut self) -> usize {
        let owner = match self.current {
            Some(index) => index,
            None => {
                self.constraints += 1;
                self.constraints - 1
            }
        };
        self.owners.push(owner);
        self.owners.len() - 1
    }

    pub fn num_rows(&self) -> usize {
        self.owners.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints
    }

    pub fn owner(&self, row: usize) -> Option<usize> {
        self.owners.get(row).copied()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Sum row duals per model constraint. At most one side of a split
    /// ranged row is active, so the sum is that side's dual. Constraints
    /// without native rows get zero.
    pub fn fold_duals(&self, row_values: &[f64]) -> Vec<f64> {
        let mut folded = vec![0.0; self.constraints];
        for (owner, value) in self.owners.iter().zip(row_values) {
            folded[*owner] += value;
        }
        folded
    }

    /// A model constraint is in the IIS when any of its rows is.
    pub fn fold_iis(&self, row_status: &[IisStatus]) -> Vec<IisStatus> {
        let mut folded = vec![IisStatus::NotMember; self.constraints];
        for (owner, status) in self.owners.iter().zip(row_status) {
            if *status != IisStatus::NotMember {
                folded[*owner] = IisStatus::Member;
            }
        }
        folded
    }
}
