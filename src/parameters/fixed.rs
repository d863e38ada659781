//! Fixed parameter columns.

use crate::error::{FitError, Result};
use std::collections::BTreeSet;

/// Parameter indices excluded from optimization for one fit.
///
/// Values at these indices pass through the solver untouched and no Jacobian
/// column is computed for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedColumns {
    indices: BTreeSet<usize>,
}

impl FixedColumns {
    /// An empty set: every parameter is optimized.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds the set from one boolean flag per parameter column.
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            indices: flags
                .iter()
                .enumerate()
                .filter_map(|(i, &fixed)| fixed.then_some(i))
                .collect(),
        }
    }

    /// Builds the set from explicit indices.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }

    /// Returns true if `index` is held fixed.
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Number of fixed columns.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if no column is fixed.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates over the fixed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Returns true if no parameter out of `count` is left to optimize.
    pub fn covers_all(&self, count: usize) -> bool {
        (0..count).all(|i| self.contains(i))
    }

    /// Indices of the parameters that are optimized, in ascending order.
    pub fn free_indices(&self, count: usize) -> Vec<usize> {
        (0..count).filter(|i| !self.contains(*i)).collect()
    }

    /// Checks that every fixed index is valid for `count` parameters.
    pub fn validate(&self, count: usize) -> Result<()> {
        match self.indices.iter().next_back() {
            Some(&index) if index >= count => {
                Err(FitError::FixedColumnOutOfRange { index, count })
            }
            _ => Ok(()),
        }
    }
}
