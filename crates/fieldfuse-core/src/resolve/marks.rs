//! Per-page pool of selection marks already assigned to a field.

use std::collections::HashSet;

/// Indices of selection marks claimed on the current page.
///
/// Created fresh for every page and passed by reference through resolution.
#[derive(Debug, Default)]
pub struct ClaimedMarks {
    claimed: HashSet<usize>,
}

impl ClaimedMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a mark. Returns `false` if it was already taken.
    pub fn claim(&mut self, index: usize) -> bool {
        self.claimed.insert(index)
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.claimed.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
