//! Page order model
//!
//! Holds the surviving page identities in display order plus the set of
//! deleted identities. This is the only place where 1-based display
//! positions are translated to page identities; every position-based
//! operation elsewhere goes through it.

use crate::error::PageEditError;
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModel {
    order: Vec<PageId>,
    deleted: BTreeSet<PageId>,
}

impl OrderModel {
    /// Identity order `[0..page_count)`, nothing deleted
    pub fn new(page_count: usize) -> Self {
        Self {
            order: (0..page_count).map(PageId).collect(),
            deleted: BTreeSet::new(),
        }
    }

    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    pub fn deleted(&self) -> &BTreeSet<PageId> {
        &self.deleted
    }

    /// Number of surviving pages
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Surviving plus deleted; constant for the life of a session
    pub fn total(&self) -> usize {
        self.order.len() + self.deleted.len()
    }

    /// Identity shown at a 1-based position
    pub fn identity_at(&self, position: usize) -> Result<PageId, PageEditError> {
        self.check_position(position)?;
        Ok(self.order[position - 1])
    }

    /// 1-based position of a surviving identity
    pub fn position_of(&self, id: PageId) -> Option<usize> {
        self.order.iter().position(|p| *p == id).map(|i| i + 1)
    }

    /// Identities at the given 1-based positions, in position order
    pub fn identities_at(&self, positions: &BTreeSet<usize>) -> Result<Vec<PageId>, PageEditError> {
        positions.iter().map(|&p| self.identity_at(p)).collect()
    }

    pub fn delete_at_position(&mut self, position: usize) -> Result<PageId, PageEditError> {
        self.check_position(position)?;
        let id = self.order.remove(position - 1);
        self.deleted.insert(id);
        self.debug_check();
        Ok(id)
    }

    /// Delete several positions of the current order as one batch.
    ///
    /// All positions are validated before anything changes. Identities are
    /// resolved up front, so removing one page never shifts the meaning of
    /// another position in the same batch.
    pub fn bulk_delete(&mut self, positions: &BTreeSet<usize>) -> Result<Vec<PageId>, PageEditError> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let doomed = self.identities_at(positions)?;
        let doomed_set: BTreeSet<PageId> = doomed.iter().copied().collect();

        self.order.retain(|id| !doomed_set.contains(id));
        self.deleted.extend(doomed_set);
        self.debug_check();

        Ok(doomed)
    }

    /// Move the page at `source` so that it ends up at `target` (both
    /// 1-based, both within the current order). Returns false when nothing
    /// moved.
    pub fn reorder(&mut self, source: usize, target: usize) -> Result<bool, PageEditError> {
        self.check_position(source)?;
        self.check_position(target)?;
        if source == target {
            return Ok(false);
        }

        let from = source - 1;
        // Insertion slot in the list before removal: after the target page
        // when moving down, before it when moving up.
        let mut slot = if target > source { target } else { target - 1 };
        let id = self.order.remove(from);
        // Removal shifted everything after `from` one slot left
        if slot > from {
            slot -= 1;
        }
        self.order.insert(slot, id);
        self.debug_check();

        Ok(true)
    }

    /// Restore an order snapshot and forget all deletions
    pub fn reset(&mut self, original_order: &[PageId]) {
        self.order = original_order.to_vec();
        self.deleted.clear();
        self.debug_check();
    }

    /// Check the model invariants: no duplicates in the order, and no
    /// identity both surviving and deleted.
    pub fn is_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.order
            .iter()
            .all(|id| seen.insert(*id) && !self.deleted.contains(id))
    }

    fn check_position(&self, position: usize) -> Result<(), PageEditError> {
        if position == 0 || position > self.order.len() {
            return Err(PageEditError::Index {
                position,
                len: self.order.len(),
            });
        }
        Ok(())
    }

    fn debug_check(&self) {
        debug_assert!(self.is_consistent(), "order model corrupted: {self:?}");
    }
}
