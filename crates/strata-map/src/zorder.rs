//! Per-layer relative Z order.
//!
//! # Design
//!
//! Entities on one layer stack front-to-back by a per-entity integer Z.
//! The cache only ever hands out fresh extremes: adding assigns `max + 1`,
//! `bring_to_front` reassigns `max + 1`, `bring_to_back` reassigns
//! `min - 1`. Nothing is ever renumbered, so every reorder is O(1) and a Z
//! comparison between two entities on the same layer is stable for as long
//! as neither is reordered.
//!
//! Values are compared, never interpreted: Z is meaningless as an absolute
//! position.

use std::collections::HashMap;

use crate::entity::EntityId;

/// Entity → Z mapping for one layer.
///
/// Z values are `i64` and grow without bound: removed entities abandon
/// their slot and no renumbering pass exists. At one reorder per
/// microsecond the i64 range lasts about 292,000 years, comfortably beyond
/// any map's lifetime, so overflow is not handled.
///
/// Invariant: all tracked values are distinct (every assignment takes a
/// fresh extreme), so Z comparisons are a total order within the layer.
pub struct ZOrderCache {
    z: HashMap<EntityId, i64>,
    min: i64,
    max: i64,
}

impl ZOrderCache {
    pub fn new() -> Self {
        Self {
            z: HashMap::new(),
            min: 0,
            max: 0,
        }
    }

    /// Track a new entity on top of everything else. Returns its Z.
    pub fn add(&mut self, id: EntityId) -> i64 {
        let z = if self.z.is_empty() { 0 } else { self.max + 1 };
        let previous = self.z.insert(id, z);
        debug_assert!(previous.is_none(), "entity already tracked on this layer");
        if self.z.len() == 1 {
            self.min = z;
        }
        self.max = z;
        z
    }

    /// Reassign the entity strictly above every other tracked value.
    /// No-op when it already holds the maximum (which is unique). Returns
    /// the resulting Z, or `None` if the entity is not tracked here.
    pub fn bring_to_front(&mut self, id: EntityId) -> Option<i64> {
        let current = *self.z.get(&id)?;
        if current == self.max {
            return Some(current);
        }
        let z = self.max + 1;
        self.max = z;
        self.z.insert(id, z);
        Some(z)
    }

    /// Reassign the entity strictly below every other tracked value.
    /// No-op when it already holds the minimum.
    pub fn bring_to_back(&mut self, id: EntityId) -> Option<i64> {
        let current = *self.z.get(&id)?;
        if current == self.min {
            return Some(current);
        }
        let z = self.min - 1;
        self.min = z;
        self.z.insert(id, z);
        Some(z)
    }

    /// Stop tracking the entity. Its Z slot is abandoned, not reclaimed;
    /// `min`/`max` are not tightened. Returns the abandoned Z.
    pub fn remove(&mut self, id: EntityId) -> Option<i64> {
        self.z.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<i64> {
        self.z.get(&id).copied()
    }

    /// How many tracked entities sit strictly below this one. O(n);
    /// a diagnostic accessor, not a per-frame operation.
    pub fn rank(&self, id: EntityId) -> Option<usize> {
        let z = self.get(id)?;
        Some(self.z.values().filter(|&&other| other < z).count())
    }
}

impl Default for ZOrderCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
