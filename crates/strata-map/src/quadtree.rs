//! Loose quadtree over entity bounding boxes.
//!
//! # Design
//!
//! Every live entity is stored in exactly one node: the deepest node whose
//! bounds fully contain its bounding box. A box that straddles a split line
//! stays at the interior node above it, and a box that has wandered outside
//! the root bounds collects at the root itself, which every query scans
//! unconditionally. Queries therefore never miss and never return
//! duplicates.
//!
//! Nodes live in a flat `Vec` and refer to children by index; a side table
//! maps each entity to its node so removal and movement skip the descent.
//! Nodes are never merged back: maps churn entities in the same hot areas
//! frame after frame, so a split that was worth doing once is worth
//! keeping.

use std::collections::HashMap;

use crate::entity::EntityId;
use crate::geom::Rect;

/// A node subdivides once it holds more than this many entries.
const SPLIT_THRESHOLD: usize = 8;

/// Maximum subdivision depth. Eight levels over a typical map put leaf
/// cells well below tile size; deeper nodes would be all straddlers.
const MAX_DEPTH: u8 = 8;

const ROOT: u32 = 0;

struct Node {
    bounds: Rect,
    depth: u8,
    /// Indices of the four quadrant children, NW/NE/SW/SE, once split.
    children: Option<[u32; 4]>,
    /// Entities placed at this node, with a copy of their bounding box so
    /// queries never touch the arena.
    entries: Vec<(EntityId, Rect)>,
}

/// The spatial index behind rectangle queries.
pub(crate) struct Quadtree {
    nodes: Vec<Node>,
    locations: HashMap<EntityId, u32>,
}

impl Quadtree {
    pub(crate) fn new(bounds: Rect) -> Self {
        Self {
            nodes: vec![Node {
                bounds,
                depth: 0,
                children: None,
                entries: Vec::new(),
            }],
            locations: HashMap::new(),
        }
    }

    /// Index an entity. The caller guarantees the id is not yet indexed.
    pub(crate) fn insert(&mut self, id: EntityId, bbox: Rect) {
        debug_assert!(!self.locations.contains_key(&id), "entity already indexed");
        let node = self.place(&bbox);
        self.locations.insert(id, node);
        self.nodes[node as usize].entries.push((id, bbox));
        self.maybe_split(node);
    }

    /// Drop an entity from the index. Returns its last indexed box, `None`
    /// if the id was not indexed.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Rect> {
        let node = self.locations.remove(&id)?;
        let entries = &mut self.nodes[node as usize].entries;
        let pos = entries.iter().position(|&(entry, _)| entry == id);
        debug_assert!(pos.is_some(), "location table points at a node without the entry");
        pos.map(|pos| entries.swap_remove(pos).1)
    }

    /// Move an indexed entity to a new bounding box.
    pub(crate) fn update(&mut self, id: EntityId, bbox: Rect) {
        let node = match self.locations.get(&id) {
            Some(&node) => node,
            None => {
                debug_assert!(false, "entity not indexed");
                return;
            }
        };
        let target = self.place(&bbox);
        if target == node {
            let entries = &mut self.nodes[node as usize].entries;
            if let Some(entry) = entries.iter_mut().find(|(entry, _)| *entry == id) {
                entry.1 = bbox;
            }
            return;
        }
        self.remove(id);
        self.locations.insert(id, target);
        self.nodes[target as usize].entries.push((id, bbox));
        self.maybe_split(target);
    }

    /// All indexed entities whose bounding box overlaps `area`, in no
    /// particular order. Zero-sized boxes count as one pixel on either
    /// side, so a point query finds point entities and vice versa.
    pub(crate) fn query(&self, area: &Rect) -> Vec<EntityId> {
        let mut hits = Vec::new();
        // The root is visited unconditionally: it holds the straddlers of
        // the first split and anything outside the map bounds.
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            for &(id, bbox) in &node.entries {
                if bbox.overlaps(area) {
                    hits.push(id);
                }
            }
            if let Some(children) = node.children {
                for &child in &children {
                    if self.nodes[child as usize].bounds.overlaps(area) {
                        stack.push(child);
                    }
                }
            }
        }
        hits
    }

    /// The deepest existing node whose bounds fully contain `bbox`,
    /// falling back to the root for boxes nothing contains.
    fn place(&self, bbox: &Rect) -> u32 {
        let mut current = ROOT;
        'descend: loop {
            let children = match self.nodes[current as usize].children {
                Some(children) => children,
                None => return current,
            };
            for &child in &children {
                if self.nodes[child as usize].bounds.contains_rect(bbox) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Split an overfull leaf and push its entries down one level.
    /// Entries that fit no single quadrant stay behind.
    fn maybe_split(&mut self, index: u32) {
        let node = &self.nodes[index as usize];
        if node.children.is_some()
            || node.entries.len() <= SPLIT_THRESHOLD
            || node.depth >= MAX_DEPTH
        {
            return;
        }
        let bounds = node.bounds;
        let hw = bounds.width / 2;
        let hh = bounds.height / 2;
        if hw == 0 || hh == 0 {
            return;
        }
        let depth = node.depth + 1;
        // Odd pixels go to the east and south quadrants.
        let quadrants = [
            Rect::new(bounds.x, bounds.y, hw, hh),
            Rect::new(bounds.x + hw, bounds.y, bounds.width - hw, hh),
            Rect::new(bounds.x, bounds.y + hh, hw, bounds.height - hh),
            Rect::new(bounds.x + hw, bounds.y + hh, bounds.width - hw, bounds.height - hh),
        ];

        let first = self.nodes.len() as u32;
        for quadrant in quadrants {
            self.nodes.push(Node {
                bounds: quadrant,
                depth,
                children: None,
                entries: Vec::new(),
            });
        }
        let children = [first, first + 1, first + 2, first + 3];
        self.nodes[index as usize].children = Some(children);

        let entries = std::mem::take(&mut self.nodes[index as usize].entries);
        for (id, bbox) in entries {
            let mut target = index;
            for &child in &children {
                if self.nodes[child as usize].bounds.contains_rect(&bbox) {
                    target = child;
                    break;
                }
            }
            self.locations.insert(id, target);
            self.nodes[target as usize].entries.push((id, bbox));
        }
        for child in children {
            self.maybe_split(child);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> EntityId {
        EntityId::new(n, 0)
    }

    fn tree() -> Quadtree {
        Quadtree::new(Rect::new(0, 0, 256, 256))
    }

    fn sorted(mut hits: Vec<EntityId>) -> Vec<EntityId> {
        hits.sort();
        hits
    }

    #[test]
    fn query_finds_overlapping_boxes_only() {
        let mut tree = tree();
        tree.insert(id(0), Rect::new(10, 10, 16, 16));
        tree.insert(id(1), Rect::new(100, 100, 16, 16));

        assert_eq!(tree.query(&Rect::new(0, 0, 32, 32)), vec![id(0)]);
        assert_eq!(tree.query(&Rect::new(90, 90, 32, 32)), vec![id(1)]);
        assert!(tree.query(&Rect::new(200, 0, 8, 8)).is_empty());
        assert_eq!(tree.locations.len(), 2);
    }

    #[test]
    fn split_keeps_every_entity_reachable() {
        let mut tree = tree();
        // Enough clustered boxes to force subdivision.
        for n in 0..32 {
            let x = (n % 8) * 8;
            let y = (n / 8) * 8;
            tree.insert(id(n as u32), Rect::new(x, y, 6, 6));
        }
        assert!(tree.nodes.len() > 1);

        let all = tree.query(&Rect::new(0, 0, 256, 256));
        assert_eq!(all.len(), 32);
        // A small window still only returns the boxes inside it.
        let corner = tree.query(&Rect::new(0, 0, 8, 8));
        assert!(corner.contains(&id(0)));
        assert!(!corner.contains(&id(31)));
    }

    #[test]
    fn straddler_stays_above_the_split_line() {
        let mut tree = tree();
        // Across the vertical center line of the root.
        tree.insert(id(99), Rect::new(120, 8, 32, 16));
        for n in 0..16 {
            tree.insert(id(n), Rect::new((n as i32 % 4) * 8, (n as i32 / 4) * 8, 6, 6));
        }
        assert!(tree.nodes.len() > 1);
        assert_eq!(tree.locations[&id(99)], ROOT);
        assert!(tree.query(&Rect::new(130, 10, 4, 4)).contains(&id(99)));
    }

    #[test]
    fn removed_entities_stop_appearing() {
        let mut tree = tree();
        tree.insert(id(0), Rect::new(10, 10, 16, 16));
        tree.insert(id(1), Rect::new(12, 12, 16, 16));

        assert_eq!(tree.remove(id(0)), Some(Rect::new(10, 10, 16, 16)));
        assert!(!tree.locations.contains_key(&id(0)));
        assert_eq!(tree.query(&Rect::new(0, 0, 64, 64)), vec![id(1)]);
        assert_eq!(tree.remove(id(0)), None);
    }

    #[test]
    fn update_moves_across_nodes() {
        let mut tree = tree();
        for n in 0..16 {
            tree.insert(id(n), Rect::new((n as i32 % 4) * 8, (n as i32 / 4) * 8, 6, 6));
        }
        assert!(tree.nodes.len() > 1);

        // Walk one entity from the north-west corner to the south-east.
        tree.update(id(0), Rect::new(200, 200, 6, 6));
        assert!(!tree.query(&Rect::new(0, 0, 8, 8)).contains(&id(0)));
        assert!(tree.query(&Rect::new(196, 196, 16, 16)).contains(&id(0)));
        assert_eq!(tree.locations.len(), 16);
    }

    #[test]
    fn update_in_place_keeps_the_box_current() {
        let mut tree = tree();
        tree.insert(id(0), Rect::new(10, 10, 16, 16));
        tree.update(id(0), Rect::new(11, 10, 16, 16));
        assert!(tree.query(&Rect::new(26, 10, 2, 2)).contains(&id(0)));
        assert!(!tree.query(&Rect::new(8, 10, 2, 2)).contains(&id(0)));
    }

    #[test]
    fn entity_outside_the_root_bounds_is_still_found() {
        let mut tree = tree();
        tree.insert(id(0), Rect::new(-40, -40, 16, 16));
        tree.insert(id(1), Rect::new(300, 128, 16, 16));

        assert_eq!(tree.query(&Rect::new(-48, -48, 32, 32)), vec![id(0)]);
        assert_eq!(tree.query(&Rect::new(296, 120, 32, 32)), vec![id(1)]);
    }

    #[test]
    fn zero_sized_boxes_are_placeable_and_queryable() {
        let mut tree = tree();
        tree.insert(id(0), Rect::new(50, 50, 0, 0));

        assert_eq!(tree.query(&Rect::new(40, 40, 20, 20)), vec![id(0)]);
        // A point query on a regular box works too.
        tree.insert(id(1), Rect::new(80, 80, 16, 16));
        assert_eq!(tree.query(&Rect::new(88, 88, 0, 0)), vec![id(1)]);
    }

    #[test]
    fn query_never_duplicates() {
        let mut tree = tree();
        for n in 0..40 {
            tree.insert(id(n), Rect::new((n as i32 * 13) % 200, (n as i32 * 29) % 200, 24, 24));
        }
        let hits = sorted(tree.query(&Rect::new(0, 0, 256, 256)));
        let mut deduped = hits.clone();
        deduped.dedup();
        assert_eq!(hits, deduped);
        assert_eq!(hits.len(), 40);
    }
}
