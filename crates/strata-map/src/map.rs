//! The per-map entity registry.
//!
//! # Design
//!
//! [`MapEntities`] is the single entry point the loader, the frame driver
//! and entity behaviors all call. It aggregates, per layer: the ground
//! grid, the static-tile region optimizer, a Z-order cache and two draw
//! lists (normal order and Y order); plus, map-wide: the entity arena, a
//! name index, kind×layer sets, the quadtree and the deferred-removal
//! queue.
//!
//! A live non-tile entity appears in exactly one of each per-layer
//! structure it belongs to: the name index (if named), its kind×layer set,
//! the quadtree, its layer's Z-cache and exactly one of its layer's two
//! draw lists. Each normal-order draw list stays sorted by ascending Z at
//! all times; every mutation that could disturb that (reorders, layer
//! moves, the Y-order toggle) repairs it immediately, so `draw()` never
//! sorts the normal lists.
//!
//! Removal is two-phase. A removal request marks the entity and enqueues
//! it; name lookups miss immediately, but every structural index keeps the
//! entity until the sweep at the end of `update()`. Iteration in flight
//! during the frame is therefore never invalidated, which is what lets an
//! update hook remove any entity, itself included.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::ops::Bound;

use tracing::{debug, warn};

use crate::camera::Camera;
use crate::canvas::Canvas;
use crate::entity::{
    DrawContext, EntityArena, EntityId, EntityInit, EntityKind, EntityRecord, LayerId, MapEvent,
};
use crate::geom::{Point, Rect, Size};
use crate::ground::{Ground, GroundGrid};
use crate::quadtree::Quadtree;
use crate::regions::NonAnimatedRegions;
use crate::tile::TileInfo;
use crate::zorder::ZOrderCache;
use crate::MapError;

/// Entities may wander a little outside the map (knockback, thrown
/// objects) without falling out of the quadtree's well-indexed area.
const QUADTREE_MARGIN: i32 = 64;

/// Everything that lives on one map.
pub struct MapEntities {
    size: Size,
    num_layers: u8,
    map_started: bool,
    suspended: bool,
    camera: Camera,

    arena: EntityArena,
    /// General update list, insertion order. Excludes tiles (never arena
    /// entities) and the hero (updated separately, first).
    all_entities: Vec<EntityId>,
    named: BTreeMap<String, EntityId>,
    by_kind: HashMap<EntityKind, Vec<BTreeSet<EntityId>>>,
    quadtree: Quadtree,
    z_caches: Vec<ZOrderCache>,
    /// Per layer, sorted by ascending Z at all times.
    drawn_normal: Vec<Vec<EntityId>>,
    /// Per layer, unordered; sorted by (bottom edge, Z) at draw time.
    drawn_y_order: Vec<Vec<EntityId>>,
    pending_removals: Vec<EntityId>,

    ground: GroundGrid,
    regions: Vec<NonAnimatedRegions>,
    /// Per layer, filled at map start with the tiles the region optimizer
    /// could not bake; drawn individually every frame, insertion order.
    animated_tiles: Vec<Vec<TileInfo>>,
    tile_count: usize,

    hero: Option<EntityId>,
    default_destination: Option<EntityId>,
}

impl MapEntities {
    /// A registry for a map of `size` pixels and `num_layers` layers.
    /// All context is injected here; there are no ambient globals, so a
    /// registry is fully usable in tests without any game loop.
    pub fn new(size: Size, num_layers: u8, camera: Camera) -> Self {
        assert!(num_layers > 0, "a map needs at least one layer");
        assert!(
            size.width > 0 && size.height > 0,
            "map size must be positive"
        );
        let layers = num_layers as usize;
        Self {
            size,
            num_layers,
            map_started: false,
            suspended: false,
            camera,
            arena: EntityArena::new(),
            all_entities: Vec::new(),
            named: BTreeMap::new(),
            by_kind: HashMap::new(),
            quadtree: Quadtree::new(Rect::new(
                -QUADTREE_MARGIN,
                -QUADTREE_MARGIN,
                size.width + 2 * QUADTREE_MARGIN,
                size.height + 2 * QUADTREE_MARGIN,
            )),
            z_caches: (0..layers).map(|_| ZOrderCache::new()).collect(),
            drawn_normal: vec![Vec::new(); layers],
            drawn_y_order: vec![Vec::new(); layers],
            pending_removals: Vec::new(),
            ground: GroundGrid::new(size, num_layers),
            regions: (0..num_layers)
                .map(|layer| NonAnimatedRegions::new(LayerId(layer), size))
                .collect(),
            animated_tiles: vec![Vec::new(); layers],
            tile_count: 0,
            hero: None,
            default_destination: None,
        }
    }

    // -----------------------------------------------------------------------
    // Loader path
    // -----------------------------------------------------------------------

    /// Register one static tile. Loader-only: tiles are plain data routed
    /// into the ground grid and the region optimizer, never the arena or
    /// the quadtree.
    ///
    /// # Panics
    ///
    /// If the map has already started or the tile's layer is out of range;
    /// both are loader bugs.
    pub fn add_tile(&mut self, tile: TileInfo) {
        assert!(
            !self.map_started,
            "tiles can only be added before the map starts"
        );
        self.assert_layer(tile.layer);
        self.ground.add_tile(&tile);
        self.tile_count += 1;
        self.regions[tile.layer.0 as usize].add_tile(tile);
    }

    /// Register a dynamic entity and return its handle.
    ///
    /// The entity enters the name index (if named), its kind×layer set,
    /// the quadtree, its layer's Z-cache (on top of the stack) and the
    /// draw list its Y-order flag selects. A `Hero` takes the hero slot
    /// instead of the general update list; the first `Destination` becomes
    /// the default destination. The behavior hears `AddedToMap`, and
    /// `set_suspended(true)` if the map is currently suspended.
    ///
    /// Fails with [`MapError::DuplicateEntityName`] if the name is taken
    /// by a live entity (names free up only at the removal sweep).
    ///
    /// # Panics
    ///
    /// On an out-of-range layer or a `Tile` kind.
    pub fn add_entity(&mut self, init: EntityInit) -> Result<EntityId, MapError> {
        assert!(init.kind != EntityKind::Tile, "tiles go through add_tile");
        self.assert_layer(init.layer);
        if let Some(name) = &init.name {
            if self.named.contains_key(name.as_str()) {
                return Err(MapError::DuplicateEntityName { name: name.clone() });
            }
        }

        let name = init.name.clone();
        let kind = init.kind;
        let layer = init.layer;
        let bbox = init.bbox;
        let y_order = init.drawn_in_y_order;
        let id = self.arena.insert(EntityRecord::new(init));

        if let Some(name) = name {
            self.named.insert(name, id);
        }
        let layers = self.num_layers as usize;
        self.by_kind
            .entry(kind)
            .or_insert_with(|| vec![BTreeSet::new(); layers])[layer.0 as usize]
            .insert(id);
        self.quadtree.insert(id, bbox);
        self.z_caches[layer.0 as usize].add(id);
        if y_order {
            self.drawn_y_order[layer.0 as usize].push(id);
        } else {
            // A fresh Z is the layer maximum, so appending keeps the
            // sorted invariant.
            self.drawn_normal[layer.0 as usize].push(id);
        }

        if kind == EntityKind::Hero {
            assert!(self.hero.is_none(), "a map has a single hero");
            self.hero = Some(id);
        } else {
            self.all_entities.push(id);
        }
        if kind == EntityKind::Destination && self.default_destination.is_none() {
            self.default_destination = Some(id);
        }

        if let Some(mut behavior) = self.arena.take_behavior(id) {
            behavior.notify_event(MapEvent::AddedToMap);
            if self.suspended {
                behavior.set_suspended(true);
            }
            self.arena.put_behavior(id, behavior);
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Request removal. The entity is logically gone at once (name lookups
    /// miss) but stays in every structural index until the sweep at the
    /// end of the current or next `update()`. A second request for the
    /// same entity is tolerated.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), MapError> {
        let record = self.arena.get_mut(id).ok_or(MapError::StaleEntity { id })?;
        if record.marked_for_removal {
            warn!(id = %id, "removal requested twice");
            return Ok(());
        }
        record.marked_for_removal = true;
        self.pending_removals.push(id);
        Ok(())
    }

    /// Request removal by name. A miss is a logged no-op.
    pub fn remove_entity_named(&mut self, name: &str) {
        match self.find_entity(name) {
            Some(id) => {
                let _ = self.remove_entity(id);
            }
            None => warn!(name, "removal of an unknown entity name"),
        }
    }

    /// Request removal of every entity whose name starts with `prefix`.
    /// No matching name stays visible to lookups afterwards.
    pub fn remove_entities_with_prefix(&mut self, prefix: &str) {
        let matched: Vec<EntityId> = self.named_with_prefix(prefix).collect();
        debug!(prefix, count = matched.len(), "removing entities by prefix");
        for id in matched {
            let _ = self.remove_entity(id);
        }
    }

    /// Apply all queued removals: unlink each entity from every structure
    /// it was part of, deliver `RemovedFromMap` exactly once, recycle its
    /// arena slot.
    fn remove_marked_entities(&mut self) {
        if self.pending_removals.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_removals);
        debug!(count = pending.len(), "removal sweep");
        let mut swept: HashSet<EntityId> = HashSet::with_capacity(pending.len());
        for id in pending {
            let Some(record) = self.arena.remove(id) else {
                continue;
            };
            swept.insert(id);
            let layer = record.layer;

            if let Some(name) = &record.name {
                self.named.remove(name);
            }
            if let Some(sets) = self.by_kind.get_mut(&record.kind) {
                sets[layer.0 as usize].remove(&id);
            }
            self.quadtree.remove(id);
            let old_z = self.z_caches[layer.0 as usize].remove(id);
            if record.drawn_in_y_order {
                let list = &mut self.drawn_y_order[layer.0 as usize];
                if let Some(pos) = list.iter().position(|&entry| entry == id) {
                    list.swap_remove(pos);
                }
            } else if let Some(old_z) = old_z {
                self.remove_from_normal_list(layer, id, old_z);
            }
            if self.hero == Some(id) {
                self.hero = None;
            }
            if self.default_destination == Some(id) {
                self.default_destination = None;
            }

            if let Some(mut behavior) = record.behavior {
                behavior.notify_event(MapEvent::RemovedFromMap);
            }
        }
        self.all_entities.retain(|id| !swept.contains(id));
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// The entity currently holding `name`, if any. Misses immediately for
    /// entities marked for removal this frame.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        let id = *self.named.get(name)?;
        if self.is_marked_for_removal(id) {
            return None;
        }
        Some(id)
    }

    /// Like [`find_entity`](Self::find_entity), as a `Result` for callers
    /// that treat the miss as an error to report.
    pub fn get_entity(&self, name: &str) -> Result<EntityId, MapError> {
        self.find_entity(name).ok_or_else(|| MapError::NoSuchEntity {
            name: name.to_owned(),
        })
    }

    /// The general update list, insertion order. Excludes the hero and
    /// tiles; still contains entities marked this frame.
    pub fn get_entities(&self) -> &[EntityId] {
        &self.all_entities
    }

    /// All entities of `kind`, ordered by layer then id.
    pub fn get_entities_by_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        match self.by_kind.get(&kind) {
            Some(sets) => sets.iter().flat_map(|set| set.iter().copied()).collect(),
            None => Vec::new(),
        }
    }

    /// All entities of `kind` on `layer`, ordered by id.
    pub fn get_entities_by_kind_on_layer(&self, kind: EntityKind, layer: LayerId) -> Vec<EntityId> {
        self.assert_layer(layer);
        match self.by_kind.get(&kind) {
            Some(sets) => sets[layer.0 as usize].iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Entities whose name starts with `prefix`, in name order.
    pub fn get_entities_with_prefix(&self, prefix: &str) -> Vec<EntityId> {
        self.named_with_prefix(prefix).collect()
    }

    /// Entities of `kind` whose name starts with `prefix`, in name order.
    pub fn get_entities_with_prefix_of_kind(
        &self,
        kind: EntityKind,
        prefix: &str,
    ) -> Vec<EntityId> {
        self.named_with_prefix(prefix)
            .filter(|&id| self.entity_kind(id) == Some(kind))
            .collect()
    }

    pub fn has_entity_with_prefix(&self, prefix: &str) -> bool {
        self.named_with_prefix(prefix).next().is_some()
    }

    /// Range scan over the ordered name index, skipping entities already
    /// marked for removal.
    fn named_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        self.named
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(_, &id)| id)
            .filter(move |&id| !self.is_marked_for_removal(id))
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    /// All entities whose bounding box overlaps `rect`, unordered.
    /// Includes entities marked for removal until the sweep.
    pub fn get_entities_in_rectangle(&self, rect: Rect) -> Vec<EntityId> {
        self.quadtree.query(&rect)
    }

    /// Like [`get_entities_in_rectangle`](Self::get_entities_in_rectangle)
    /// but ordered exactly as `draw()` would paint them: ascending layer,
    /// then normal-order entities by ascending Z, then Y-order entities by
    /// ascending bottom edge with Z as tiebreak. Suitable for
    /// occlusion-correct hit-testing.
    pub fn get_entities_in_rectangle_sorted(&self, rect: Rect) -> Vec<EntityId> {
        let mut hits = self.quadtree.query(&rect);
        hits.sort_by_key(|&id| self.draw_order_key(id));
        hits
    }

    fn draw_order_key(&self, id: EntityId) -> (u8, bool, i64, i64) {
        let Some(record) = self.arena.get(id) else {
            return (u8::MAX, true, i64::MAX, i64::MAX);
        };
        let z = self.z_caches[record.layer.0 as usize]
            .get(id)
            .unwrap_or(i64::MAX);
        if record.drawn_in_y_order {
            (record.layer.0, true, record.bbox.bottom() as i64, z)
        } else {
            (record.layer.0, false, z, 0)
        }
    }

    /// Ground classification of the highest static tile at pixel `(x, y)`
    /// on `layer`, straight from the precomputed grid.
    ///
    /// # Panics
    ///
    /// No validation is performed beyond the slice-index panic on an
    /// out-of-range layer or coordinate; validity is the caller's
    /// responsibility. This is a deliberate contract: the lookup sits on
    /// the collision hot path.
    pub fn get_tile_ground(&self, layer: LayerId, x: i32, y: i32) -> Ground {
        self.ground.get(layer, x, y)
    }

    /// Effective ground at a point: the topmost (by Z) non-marked entity
    /// on `layer` whose box contains the point and whose behavior reports
    /// a ground override wins; otherwise the static tile baseline.
    pub fn get_ground(&self, layer: LayerId, point: Point) -> Ground {
        self.assert_layer(layer);
        let probe = Rect::new(point.x, point.y, 0, 0);
        let mut best: Option<(i64, Ground)> = None;
        for id in self.quadtree.query(&probe) {
            let Some(record) = self.arena.get(id) else {
                continue;
            };
            if record.layer != layer || record.marked_for_removal {
                continue;
            }
            let Some(ground) = record
                .behavior
                .as_ref()
                .and_then(|behavior| behavior.ground_override())
            else {
                continue;
            };
            let z = self.z_caches[layer.0 as usize].get(id).unwrap_or(i64::MIN);
            if best.map_or(true, |(best_z, _)| z > best_z) {
                best = Some((z, ground));
            }
        }
        match best {
            Some((_, ground)) => ground,
            None => self.get_tile_ground(layer, point.x, point.y),
        }
    }

    /// Whether any crystal block on `layer` overlapping `rect` is
    /// currently raised (reports a `Wall` ground override). The worked
    /// example of composing kind, spatial and capability queries.
    pub fn overlaps_raised_blocks(&self, layer: LayerId, rect: Rect) -> bool {
        self.assert_layer(layer);
        self.quadtree.query(&rect).into_iter().any(|id| {
            let Some(record) = self.arena.get(id) else {
                return false;
            };
            record.kind == EntityKind::CrystalBlock
                && record.layer == layer
                && record
                    .behavior
                    .as_ref()
                    .is_some_and(|behavior| behavior.ground_override() == Some(Ground::Wall))
        })
    }

    // -----------------------------------------------------------------------
    // Stacking and layout changes
    // -----------------------------------------------------------------------

    /// Restack the entity strictly above everything else on its layer.
    /// For a normal-order entity the draw list is repaired to match.
    pub fn bring_to_front(&mut self, id: EntityId) -> Result<(), MapError> {
        let Some(record) = self.arena.get(id) else {
            warn!(id = %id, "reorder of a stale entity handle");
            return Err(MapError::StaleEntity { id });
        };
        let layer = record.layer;
        let y_order = record.drawn_in_y_order;
        let cache = &mut self.z_caches[layer.0 as usize];
        let old_z = cache.get(id);
        let new_z = cache.bring_to_front(id);
        if y_order {
            return Ok(());
        }
        if let (Some(old_z), Some(new_z)) = (old_z, new_z) {
            if new_z != old_z {
                self.remove_from_normal_list(layer, id, old_z);
                self.drawn_normal[layer.0 as usize].push(id);
            }
        }
        Ok(())
    }

    /// Restack the entity strictly below everything else on its layer.
    pub fn bring_to_back(&mut self, id: EntityId) -> Result<(), MapError> {
        let Some(record) = self.arena.get(id) else {
            warn!(id = %id, "reorder of a stale entity handle");
            return Err(MapError::StaleEntity { id });
        };
        let layer = record.layer;
        let y_order = record.drawn_in_y_order;
        let cache = &mut self.z_caches[layer.0 as usize];
        let old_z = cache.get(id);
        let new_z = cache.bring_to_back(id);
        if y_order {
            return Ok(());
        }
        if let (Some(old_z), Some(new_z)) = (old_z, new_z) {
            if new_z != old_z {
                self.remove_from_normal_list(layer, id, old_z);
                self.drawn_normal[layer.0 as usize].insert(0, id);
            }
        }
        Ok(())
    }

    /// Move the entity to another layer: out of the old layer's kind set,
    /// Z-cache and draw list, onto the new layer's (on top of its stack,
    /// with a fresh Z). The quadtree indexes boxes only and is untouched.
    pub fn set_entity_layer(&mut self, id: EntityId, new_layer: LayerId) -> Result<(), MapError> {
        self.assert_layer(new_layer);
        let record = self.arena.get(id).ok_or(MapError::StaleEntity { id })?;
        let old_layer = record.layer;
        if old_layer == new_layer {
            return Ok(());
        }
        let kind = record.kind;
        let y_order = record.drawn_in_y_order;

        if let Some(sets) = self.by_kind.get_mut(&kind) {
            sets[old_layer.0 as usize].remove(&id);
        }
        let old_z = self.z_caches[old_layer.0 as usize].remove(id);
        if y_order {
            let list = &mut self.drawn_y_order[old_layer.0 as usize];
            if let Some(pos) = list.iter().position(|&entry| entry == id) {
                list.swap_remove(pos);
            }
        } else if let Some(old_z) = old_z {
            self.remove_from_normal_list(old_layer, id, old_z);
        }

        if let Some(sets) = self.by_kind.get_mut(&kind) {
            sets[new_layer.0 as usize].insert(id);
        }
        self.z_caches[new_layer.0 as usize].add(id);
        if y_order {
            self.drawn_y_order[new_layer.0 as usize].push(id);
        } else {
            self.drawn_normal[new_layer.0 as usize].push(id);
        }
        if let Some(record) = self.arena.get_mut(id) {
            record.layer = new_layer;
        }
        Ok(())
    }

    /// Switch the entity between its layer's normal-order and Y-order draw
    /// lists. Its Z value is untouched; re-entering the normal list places
    /// it at the position its Z dictates.
    pub fn set_entity_drawn_in_y_order(
        &mut self,
        id: EntityId,
        y_order: bool,
    ) -> Result<(), MapError> {
        let record = self.arena.get(id).ok_or(MapError::StaleEntity { id })?;
        if record.drawn_in_y_order == y_order {
            return Ok(());
        }
        let layer = record.layer;
        let z = self.z_caches[layer.0 as usize].get(id);

        if y_order {
            if let Some(z) = z {
                self.remove_from_normal_list(layer, id, z);
            }
            self.drawn_y_order[layer.0 as usize].push(id);
        } else {
            let list = &mut self.drawn_y_order[layer.0 as usize];
            if let Some(pos) = list.iter().position(|&entry| entry == id) {
                list.swap_remove(pos);
            }
            if let Some(z) = z {
                self.insert_into_normal_list(layer, id, z);
            }
        }
        if let Some(record) = self.arena.get_mut(id) {
            record.drawn_in_y_order = y_order;
        }
        Ok(())
    }

    /// The entity's box moved or resized; reindex it spatially.
    pub fn notify_entity_bounding_box_changed(
        &mut self,
        id: EntityId,
        bbox: Rect,
    ) -> Result<(), MapError> {
        let record = self.arena.get_mut(id).ok_or(MapError::StaleEntity { id })?;
        record.bbox = bbox;
        self.quadtree.update(id, bbox);
        Ok(())
    }

    /// Remove `id` from its layer's normal draw list, located by binary
    /// search on its Z value.
    fn remove_from_normal_list(&mut self, layer: LayerId, id: EntityId, z: i64) {
        let cache = &self.z_caches[layer.0 as usize];
        let list = &mut self.drawn_normal[layer.0 as usize];
        let pos = list.partition_point(|&entry| match cache.get(entry) {
            Some(entry_z) => entry_z < z,
            None => false,
        });
        if list.get(pos) == Some(&id) {
            list.remove(pos);
            return;
        }
        // The entry was not where its Z said; repair by scanning.
        if let Some(pos) = list.iter().position(|&entry| entry == id) {
            list.remove(pos);
        }
    }

    /// Insert `id` into its layer's normal draw list at the position its Z
    /// dictates, preserving the ascending-Z invariant.
    fn insert_into_normal_list(&mut self, layer: LayerId, id: EntityId, z: i64) {
        let cache = &self.z_caches[layer.0 as usize];
        let list = &mut self.drawn_normal[layer.0 as usize];
        let pos = list.partition_point(|&entry| match cache.get(entry) {
            Some(entry_z) => entry_z < z,
            None => false,
        });
        list.insert(pos, id);
    }

    // -----------------------------------------------------------------------
    // Entity accessors
    // -----------------------------------------------------------------------

    pub fn contains(&self, id: EntityId) -> bool {
        self.arena.contains(id)
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.arena.get(id)?.name.as_deref()
    }

    pub fn entity_kind(&self, id: EntityId) -> Option<EntityKind> {
        Some(self.arena.get(id)?.kind)
    }

    pub fn entity_layer(&self, id: EntityId) -> Option<LayerId> {
        Some(self.arena.get(id)?.layer)
    }

    pub fn entity_bbox(&self, id: EntityId) -> Option<Rect> {
        Some(self.arena.get(id)?.bbox)
    }

    pub fn is_drawn_in_y_order(&self, id: EntityId) -> bool {
        self.arena
            .get(id)
            .is_some_and(|record| record.drawn_in_y_order)
    }

    pub fn is_marked_for_removal(&self, id: EntityId) -> bool {
        self.arena
            .get(id)
            .is_some_and(|record| record.marked_for_removal)
    }

    /// The entity's Z on its current layer. A relative comparator between
    /// entities on the same layer, never an absolute position.
    pub fn z_order(&self, id: EntityId) -> Option<i64> {
        let layer = self.entity_layer(id)?;
        self.z_caches[layer.0 as usize].get(id)
    }

    /// How many entities on the same layer sit strictly below this one.
    pub fn get_entity_relative_z_order(&self, id: EntityId) -> Option<usize> {
        let layer = self.entity_layer(id)?;
        self.z_caches[layer.0 as usize].rank(id)
    }

    pub fn hero(&self) -> Option<EntityId> {
        self.hero
    }

    pub fn default_destination(&self) -> Option<EntityId> {
        self.default_destination
    }

    pub fn set_default_destination(&mut self, id: EntityId) -> Result<(), MapError> {
        if !self.arena.contains(id) {
            return Err(MapError::StaleEntity { id });
        }
        self.default_destination = Some(id);
        Ok(())
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn num_layers(&self) -> u8 {
        self.num_layers
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_started(&self) -> bool {
        self.map_started
    }

    /// Live dynamic entities (hero included, tiles never counted).
    pub fn entity_count(&self) -> usize {
        self.arena.live_count()
    }

    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Suspend or resume the whole map. Forwarded to every live behavior;
    /// while suspended, `update()` runs no behavior hooks and no camera
    /// tracking, but still sweeps queued removals.
    pub fn set_suspended(&mut self, suspended: bool) {
        if self.suspended == suspended {
            return;
        }
        self.suspended = suspended;
        debug!(suspended, "suspension changed");
        if let Some(hero) = self.hero {
            if let Some(record) = self.arena.get_mut(hero) {
                if let Some(behavior) = record.behavior.as_mut() {
                    behavior.set_suspended(suspended);
                }
            }
        }
        for &id in &self.all_entities {
            if let Some(record) = self.arena.get_mut(id) {
                if let Some(behavior) = record.behavior.as_mut() {
                    behavior.set_suspended(suspended);
                }
            }
        }
    }

    /// The map begins: bake the per-layer region caches and tell every
    /// behavior. Tiles can no longer be added past this point.
    pub fn notify_map_started(&mut self) {
        assert!(!self.map_started, "the map already started");
        self.map_started = true;
        for (layer, regions) in self.regions.iter_mut().enumerate() {
            self.animated_tiles[layer] = regions.build();
        }
        debug!(
            tiles = self.tile_count,
            entities = self.arena.live_count(),
            "map started"
        );
        self.broadcast(MapEvent::MapStarted);
    }

    pub fn notify_map_opening_transition_finished(&mut self) {
        self.broadcast(MapEvent::OpeningTransitionFinished);
    }

    /// The active tileset changed: every layer cache is rebuilt on its
    /// next draw.
    pub fn notify_tileset_changed(&mut self) {
        for regions in &mut self.regions {
            regions.invalidate_cache();
        }
        self.broadcast(MapEvent::TilesetChanged);
    }

    pub fn notify_map_finished(&mut self) {
        debug!(entities = self.arena.live_count(), "map finished");
        self.broadcast(MapEvent::MapFinished);
    }

    fn broadcast(&mut self, event: MapEvent) {
        if let Some(hero) = self.hero {
            self.notify_one(hero, event);
        }
        for index in 0..self.all_entities.len() {
            let id = self.all_entities[index];
            self.notify_one(id, event);
        }
    }

    fn notify_one(&mut self, id: EntityId, event: MapEvent) {
        if let Some(record) = self.arena.get_mut(id) {
            if record.marked_for_removal {
                return;
            }
            if let Some(behavior) = record.behavior.as_mut() {
                behavior.notify_event(event);
            }
        }
    }

    // -----------------------------------------------------------------------
    // The frame
    // -----------------------------------------------------------------------

    /// Advance the map one frame: hero first, then the general list in
    /// insertion order (entities spawned mid-pass are reached this same
    /// pass), then camera tracking, then the removal sweep. Hooks are
    /// skipped while suspended; the sweep never is.
    ///
    /// # Panics
    ///
    /// If the map has not started.
    pub fn update(&mut self) {
        assert!(self.map_started, "update called before the map started");
        if !self.suspended {
            if let Some(hero) = self.hero {
                self.update_one(hero);
            }
            let mut index = 0;
            while index < self.all_entities.len() {
                let id = self.all_entities[index];
                self.update_one(id);
                index += 1;
            }
            self.update_camera_tracking();
        }
        self.remove_marked_entities();
    }

    /// Run one entity's update hook. The behavior box is moved out of its
    /// slot for the duration so the hook can take `&mut MapEntities`.
    fn update_one(&mut self, id: EntityId) {
        if self.is_marked_for_removal(id) {
            return;
        }
        if let Some(mut behavior) = self.arena.take_behavior(id) {
            behavior.update(self, id);
            self.arena.put_behavior(id, behavior);
        }
    }

    fn update_camera_tracking(&mut self) {
        let Some(tracked) = self.camera.tracked() else {
            return;
        };
        match self.entity_bbox(tracked) {
            Some(bbox) if !self.is_marked_for_removal(tracked) => {
                self.camera.center_on(bbox.center());
            }
            _ => {
                debug!(id = %tracked, "tracked entity gone, tracking dropped");
                self.camera.track(None);
            }
        }
    }

    /// Paint the frame: for each layer low to high, the baked region
    /// cache, then animated tiles, then normal-order entities in list
    /// order (ascending Z), then visible Y-order entities sorted by
    /// (bottom edge, Z). Everything is culled against the camera. Entities
    /// marked for removal still draw until the sweep.
    ///
    /// # Panics
    ///
    /// If the map has not started.
    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        assert!(self.map_started, "draw called before the map started");
        let visible = self.camera.visible_rect();

        for layer in 0..self.num_layers as usize {
            self.regions[layer].draw(canvas, visible);

            for tile in &self.animated_tiles[layer] {
                if tile.bbox.overlaps(&visible) {
                    canvas.draw_tile(tile.pattern, tile.position());
                }
            }

            for &id in &self.drawn_normal[layer] {
                self.draw_one(id, visible, canvas);
            }

            let mut y_visible: Vec<(i64, i64, EntityId)> = Vec::new();
            for &id in &self.drawn_y_order[layer] {
                let Some(record) = self.arena.get(id) else {
                    continue;
                };
                if !record.bbox.overlaps(&visible) {
                    continue;
                }
                let z = self.z_caches[layer].get(id).unwrap_or(i64::MAX);
                y_visible.push((record.bbox.bottom() as i64, z, id));
            }
            y_visible.sort_unstable();
            for (_, _, id) in y_visible {
                self.draw_one(id, visible, canvas);
            }
        }
    }

    fn draw_one(&self, id: EntityId, visible: Rect, canvas: &mut dyn Canvas) {
        let Some(record) = self.arena.get(id) else {
            return;
        };
        if !record.bbox.overlaps(&visible) {
            return;
        }
        let Some(behavior) = record.behavior.as_ref() else {
            return;
        };
        let ctx = DrawContext {
            id,
            bbox: record.bbox,
            layer: record.layer,
            camera: &self.camera,
        };
        behavior.draw(&ctx, canvas);
    }

    fn assert_layer(&self, layer: LayerId) {
        assert!(
            (layer.0 as usize) < self.num_layers as usize,
            "{layer} out of range (map has {} layers)",
            self.num_layers
        );
    }
}

impl fmt::Debug for MapEntities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapEntities")
            .field("size", &self.size)
            .field("num_layers", &self.num_layers)
            .field("started", &self.map_started)
            .field("suspended", &self.suspended)
            .field("entities", &self.arena.live_count())
            .field("tiles", &self.tile_count)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
