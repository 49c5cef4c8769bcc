//! Entity identity, the capability trait and the arena that owns entities.
//!
//! # Design
//!
//! Every structure in this crate refers to entities through [`EntityId`], a
//! 64-bit generational handle packing `[generation: u32 | index: u32]`. The
//! [`EntityArena`] owns the actual per-entity state (name, kind, layer,
//! bounding box and the boxed [`EntityBehavior`]); slots are reused in FIFO
//! order with a bumped generation, so a handle held across a removal can
//! never alias a newer entity that landed in the same slot.
//!
//! The registry needs very little from an entity: an update hook, a draw
//! hook, an optional ground override and two notification channels. That is
//! the whole [`EntityBehavior`] trait; concrete entity kinds implement the
//! parts they need and inherit no-ops for the rest.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::canvas::Canvas;
use crate::geom::Rect;
use crate::ground::Ground;
use crate::map::MapEntities;

// ---------------------------------------------------------------------------
// LayerId
// ---------------------------------------------------------------------------

/// Index of one layer of the map's Z-space, `0..num_layers`.
///
/// Layer validity is checked where layers enter the registry (`add_tile`,
/// `add_entity`, `set_entity_layer`); past that boundary the index is
/// trusted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct LayerId(pub u8);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle: `[generation: u32 | index: u32]` packed
/// into a `u64`.
///
/// The index addresses an arena slot; the generation distinguishes
/// successive occupants of that slot. Copy it freely: every substructure of
/// the registry stores plain ids, never owning references.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(u64);

impl EntityId {
    pub fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    pub fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Closed enumeration of entity kinds the registry distinguishes.
///
/// `Tile` never enters the arena: static tiles are plain data routed
/// through the ground grid and the region optimizer. The variant exists so
/// loaders and name tables cover the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Tile,
    Hero,
    Destination,
    Npc,
    Enemy,
    Block,
    CrystalBlock,
    Switch,
    Sensor,
    Custom,
}

impl EntityKind {
    /// Every kind, in declaration order. Drives the name table scans.
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Tile,
        EntityKind::Hero,
        EntityKind::Destination,
        EntityKind::Npc,
        EntityKind::Enemy,
        EntityKind::Block,
        EntityKind::CrystalBlock,
        EntityKind::Switch,
        EntityKind::Sensor,
        EntityKind::Custom,
    ];

    /// The loader-facing name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Tile => "tile",
            EntityKind::Hero => "hero",
            EntityKind::Destination => "destination",
            EntityKind::Npc => "npc",
            EntityKind::Enemy => "enemy",
            EntityKind::Block => "block",
            EntityKind::CrystalBlock => "crystal_block",
            EntityKind::Switch => "switch",
            EntityKind::Sensor => "sensor",
            EntityKind::Custom => "custom",
        }
    }

    /// Reverse lookup over the closed set. Linear scan; the table is tiny.
    pub fn by_name(name: &str) -> Option<EntityKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

// ---------------------------------------------------------------------------
// MapEvent
// ---------------------------------------------------------------------------

/// One-shot notifications delivered to entity behaviors.
///
/// `AddedToMap` and `RemovedFromMap` bracket an entity's time in the
/// registry (`RemovedFromMap` fires exactly once, during the removal
/// sweep). The rest are map lifecycle broadcasts forwarded to every live
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    AddedToMap,
    RemovedFromMap,
    MapStarted,
    OpeningTransitionFinished,
    TilesetChanged,
    MapFinished,
}

// ---------------------------------------------------------------------------
// DrawContext
// ---------------------------------------------------------------------------

/// Read-only view handed to [`EntityBehavior::draw`].
pub struct DrawContext<'a> {
    /// The entity being drawn.
    pub id: EntityId,
    /// Its current bounding box, in map pixels.
    pub bbox: Rect,
    /// Its current layer.
    pub layer: LayerId,
    /// The camera whose visible rectangle the draw pass was culled
    /// against.
    pub camera: &'a Camera,
}

// ---------------------------------------------------------------------------
// EntityBehavior
// ---------------------------------------------------------------------------

/// Capability trait implemented by concrete entity kinds.
///
/// All methods default to no-ops; an inert marker entity (a destination, a
/// sensor wired elsewhere) implements nothing.
///
/// During [`update`](Self::update) the behavior box is temporarily moved
/// out of its arena slot, which is what makes the `&mut MapEntities`
/// argument sound: the hook may freely add, query, reorder or remove
/// entities, including removing itself. Structural removal is deferred to
/// the end-of-update sweep, so iteration in progress is never invalidated.
pub trait EntityBehavior {
    /// Per-frame update hook. Not called while the map is suspended and
    /// not called on entities already marked for removal.
    fn update(&mut self, _map: &mut MapEntities, _self_id: EntityId) {}

    /// Draw hook, called once per frame while the entity's bounding box
    /// overlaps the camera.
    fn draw(&self, _ctx: &DrawContext<'_>, _canvas: &mut dyn Canvas) {}

    /// Ground this entity currently imposes on the cells under its box, if
    /// any. A raised crystal block reports `Some(Ground::Wall)`.
    fn ground_override(&self) -> Option<Ground> {
        None
    }

    /// Lifecycle notification (see [`MapEvent`]).
    fn notify_event(&mut self, _event: MapEvent) {}

    /// The map's suspended state changed, or the entity was added to an
    /// already-suspended map.
    fn set_suspended(&mut self, _suspended: bool) {}
}

/// A behavior that does nothing. The default for [`EntityInit`], suitable
/// for marker entities like destinations.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertBehavior;

impl EntityBehavior for InertBehavior {}

// ---------------------------------------------------------------------------
// EntityInit
// ---------------------------------------------------------------------------

/// Everything `add_entity` needs to register a new entity.
pub struct EntityInit {
    /// Unique name among live entities, if any.
    pub name: Option<String>,
    pub kind: EntityKind,
    pub layer: LayerId,
    pub bbox: Rect,
    /// `false`: drawn in Z order. `true`: drawn in Y order (bounding-box
    /// bottom edge), with Z as tiebreak.
    pub drawn_in_y_order: bool,
    pub behavior: Box<dyn EntityBehavior>,
}

impl EntityInit {
    pub fn new(kind: EntityKind, layer: LayerId, bbox: Rect) -> Self {
        Self {
            name: None,
            kind,
            layer,
            bbox,
            drawn_in_y_order: false,
            behavior: Box::new(InertBehavior),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn drawn_in_y_order(mut self) -> Self {
        self.drawn_in_y_order = true;
        self
    }

    pub fn with_behavior(mut self, behavior: Box<dyn EntityBehavior>) -> Self {
        self.behavior = behavior;
        self
    }
}

impl fmt::Debug for EntityInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInit")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("layer", &self.layer)
            .field("bbox", &self.bbox)
            .field("drawn_in_y_order", &self.drawn_in_y_order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EntityRecord
// ---------------------------------------------------------------------------

/// Arena slot contents for one live entity.
pub(crate) struct EntityRecord {
    pub(crate) name: Option<String>,
    pub(crate) kind: EntityKind,
    pub(crate) layer: LayerId,
    pub(crate) bbox: Rect,
    pub(crate) drawn_in_y_order: bool,
    /// Set at removal request time; the record stays in every structure
    /// until the sweep.
    pub(crate) marked_for_removal: bool,
    /// `None` only while the behavior's own update hook is running.
    pub(crate) behavior: Option<Box<dyn EntityBehavior>>,
}

impl EntityRecord {
    pub(crate) fn new(init: EntityInit) -> Self {
        Self {
            name: init.name,
            kind: init.kind,
            layer: init.layer,
            bbox: init.bbox,
            drawn_in_y_order: init.drawn_in_y_order,
            marked_for_removal: false,
            behavior: Some(init.behavior),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityArena
// ---------------------------------------------------------------------------

/// Slot vector owning every entity record.
///
/// Freed slots are reused in FIFO order with the generation bumped, making
/// stale ids detectable forever (or until a single slot sees 2^32
/// occupants).
pub(crate) struct EntityArena {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    live: usize,
}

struct Slot {
    generation: u32,
    record: Option<EntityRecord>,
}

impl EntityArena {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            live: 0,
        }
    }

    /// Store a record and return its handle.
    pub(crate) fn insert(&mut self, record: EntityRecord) -> EntityId {
        self.live += 1;
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.record.is_none(), "free list pointed at an occupied slot");
            slot.record = Some(record);
            EntityId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            EntityId::new(index, 0)
        }
    }

    /// Remove a record, bump the slot generation and recycle the slot.
    /// Returns `None` for stale or unknown ids.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.index());
        self.live -= 1;
        Some(record)
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.record.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.record.as_mut()
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Move the behavior box out of its slot so an update hook can receive
    /// `&mut MapEntities`. Must be paired with
    /// [`put_behavior`](Self::put_behavior).
    pub(crate) fn take_behavior(&mut self, id: EntityId) -> Option<Box<dyn EntityBehavior>> {
        self.get_mut(id)?.behavior.take()
    }

    /// Restore a behavior box taken with
    /// [`take_behavior`](Self::take_behavior). If the slot vanished in the
    /// meantime the box is dropped; that cannot happen while removal stays
    /// deferred, since the sweep never runs mid-iteration.
    pub(crate) fn put_behavior(&mut self, id: EntityId, behavior: Box<dyn EntityBehavior>) {
        if let Some(record) = self.get_mut(id) {
            debug_assert!(record.behavior.is_none(), "behavior slot already occupied");
            record.behavior = Some(behavior);
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
