//! Strata Map -- layered entity registry and spatial index for tile-based
//! maps.
//!
//! This crate provides the per-map world state behind a 2D game loop. A
//! [`map::MapEntities`] owns every entity on one map: static tiles are
//! flattened into a ground grid and per-layer render caches at load time,
//! while dynamic entities get generational ids, a loose quadtree for
//! rectangle queries, per-layer Z stacking and two draw orders (explicit Z
//! or Y-sorted). Removal is deferred to a per-frame sweep so update hooks
//! can remove any entity, themselves included, while iteration is in
//! flight.
//!
//! # Quick Start
//!
//! ```
//! use strata_map::prelude::*;
//!
//! let size = Size::new(320, 240);
//! let mut map = MapEntities::new(size, 2, Camera::new(Size::new(160, 120), size));
//!
//! let guard = map.add_entity(
//!     EntityInit::new(EntityKind::Npc, LayerId(0), Rect::new(24, 40, 16, 16)).named("guard"),
//! )?;
//! map.notify_map_started();
//!
//! assert_eq!(map.find_entity("guard"), Some(guard));
//! assert!(map.get_entities_in_rectangle(Rect::new(0, 0, 64, 64)).contains(&guard));
//! map.update();
//! # Ok::<(), MapError>(())
//! ```

#![deny(unsafe_code)]

pub mod camera;
pub mod canvas;
pub mod entity;
pub mod geom;
pub mod ground;
pub mod map;
mod quadtree;
mod regions;
pub mod tile;
mod zorder;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registry operations.
///
/// Only conditions that normal game data can trigger are errors; malformed
/// calls (out-of-range layers, tiles added after the map started) are
/// contract violations and panic instead.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The name is already held by a live entity. Names free up at the
    /// removal sweep, not at the removal request.
    #[error("an entity named '{name}' already exists")]
    DuplicateEntityName { name: String },

    /// No live entity holds this name.
    #[error("no entity named '{name}'")]
    NoSuchEntity { name: String },

    /// The handle's slot was recycled or never allocated.
    #[error("entity {id} is stale (removed or never added)")]
    StaleEntity { id: entity::EntityId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::camera::Camera;
    pub use crate::canvas::{Canvas, CanvasOp, RecordingCanvas};
    pub use crate::entity::{
        DrawContext, EntityBehavior, EntityId, EntityInit, EntityKind, InertBehavior, LayerId,
        MapEvent,
    };
    pub use crate::geom::{Point, Rect, Size};
    pub use crate::ground::Ground;
    pub use crate::map::MapEntities;
    pub use crate::tile::{PatternId, TileInfo};
    pub use crate::MapError;
}
