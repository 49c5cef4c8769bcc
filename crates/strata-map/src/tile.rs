//! Static tile data.
//!
//! Tiles are plain records, not entities: they vastly outnumber dynamic
//! entities and never move, so they take a separate path through the
//! registry (ground grid + region optimizer) and never touch the arena or
//! the spatial index.

use serde::{Deserialize, Serialize};

use crate::entity::LayerId;
use crate::geom::{Point, Rect};
use crate::ground::Ground;

// ---------------------------------------------------------------------------
// PatternId
// ---------------------------------------------------------------------------

/// Identifier of a tile pattern in the active tileset. Opaque to the
/// registry; the renderer resolves it to pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PatternId(pub u32);

// ---------------------------------------------------------------------------
// TileInfo
// ---------------------------------------------------------------------------

/// One static tile as produced by the map loader.
///
/// Tile boxes are normally 8-aligned with positive extents; the ground grid
/// tolerates unaligned boxes by writing every overlapped cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInfo {
    pub pattern: PatternId,
    pub ground: Ground,
    pub layer: LayerId,
    pub bbox: Rect,
    /// Whether the pattern animates. Animated tiles (and static tiles
    /// overlapping them) are redrawn every frame instead of being baked
    /// into the layer cache.
    pub animated: bool,
}

impl TileInfo {
    /// Top-left corner, where the renderer places the pattern.
    pub fn position(&self) -> Point {
        self.bbox.top_left()
    }
}
