//! Ground classification and the per-layer dense ground grid.
//!
//! # Design
//!
//! Collision code asks "what terrain is at pixel (x, y) on this layer?"
//! thousands of times per frame. Tiles never move after load, so the
//! answer is precomputed: every 8×8 pixel cell of every layer carries one
//! [`Ground`] value, written while the loader adds tiles. Later tiles
//! overwrite earlier ones cell by cell, which is exactly the painter's
//! order tiles are drawn in, so the grid always reports the ground of the
//! visually topmost tile.
//!
//! [`GroundGrid::get`] performs no validation. The index arithmetic is
//! `(y >> 3) * width8 + (x >> 3)` on trusted coordinates; out-of-range
//! input panics on the slice index (or, for wildly invalid input, reads
//! the wrong cell). The grid sits on the hottest collision path and its
//! callers bounds-check coordinates before asking.

use serde::{Deserialize, Serialize};

use crate::entity::LayerId;
use crate::geom::Size;
use crate::tile::TileInfo;

// ---------------------------------------------------------------------------
// Ground
// ---------------------------------------------------------------------------

/// Terrain classification of one 8×8 map cell.
///
/// `Empty` means no tile covers the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ground {
    #[default]
    Empty,
    Traversable,
    Wall,
    LowWall,
    DeepWater,
    ShallowWater,
    Grass,
    Hole,
    Ice,
    Ladder,
    Prickles,
    Lava,
}

impl Ground {
    /// Every ground, in declaration order. Drives the name table scans.
    pub const ALL: &'static [Ground] = &[
        Ground::Empty,
        Ground::Traversable,
        Ground::Wall,
        Ground::LowWall,
        Ground::DeepWater,
        Ground::ShallowWater,
        Ground::Grass,
        Ground::Hole,
        Ground::Ice,
        Ground::Ladder,
        Ground::Prickles,
        Ground::Lava,
    ];

    /// The loader-facing name of this ground.
    pub fn name(self) -> &'static str {
        match self {
            Ground::Empty => "empty",
            Ground::Traversable => "traversable",
            Ground::Wall => "wall",
            Ground::LowWall => "low_wall",
            Ground::DeepWater => "deep_water",
            Ground::ShallowWater => "shallow_water",
            Ground::Grass => "grass",
            Ground::Hole => "hole",
            Ground::Ice => "ice",
            Ground::Ladder => "ladder",
            Ground::Prickles => "prickles",
            Ground::Lava => "lava",
        }
    }

    /// Reverse lookup over the closed set. Linear scan; the table is tiny.
    pub fn by_name(name: &str) -> Option<Ground> {
        Self::ALL.iter().copied().find(|ground| ground.name() == name)
    }

    /// Whether this ground blocks ordinary walking entities.
    pub fn is_obstacle(self) -> bool {
        matches!(self, Ground::Wall | Ground::LowWall)
    }
}

// ---------------------------------------------------------------------------
// GroundGrid
// ---------------------------------------------------------------------------

/// Per-layer dense array of [`Ground`] cells, one per 8×8 pixel block.
pub struct GroundGrid {
    /// Cells per row. Also the row stride of every layer's cell vector.
    width8: i32,
    height8: i32,
    /// One dense cell vector per layer, row-major.
    layers: Vec<Vec<Ground>>,
}

impl GroundGrid {
    /// Create a grid for a map of `size` pixels and `num_layers` layers,
    /// every cell `Ground::Empty`. Maps whose size is not a multiple of 8
    /// get a partial trailing cell row/column.
    pub fn new(size: Size, num_layers: u8) -> Self {
        let width8 = (size.width + 7) >> 3;
        let height8 = (size.height + 7) >> 3;
        let cells = (width8 as usize) * (height8 as usize);
        Self {
            width8,
            height8,
            layers: (0..num_layers).map(|_| vec![Ground::Empty; cells]).collect(),
        }
    }

    pub fn width8(&self) -> i32 {
        self.width8
    }

    pub fn height8(&self) -> i32 {
        self.height8
    }

    /// Ground of the cell containing pixel `(x, y)` on `layer`.
    ///
    /// # Panics
    ///
    /// No explicit validation is performed; an out-of-range layer or
    /// coordinate panics on the slice index. Callers guarantee validity.
    pub fn get(&self, layer: LayerId, x: i32, y: i32) -> Ground {
        let index = (y >> 3) * self.width8 + (x >> 3);
        self.layers[layer.0 as usize][index as usize]
    }

    /// Overwrite every cell the tile's bounding box overlaps with the
    /// tile's ground. Callers add tiles in insertion order, so the last
    /// writer wins, matching the order tiles are painted.
    pub(crate) fn add_tile(&mut self, tile: &TileInfo) {
        let cells = &mut self.layers[tile.layer.0 as usize];
        let x0 = tile.bbox.x >> 3;
        let y0 = tile.bbox.y >> 3;
        let x1 = (tile.bbox.right() - 1) >> 3;
        let y1 = (tile.bbox.bottom() - 1) >> 3;
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                cells[(cy * self.width8 + cx) as usize] = tile.ground;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
