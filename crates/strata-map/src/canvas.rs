//! The renderer seam.
//!
//! The registry decides what to draw and in what order; turning that into
//! pixels belongs to the embedding application. [`Canvas`] is that
//! boundary: `draw()` emits tile draws, cache rebuilds and cache blits
//! through it and nothing else. [`RecordingCanvas`] captures the call
//! sequence verbatim, which is how the draw-order tests assert on exact
//! output and how headless demos run without a renderer.

use crate::entity::LayerId;
use crate::geom::{Point, Rect};
use crate::tile::{PatternId, TileInfo};

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Drawing interface the registry paints through.
pub trait Canvas {
    /// Draw one tile pattern with its top-left corner at `position`, in map
    /// pixels. Entity behaviors may also call this for pattern-based
    /// sprites.
    fn draw_tile(&mut self, pattern: PatternId, position: Point);

    /// (Re)build the cached static-tile surface for `layer` from `tiles`,
    /// given in painting order. Called lazily: once after map start and
    /// once per tileset change, never per frame.
    fn rebuild_layer_cache(&mut self, layer: LayerId, tiles: &[TileInfo]);

    /// Blit the part of `layer`'s cached surface covering `region`.
    fn blit_layer_cache(&mut self, layer: LayerId, region: Rect);
}

// ---------------------------------------------------------------------------
// RecordingCanvas
// ---------------------------------------------------------------------------

/// One recorded [`Canvas`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasOp {
    Tile {
        pattern: PatternId,
        position: Point,
    },
    RebuildLayerCache {
        layer: LayerId,
        tile_count: usize,
    },
    BlitLayerCache {
        layer: LayerId,
        region: Rect,
    },
}

/// A [`Canvas`] that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call recorded so far, oldest first.
    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    /// Drop the recorded calls, typically between frames.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// The recorded calls, leaving the canvas empty.
    pub fn take_ops(&mut self) -> Vec<CanvasOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Canvas for RecordingCanvas {
    fn draw_tile(&mut self, pattern: PatternId, position: Point) {
        self.ops.push(CanvasOp::Tile { pattern, position });
    }

    fn rebuild_layer_cache(&mut self, layer: LayerId, tiles: &[TileInfo]) {
        self.ops.push(CanvasOp::RebuildLayerCache {
            layer,
            tile_count: tiles.len(),
        });
    }

    fn blit_layer_cache(&mut self, layer: LayerId, region: Rect) {
        self.ops.push(CanvasOp::BlitLayerCache { layer, region });
    }
}
