//! Static-tile batching for one layer.
//!
//! A map layer holds thousands of tiles that never change after the map
//! starts. Repainting them individually every frame would dwarf the cost
//! of everything else, so at map start each layer's tiles are partitioned
//! once: tiles that never animate are baked into a cached surface the
//! renderer rebuilds only when the tileset changes, while animated tiles,
//! and any static tile sharing an 8-pixel cell with one, are handed back
//! to the caller to be painted individually every frame. A static tile
//! over an animated one must repaint with it or the cache would show
//! through.

use tracing::debug;

use crate::canvas::Canvas;
use crate::entity::LayerId;
use crate::geom::{Rect, Size};
use crate::tile::TileInfo;

/// The baked-tile store and cache state for one layer.
pub(crate) struct NonAnimatedRegions {
    layer: LayerId,
    width8: i32,
    height8: i32,
    /// Tiles accumulated before the map starts, in painting order.
    tiles: Vec<TileInfo>,
    /// The static partition, in painting order, fixed at build time.
    baked: Vec<TileInfo>,
    built: bool,
    cache_valid: bool,
}

impl NonAnimatedRegions {
    pub(crate) fn new(layer: LayerId, size: Size) -> Self {
        Self {
            layer,
            width8: (size.width + 7) >> 3,
            height8: (size.height + 7) >> 3,
            tiles: Vec::new(),
            baked: Vec::new(),
            built: false,
            cache_valid: false,
        }
    }

    pub(crate) fn add_tile(&mut self, tile: TileInfo) {
        debug_assert!(!self.built, "tile added after the map started");
        self.tiles.push(tile);
    }

    /// Partition the accumulated tiles. Baked tiles stay here; the
    /// returned tiles must be painted individually every frame.
    pub(crate) fn build(&mut self) -> Vec<TileInfo> {
        debug_assert!(!self.built, "regions already built");
        self.built = true;
        self.cache_valid = false;

        // Mark every 8-pixel cell an animated tile touches.
        let cells = (self.width8 as usize) * (self.height8 as usize);
        let mut animated_cells = vec![false; cells];
        for tile in self.tiles.iter().filter(|tile| tile.animated) {
            if let Some((x0, y0, x1, y1)) = self.cell_range(&tile.bbox) {
                for cy in y0..=y1 {
                    for cx in x0..=x1 {
                        animated_cells[(cy * self.width8 + cx) as usize] = true;
                    }
                }
            }
        }

        let mut per_frame = Vec::new();
        for tile in std::mem::take(&mut self.tiles) {
            if tile.animated || self.touches_marked_cell(&animated_cells, &tile.bbox) {
                per_frame.push(tile);
            } else {
                self.baked.push(tile);
            }
        }
        debug!(
            layer = %self.layer,
            baked = self.baked.len(),
            per_frame = per_frame.len(),
            "partitioned static tiles"
        );
        per_frame
    }

    /// Paint the baked partition: rebuild the cached surface if it went
    /// stale, then blit the visible part of it.
    pub(crate) fn draw(&mut self, canvas: &mut dyn Canvas, visible: Rect) {
        debug_assert!(self.built, "regions drawn before the map started");
        if !self.cache_valid {
            canvas.rebuild_layer_cache(self.layer, &self.baked);
            self.cache_valid = true;
            debug!(layer = %self.layer, tiles = self.baked.len(), "layer cache rebuilt");
        }
        canvas.blit_layer_cache(self.layer, visible);
    }

    /// The tileset changed; the next draw rebuilds the cached surface.
    pub(crate) fn invalidate_cache(&mut self) {
        self.cache_valid = false;
    }

    /// Grid cells overlapped by `bbox`, clamped to the grid, inclusive.
    fn cell_range(&self, bbox: &Rect) -> Option<(i32, i32, i32, i32)> {
        let x0 = (bbox.x >> 3).max(0);
        let y0 = (bbox.y >> 3).max(0);
        let x1 = ((bbox.right() - 1) >> 3).min(self.width8 - 1);
        let y1 = ((bbox.bottom() - 1) >> 3).min(self.height8 - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    fn touches_marked_cell(&self, animated_cells: &[bool], bbox: &Rect) -> bool {
        match self.cell_range(bbox) {
            Some((x0, y0, x1, y1)) => (y0..=y1).any(|cy| {
                (x0..=x1).any(|cx| animated_cells[(cy * self.width8 + cx) as usize])
            }),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
