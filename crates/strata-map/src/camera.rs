//! The visible window onto the map.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::geom::{Point, Rect, Size};

/// A viewport-sized window clamped inside the map bounds.
///
/// The camera can optionally track an entity; the registry re-centers it
/// on the tracked entity's bounding box at the end of every update. Maps
/// smaller than the viewport pin the camera to the origin on the short
/// axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    viewport: Size,
    map_size: Size,
    top_left: Point,
    tracked: Option<EntityId>,
}

impl Camera {
    pub fn new(viewport: Size, map_size: Size) -> Self {
        Self {
            viewport,
            map_size,
            top_left: Point::new(0, 0),
            tracked: None,
        }
    }

    /// The rectangle of the map currently on screen.
    pub fn visible_rect(&self) -> Rect {
        Rect::new(
            self.top_left.x,
            self.top_left.y,
            self.viewport.width,
            self.viewport.height,
        )
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Move the camera, clamping it inside the map.
    pub fn set_top_left(&mut self, p: Point) {
        let max_x = (self.map_size.width - self.viewport.width).max(0);
        let max_y = (self.map_size.height - self.viewport.height).max(0);
        self.top_left = Point::new(p.x.clamp(0, max_x), p.y.clamp(0, max_y));
    }

    /// Center the viewport on a map point, clamping at the edges.
    pub fn center_on(&mut self, p: Point) {
        self.set_top_left(Point::new(
            p.x - self.viewport.width / 2,
            p.y - self.viewport.height / 2,
        ));
    }

    /// Follow an entity (`None` to stop following). Tracking survives the
    /// entity's removal only until the next update, which drops it.
    pub fn track(&mut self, entity: Option<EntityId>) {
        self.tracked = entity;
    }

    pub fn tracked(&self) -> Option<EntityId> {
        self.tracked
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
