//! Integer pixel geometry shared by every map structure.
//!
//! Coordinates are pixels with the origin at the map's top-left corner and
//! y growing downward. Rectangles are half-open: a rectangle covers
//! `[x, x + width) × [y, y + height)`, so two rectangles that merely touch
//! along an edge do not overlap.
//!
//! Widths and heights are `i32` like coordinates (never negative) so that
//! edge arithmetic needs no casts.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A pixel position on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Pixel dimensions of a map, viewport or cached surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An axis-aligned rectangle in map pixels.
///
/// A rectangle with zero width or height is a valid degenerate box (a point
/// or a segment). For overlap tests only, zero extents are promoted to one
/// pixel, so a degenerate box is still found by any query rectangle that
/// strictly contains its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The exclusive right edge.
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// The exclusive bottom edge. Y-order drawing compares this value: it is
    /// where a character's feet meet the floor.
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Half-open point containment.
    pub const fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Half-open overlap test with zero extents promoted to one pixel on
    /// both sides.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let self_right = self.x + self.width.max(1);
        let self_bottom = self.y + self.height.max(1);
        let other_right = other.x + other.width.max(1);
        let other_bottom = other.y + other.height.max(1);
        self.x < other_right
            && other.x < self_right
            && self.y < other_bottom
            && other.y < self_bottom
    }

    /// Whether `other` (with zero extents promoted to one pixel) lies fully
    /// inside `self`. `self` keeps its true extent; it is a region, not a
    /// degenerate box. Used for spatial index placement, which must agree
    /// with [`overlaps`](Self::overlaps) about where a degenerate box lives.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        let other_right = other.x + other.width.max(1);
        let other_bottom = other.y + other.height.max(1);
        other.x >= self.x
            && other_right <= self.right()
            && other.y >= self.y
            && other_bottom <= self.bottom()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
