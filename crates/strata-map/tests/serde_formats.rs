//! Wire-format tests for the serializable map types.
//!
//! Map dumps and save states are read by external tooling, so the JSON
//! shape is a contract: field names, enum spellings and the raw-`u64` id
//! encoding must not drift.

use serde_json::json;
use strata_map::prelude::*;

#[test]
fn tile_info_wire_format() {
    let tile = TileInfo {
        pattern: PatternId(42),
        ground: Ground::ShallowWater,
        layer: LayerId(1),
        bbox: Rect::new(16, 24, 8, 8),
        animated: true,
    };

    assert_eq!(
        serde_json::to_value(&tile).unwrap(),
        json!({
            "pattern": 42,
            "ground": "ShallowWater",
            "layer": 1,
            "bbox": { "x": 16, "y": 24, "width": 8, "height": 8 },
            "animated": true,
        })
    );
}

#[test]
fn camera_state_wire_format() {
    let mut camera = Camera::new(Size::new(320, 240), Size::new(1280, 960));
    camera.set_top_left(Point::new(100, 50));
    camera.track(Some(EntityId::new(3, 1)));

    assert_eq!(
        serde_json::to_value(&camera).unwrap(),
        json!({
            "viewport": { "width": 320, "height": 240 },
            "map_size": { "width": 1280, "height": 960 },
            "top_left": { "x": 100, "y": 50 },
            // Generation 1, index 3, packed into one u64.
            "tracked": 4_294_967_299u64,
        })
    );
}

#[test]
fn camera_state_restores() {
    let mut camera = Camera::new(Size::new(320, 240), Size::new(1280, 960));
    camera.set_top_left(Point::new(100, 50));
    camera.track(Some(EntityId::new(7, 2)));

    let json = serde_json::to_string(&camera).unwrap();
    let restored: Camera = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.top_left(), Point::new(100, 50));
    assert_eq!(restored.tracked(), Some(EntityId::new(7, 2)));
    assert_eq!(restored.visible_rect(), Rect::new(100, 50, 320, 240));
}
