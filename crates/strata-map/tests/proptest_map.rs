//! Property tests for the entity registry.
//!
//! These tests use `proptest` to generate random sequences of registry
//! operations and verify that the bookkeeping invariants hold after each
//! one: id liveness matches a shadow model, spatial queries agree with a
//! linear scan, Z values stay unique per layer, and names resolve exactly
//! while their owner is live.

use std::collections::BTreeMap;

use proptest::prelude::*;
use strata_map::prelude::*;

const LAYERS: u8 = 3;

fn test_map() -> MapEntities {
    let size = Size::new(320, 240);
    MapEntities::new(size, LAYERS, Camera::new(size, size))
}

/// Operations we can perform on the registry.
#[derive(Debug, Clone)]
enum MapOp {
    Add {
        layer: u8,
        kind_sel: usize,
        bbox: (i32, i32, i32, i32),
        named: bool,
        y_order: bool,
    },
    Remove(usize),
    RemoveByName(usize),
    BringToFront(usize),
    BringToBack(usize),
    SetLayer(usize, u8),
    ToggleYOrder(usize),
    MoveBox(usize, (i32, i32)),
    Sweep,
    Query((i32, i32, i32, i32)),
}

const KINDS: [EntityKind; 3] = [EntityKind::Npc, EntityKind::Custom, EntityKind::Block];

/// Boxes may hang over the map edge and may have zero extents.
fn bbox_strategy() -> impl Strategy<Value = (i32, i32, i32, i32)> {
    (-96..400i32, -96..300i32, 0..48i32, 0..48i32)
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        (
            0..LAYERS,
            0..KINDS.len(),
            bbox_strategy(),
            any::<bool>(),
            any::<bool>()
        )
            .prop_map(|(layer, kind_sel, bbox, named, y_order)| MapOp::Add {
                layer,
                kind_sel,
                bbox,
                named,
                y_order,
            }),
        (0..60usize).prop_map(MapOp::Remove),
        (0..60usize).prop_map(MapOp::RemoveByName),
        (0..60usize).prop_map(MapOp::BringToFront),
        (0..60usize).prop_map(MapOp::BringToBack),
        (0..60usize, 0..LAYERS).prop_map(|(idx, layer)| MapOp::SetLayer(idx, layer)),
        (0..60usize).prop_map(MapOp::ToggleYOrder),
        (0..60usize, (-96..400i32, -96..300i32)).prop_map(|(idx, pos)| MapOp::MoveBox(idx, pos)),
        Just(MapOp::Sweep),
        bbox_strategy().prop_map(MapOp::Query),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn random_op_sequences_preserve_registry_invariants(
        ops in prop::collection::vec(map_op_strategy(), 1..50)
    ) {
        let mut map = test_map();
        map.notify_map_started();

        // Shadow model: ids we believe are live, and ids marked but not
        // yet swept.
        let mut alive: Vec<EntityId> = Vec::new();
        let mut marked: Vec<EntityId> = Vec::new();
        let mut next_name = 0u32;

        for op in ops {
            match op {
                MapOp::Add { layer, kind_sel, bbox, named, y_order } => {
                    let (x, y, w, h) = bbox;
                    let mut init =
                        EntityInit::new(KINDS[kind_sel], LayerId(layer), Rect::new(x, y, w, h));
                    if named {
                        init = init.named(format!("e{next_name}"));
                        next_name += 1;
                    }
                    if y_order {
                        init = init.drawn_in_y_order();
                    }
                    alive.push(map.add_entity(init).unwrap());
                }
                MapOp::Remove(idx) => {
                    if !alive.is_empty() {
                        let id = alive.remove(idx % alive.len());
                        map.remove_entity(id).unwrap();
                        marked.push(id);
                    }
                }
                MapOp::RemoveByName(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let id = alive[idx];
                        if let Some(name) = map.entity_name(id).map(str::to_owned) {
                            map.remove_entity_named(&name);
                            alive.remove(idx);
                            marked.push(id);
                        }
                    }
                }
                MapOp::BringToFront(idx) => {
                    if !alive.is_empty() {
                        let id = alive[idx % alive.len()];
                        map.bring_to_front(id).unwrap();
                        let layer = map.entity_layer(id);
                        let top = map.z_order(id).unwrap();
                        for &other in alive.iter().chain(marked.iter()) {
                            if other != id && map.entity_layer(other) == layer {
                                prop_assert!(map.z_order(other).unwrap() < top);
                            }
                        }
                    }
                }
                MapOp::BringToBack(idx) => {
                    if !alive.is_empty() {
                        let id = alive[idx % alive.len()];
                        map.bring_to_back(id).unwrap();
                        let layer = map.entity_layer(id);
                        let bottom = map.z_order(id).unwrap();
                        for &other in alive.iter().chain(marked.iter()) {
                            if other != id && map.entity_layer(other) == layer {
                                prop_assert!(map.z_order(other).unwrap() > bottom);
                            }
                        }
                    }
                }
                MapOp::SetLayer(idx, layer) => {
                    if !alive.is_empty() {
                        let id = alive[idx % alive.len()];
                        map.set_entity_layer(id, LayerId(layer)).unwrap();
                        prop_assert_eq!(map.entity_layer(id), Some(LayerId(layer)));
                    }
                }
                MapOp::ToggleYOrder(idx) => {
                    if !alive.is_empty() {
                        let id = alive[idx % alive.len()];
                        let before = map.is_drawn_in_y_order(id);
                        let z = map.z_order(id);
                        map.set_entity_drawn_in_y_order(id, !before).unwrap();
                        prop_assert_eq!(map.is_drawn_in_y_order(id), !before);
                        prop_assert_eq!(map.z_order(id), z);
                    }
                }
                MapOp::MoveBox(idx, (x, y)) => {
                    if !alive.is_empty() {
                        let id = alive[idx % alive.len()];
                        let size = map.entity_bbox(id).unwrap().size();
                        let bbox = Rect::new(x, y, size.width, size.height);
                        map.notify_entity_bounding_box_changed(id, bbox).unwrap();
                        prop_assert_eq!(map.entity_bbox(id), Some(bbox));
                    }
                }
                MapOp::Sweep => {
                    map.update();
                    for id in marked.drain(..) {
                        prop_assert!(!map.contains(id));
                    }
                }
                MapOp::Query((x, y, w, h)) => {
                    let rect = Rect::new(x, y, w, h);
                    let mut hits = map.get_entities_in_rectangle(rect);
                    hits.sort_unstable();
                    let mut expected: Vec<EntityId> = alive
                        .iter()
                        .chain(marked.iter())
                        .copied()
                        .filter(|&id| map.entity_bbox(id).unwrap().overlaps(&rect))
                        .collect();
                    expected.sort_unstable();
                    prop_assert_eq!(hits, expected);

                    // The sorted variant returns the same ids, ordered by
                    // (layer, draw list, Z or bottom edge) exactly as a
                    // draw pass would paint them.
                    let sorted = map.get_entities_in_rectangle_sorted(rect);
                    let keys: Vec<(u8, u8, i64, i64)> = sorted
                        .iter()
                        .map(|&id| {
                            let layer = map.entity_layer(id).unwrap().0;
                            if map.is_drawn_in_y_order(id) {
                                let bottom = i64::from(map.entity_bbox(id).unwrap().bottom());
                                (layer, 1, bottom, map.z_order(id).unwrap())
                            } else {
                                (layer, 0, map.z_order(id).unwrap(), 0)
                            }
                        })
                        .collect();
                    prop_assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
                }
            }

            // Bookkeeping invariants after every op.
            prop_assert_eq!(map.entity_count(), alive.len() + marked.len());
            for &id in &alive {
                prop_assert!(map.contains(id));
                prop_assert!(!map.is_marked_for_removal(id));
                if let Some(name) = map.entity_name(id) {
                    prop_assert_eq!(map.find_entity(name), Some(id));
                }
            }
            for &id in &marked {
                prop_assert!(map.contains(id));
                prop_assert!(map.is_marked_for_removal(id));
                if let Some(name) = map.entity_name(id) {
                    prop_assert_eq!(map.find_entity(name), None);
                }
            }

            // Z values stay unique per layer, marked entities included.
            for layer in 0..LAYERS {
                let mut zs: Vec<i64> = alive
                    .iter()
                    .chain(marked.iter())
                    .filter(|&&id| map.entity_layer(id) == Some(LayerId(layer)))
                    .map(|&id| map.z_order(id).unwrap())
                    .collect();
                zs.sort_unstable();
                let len = zs.len();
                zs.dedup();
                prop_assert_eq!(zs.len(), len);
            }
        }
    }

    /// After a sweep recycles arena slots, old handles must stay dead no
    /// matter how many new entities reuse their indices.
    #[test]
    fn stale_handles_stay_stale_after_slot_recycling(
        spawn_count in 1..20usize,
        remove_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut map = test_map();
        map.notify_map_started();

        let mut entities: Vec<EntityId> = Vec::new();
        for i in 0..spawn_count {
            entities.push(
                map.add_entity(EntityInit::new(
                    EntityKind::Npc,
                    LayerId(0),
                    Rect::new(i as i32 * 8, 0, 8, 8),
                ))
                .unwrap(),
            );
        }

        let mut stale: Vec<EntityId> = Vec::new();
        for &idx in &remove_indices {
            if !entities.is_empty() {
                let id = entities.remove(idx % entities.len());
                map.remove_entity(id).unwrap();
                stale.push(id);
            }
        }
        map.update();

        for _ in 0..stale.len() {
            entities.push(
                map.add_entity(EntityInit::new(
                    EntityKind::Npc,
                    LayerId(0),
                    Rect::new(0, 0, 8, 8),
                ))
                .unwrap(),
            );
        }

        for &id in &stale {
            prop_assert!(!map.contains(id));
            prop_assert_eq!(map.entity_bbox(id), None);
            prop_assert_eq!(map.z_order(id), None);
            prop_assert!(map.remove_entity(id).is_err());
        }
        for &id in &entities {
            prop_assert!(map.contains(id));
        }
    }

    /// The range scan behind the prefix queries must agree with a plain
    /// linear filter over every name.
    #[test]
    fn prefix_queries_agree_with_a_linear_scan(
        names in prop::collection::btree_set("[ab]{0,4}", 1..16),
        prefix in "[ab]{0,3}",
    ) {
        let mut map = test_map();
        let mut by_name: BTreeMap<String, EntityId> = BTreeMap::new();
        for name in names {
            let id = map
                .add_entity(
                    EntityInit::new(EntityKind::Custom, LayerId(0), Rect::new(0, 0, 8, 8))
                        .named(name.clone()),
                )
                .unwrap();
            by_name.insert(name, id);
        }

        let expected: Vec<EntityId> = by_name
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, &id)| id)
            .collect();
        prop_assert_eq!(map.get_entities_with_prefix(&prefix), expected.clone());
        prop_assert_eq!(map.has_entity_with_prefix(&prefix), !expected.is_empty());
    }

    /// The precomputed ground grid must report, for any pixel, the ground
    /// of the last tile whose cell coverage includes that pixel's cell.
    #[test]
    fn tile_ground_is_last_writer_per_cell(
        tiles in prop::collection::vec(
            ((0..312i32, 0..232i32, 1..40i32, 1..40i32), 0..4usize),
            1..25,
        ),
        probes in prop::collection::vec((0..320i32, 0..240i32), 1..20),
    ) {
        const GROUNDS: [Ground; 4] = [
            Ground::Traversable,
            Ground::Wall,
            Ground::DeepWater,
            Ground::Grass,
        ];

        let mut map = test_map();
        let mut placed: Vec<(Rect, Ground)> = Vec::new();
        for ((x, y, w, h), ground_sel) in tiles {
            let bbox = Rect::new(x, y, w.min(320 - x), h.min(240 - y));
            let ground = GROUNDS[ground_sel];
            map.add_tile(TileInfo {
                pattern: PatternId(0),
                ground,
                layer: LayerId(0),
                bbox,
                animated: false,
            });
            placed.push((bbox, ground));
        }
        map.notify_map_started();

        for (px, py) in probes {
            let mut expected = Ground::Empty;
            for &(bbox, ground) in &placed {
                let covers_x = (bbox.x >> 3..=(bbox.right() - 1) >> 3).contains(&(px >> 3));
                let covers_y = (bbox.y >> 3..=(bbox.bottom() - 1) >> 3).contains(&(py >> 3));
                if covers_x && covers_y {
                    expected = ground;
                }
            }
            prop_assert_eq!(map.get_tile_ground(LayerId(0), px, py), expected);
        }
    }
}
