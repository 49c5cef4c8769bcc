//! Registry hot-path benchmarks.
//!
//! The registry backs a 60 FPS frame loop, so the full budget for one
//! frame is 16.67ms and three costs have to stay flat as maps grow:
//! rectangle queries issued by collision code, `update()` bookkeeping
//! (including the removal sweep), and `draw()` culling. Entity placement
//! is seeded so runs are comparable across machines and commits.
//!
//! Run with: `cargo bench --bench map_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use strata_map::prelude::*;

const MAP_SIZE: Size = Size {
    width: 2560,
    height: 1920,
};
const LAYERS: u8 = 3;

// ---------------------------------------------------------------------------
// Workload helpers
// ---------------------------------------------------------------------------

/// Draws one pattern per frame; enough to make `draw()` touch every
/// visible entity's behavior.
struct Patch(PatternId);

impl EntityBehavior for Patch {
    fn draw(&self, ctx: &DrawContext<'_>, canvas: &mut dyn Canvas) {
        canvas.draw_tile(self.0, ctx.bbox.top_left());
    }
}

/// Steps one pixel east each frame, wrapping at the map edge. Exercises
/// the quadtree re-placement path the way walking NPCs do.
struct Drift;

impl EntityBehavior for Drift {
    fn update(&mut self, map: &mut MapEntities, self_id: EntityId) {
        if let Some(bbox) = map.entity_bbox(self_id) {
            let x = if bbox.x + bbox.width + 1 < map.size().width {
                bbox.x + 1
            } else {
                0
            };
            let moved = Rect::new(x, bbox.y, bbox.width, bbox.height);
            let _ = map.notify_entity_bounding_box_changed(self_id, moved);
        }
    }
}

/// A map with `entity_count` 16x16 entities scattered uniformly across
/// all layers, every fourth one Y-ordered.
fn scattered_map(entity_count: usize, rng: &mut Pcg64Mcg) -> (MapEntities, Vec<EntityId>) {
    let camera = Camera::new(Size::new(320, 240), MAP_SIZE);
    let mut map = MapEntities::new(MAP_SIZE, LAYERS, camera);
    let mut ids = Vec::with_capacity(entity_count);
    for i in 0..entity_count {
        let layer = (i % LAYERS as usize) as u8;
        let bbox = Rect::new(
            rng.gen_range(0..MAP_SIZE.width - 16),
            rng.gen_range(0..MAP_SIZE.height - 16),
            16,
            16,
        );
        let mut init = EntityInit::new(EntityKind::Npc, LayerId(layer), bbox)
            .with_behavior(Box::new(Patch(PatternId(i as u32))));
        if i % 4 == 0 {
            init = init.drawn_in_y_order();
        }
        ids.push(map.add_entity(init).unwrap());
    }
    map.notify_map_started();
    (map, ids)
}

// ---------------------------------------------------------------------------
// Benchmark 1: rectangle queries as the entity count scales
// ---------------------------------------------------------------------------

fn bench_rectangle_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("rectangle_query");
    for &entity_count in &[100usize, 1_000, 5_000] {
        let mut rng = Pcg64Mcg::seed_from_u64(0x51DE);
        let (map, _ids) = scattered_map(entity_count, &mut rng);
        let rects: Vec<Rect> = (0..64)
            .map(|_| {
                Rect::new(
                    rng.gen_range(0..MAP_SIZE.width - 320),
                    rng.gen_range(0..MAP_SIZE.height - 240),
                    320,
                    240,
                )
            })
            .collect();
        group.bench_function(BenchmarkId::from_parameter(entity_count), |b| {
            let mut cursor = 0;
            b.iter(|| {
                cursor = (cursor + 1) % rects.len();
                black_box(map.get_entities_in_rectangle(rects[cursor]));
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 2: a full update pass with every entity moving
// ---------------------------------------------------------------------------

fn bench_update_with_moving_entities(c: &mut Criterion) {
    let mut rng = Pcg64Mcg::seed_from_u64(0xD41F7);
    let camera = Camera::new(Size::new(320, 240), MAP_SIZE);
    let mut map = MapEntities::new(MAP_SIZE, LAYERS, camera);
    for i in 0..1_000usize {
        let layer = (i % LAYERS as usize) as u8;
        let bbox = Rect::new(
            rng.gen_range(0..MAP_SIZE.width - 16),
            rng.gen_range(0..MAP_SIZE.height - 16),
            16,
            16,
        );
        map.add_entity(
            EntityInit::new(EntityKind::Npc, LayerId(layer), bbox).with_behavior(Box::new(Drift)),
        )
        .unwrap();
    }
    map.notify_map_started();

    c.bench_function("update_1k_moving_entities", |b| {
        b.iter(|| map.update());
    });
}

// ---------------------------------------------------------------------------
// Benchmark 3: draw with camera culling
// ---------------------------------------------------------------------------

fn bench_draw_culled(c: &mut Criterion) {
    let mut rng = Pcg64Mcg::seed_from_u64(0xD3A0);
    let (mut map, _ids) = scattered_map(2_000, &mut rng);
    let mut canvas = RecordingCanvas::new();

    c.bench_function("draw_2k_entities_320x240_viewport", |b| {
        b.iter(|| {
            canvas.clear();
            map.draw(&mut canvas);
            black_box(canvas.ops().len());
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 4: per-frame spawn/despawn churn
// ---------------------------------------------------------------------------

fn bench_spawn_despawn_churn(c: &mut Criterion) {
    let camera = Camera::new(Size::new(320, 240), MAP_SIZE);
    let mut map = MapEntities::new(MAP_SIZE, LAYERS, camera);
    map.notify_map_started();

    c.bench_function("spawn_despawn_64_per_frame", |b| {
        b.iter(|| {
            let mut ids = Vec::with_capacity(64);
            for i in 0..64 {
                ids.push(
                    map.add_entity(EntityInit::new(
                        EntityKind::Custom,
                        LayerId(0),
                        Rect::new(i * 8, 0, 8, 8),
                    ))
                    .unwrap(),
                );
            }
            for id in ids {
                map.remove_entity(id).unwrap();
            }
            map.update();
            black_box(map.entity_count());
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 5: restacking against a deep layer
// ---------------------------------------------------------------------------

fn bench_restacking(c: &mut Criterion) {
    let mut rng = Pcg64Mcg::seed_from_u64(0x57AC);
    let (mut map, ids) = scattered_map(1_000, &mut rng);

    c.bench_function("bring_to_front_1k_stack", |b| {
        let mut cursor = 0;
        b.iter(|| {
            cursor = (cursor + 1) % ids.len();
            map.bring_to_front(ids[cursor]).unwrap();
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_rectangle_queries,
    bench_update_with_moving_entities,
    bench_draw_culled,
    bench_spawn_despawn_churn,
    bench_restacking,
);
criterion_main!(benches);
