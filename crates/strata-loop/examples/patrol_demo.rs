//! Headless patrol demo -- guards pace a courtyard while the camera tracks
//! the hero.
//!
//! Run with:
//!   cargo run --example patrol_demo -p strata-loop
//!
//! There is no window: frames land on a recording canvas and the demo
//! prints a summary of what happened. Set `RUST_LOG=debug` to watch the
//! registry's lifecycle logging.

use strata_loop::prelude::*;

// ---------------------------------------------------------------------------
// Behaviors
// ---------------------------------------------------------------------------

/// Paces east and west between two x coordinates, drawing one pattern.
struct Patrol {
    min_x: i32,
    max_x: i32,
    step: i32,
    pattern: PatternId,
}

impl EntityBehavior for Patrol {
    fn update(&mut self, map: &mut MapEntities, self_id: EntityId) {
        let Some(bbox) = map.entity_bbox(self_id) else {
            return;
        };
        if bbox.x + self.step < self.min_x || bbox.x + bbox.width + self.step > self.max_x {
            self.step = -self.step;
        }
        let moved = Rect::new(bbox.x + self.step, bbox.y, bbox.width, bbox.height);
        let _ = map.notify_entity_bounding_box_changed(self_id, moved);
    }

    fn draw(&self, ctx: &DrawContext<'_>, canvas: &mut dyn Canvas) {
        canvas.draw_tile(self.pattern, ctx.bbox.top_left());
    }
}

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let map_size = Size::new(640, 480);
    let mut map = MapEntities::new(map_size, 2, Camera::new(Size::new(320, 240), map_size));

    // Pave the whole courtyard with grass.
    for row in 0..(480 / 16) {
        for col in 0..(640 / 16) {
            map.add_tile(TileInfo {
                pattern: PatternId(1),
                ground: Ground::Grass,
                layer: LayerId(0),
                bbox: Rect::new(col * 16, row * 16, 16, 16),
                animated: false,
            });
        }
    }

    // A pond in the southeast corner; animated, so it shimmers every frame.
    for row in 0..4 {
        for col in 0..6 {
            map.add_tile(TileInfo {
                pattern: PatternId(2),
                ground: Ground::DeepWater,
                layer: LayerId(0),
                bbox: Rect::new(400 + col * 16, 320 + row * 16, 16, 16),
                animated: true,
            });
        }
    }

    let hero = map.add_entity(
        EntityInit::new(EntityKind::Hero, LayerId(0), Rect::new(96, 224, 16, 16))
            .named("hero")
            .with_behavior(Box::new(Patrol {
                min_x: 64,
                max_x: 576,
                step: 2,
                pattern: PatternId(10),
            })),
    )?;
    map.camera_mut().track(Some(hero));

    map.add_entity(
        EntityInit::new(EntityKind::Npc, LayerId(0), Rect::new(80, 96, 16, 16))
            .named("guard_west")
            .with_behavior(Box::new(Patrol {
                min_x: 64,
                max_x: 320,
                step: 1,
                pattern: PatternId(11),
            })),
    )?;
    map.add_entity(
        EntityInit::new(EntityKind::Npc, LayerId(0), Rect::new(352, 352, 16, 16))
            .named("guard_east")
            .with_behavior(Box::new(Patrol {
                min_x: 320,
                max_x: 576,
                step: 3,
                pattern: PatternId(12),
            })),
    )?;
    map.add_entity(
        EntityInit::new(EntityKind::Destination, LayerId(0), Rect::new(96, 224, 16, 16))
            .named("from_town"),
    )?;

    println!(
        "Courtyard ready: {} tiles, {} entities",
        map.tile_count(),
        map.entity_count()
    );

    // ---------------------------------------------------------------------
    // Drive the loop
    // ---------------------------------------------------------------------

    let mut frame_loop = FrameLoop::new(map, LoopConfig::default());
    frame_loop.start();
    frame_loop.finish_opening_transition();

    let mut canvas = RecordingCanvas::new();
    frame_loop.run_frames(120, &mut canvas);

    // Keep the first act's recording; the canvas starts fresh for act two.
    let first_act = canvas.take_ops();

    // The east guard clocks out halfway through; the next sweep reclaims it.
    frame_loop.map_mut().remove_entity_named("guard_east");
    frame_loop.run_frames(120, &mut canvas);

    frame_loop.finish();

    // ---------------------------------------------------------------------
    // Report
    // ---------------------------------------------------------------------

    let hero_box = frame_loop
        .map()
        .entity_bbox(hero)
        .expect("the hero outlives the demo");
    let ground = frame_loop.map().get_ground(LayerId(0), hero_box.center());

    println!(
        "Patrolled {} frames ({:.1}s simulated), {} entities remain",
        frame_loop.frame_count(),
        frame_loop.sim_time(),
        frame_loop.map().entity_count()
    );
    println!(
        "Hero stands at ({}, {}) on {} ground",
        hero_box.x,
        hero_box.y,
        ground.name()
    );

    let diag = frame_loop.last_diagnostics();
    println!(
        "Last frame: update {:?}, draw {:?}, total {:?}",
        diag.update_time, diag.draw_time, diag.total_time
    );
    println!(
        "Canvas received {} ops with three patrols, {} with two",
        first_act.len(),
        canvas.ops().len()
    );

    Ok(())
}
