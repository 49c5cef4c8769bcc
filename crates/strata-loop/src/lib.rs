//! Strata Loop -- fixed-timestep frame driver for Strata maps.
//!
//! This crate builds on [`strata_map`] to provide the simulation driver: a
//! fixed-timestep loop that runs the registry's update phase, paints every
//! layer to a [`Canvas`](strata_map::canvas::Canvas), and derives simulation
//! time from the frame count.
//!
//! # Quick Start
//!
//! ```
//! use strata_loop::prelude::*;
//!
//! let size = Size::new(640, 480);
//! let mut map = MapEntities::new(size, 2, Camera::new(Size::new(320, 240), size));
//! map.add_entity(EntityInit::new(EntityKind::Npc, LayerId(0), Rect::new(48, 48, 16, 16)))?;
//!
//! let mut frame_loop = FrameLoop::new(map, LoopConfig::default());
//! frame_loop.start();
//!
//! let mut canvas = RecordingCanvas::new();
//! frame_loop.run_frames(60, &mut canvas);
//! assert_eq!(frame_loop.sim_time(), 1.0);
//! # Ok::<(), MapError>(())
//! ```

#![deny(unsafe_code)]

pub mod frame;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the map crate for convenience.
pub use strata_map;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common driver usage.
pub mod prelude {
    // Re-export everything from the map prelude.
    pub use strata_map::prelude::*;

    // Driver-specific exports.
    pub use crate::frame::{FrameDiagnostics, FrameLoop, LoopConfig};
}
