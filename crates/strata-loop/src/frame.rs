//! Fixed-timestep frame driver.
//!
//! A [`FrameLoop`] owns a [`MapEntities`] and advances it one frame at a
//! time. Each frame runs two phases in a fixed order:
//!
//! 1. **Update** -- entity behaviors run in order (hero first), then the
//!    camera re-centers on its tracked entity. Queued removals are swept at
//!    the end of the phase.
//! 2. **Draw** -- every layer is painted to the canvas in stacking order.
//!
//! Simulation time is derived from the frame count and the fixed timestep,
//! never accumulated, so a long session stays exact.
//!
//! # Example
//!
//! ```
//! use strata_loop::prelude::*;
//!
//! let camera = Camera::new(Size::new(320, 240), Size::new(640, 480));
//! let map = MapEntities::new(Size::new(640, 480), 1, camera);
//! let mut frame_loop = FrameLoop::new(map, LoopConfig::default());
//! frame_loop.start();
//!
//! let mut canvas = RecordingCanvas::new();
//! frame_loop.run_frames(3, &mut canvas);
//! assert_eq!(frame_loop.frame_count(), 3);
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_map::canvas::Canvas;
use strata_map::map::MapEntities;

// ---------------------------------------------------------------------------
// LoopConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`FrameLoop`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Fixed time step in seconds per frame.
    pub fixed_dt: f32,
}

impl Default for LoopConfig {
    /// Defaults to 60 Hz (1/60 second per frame).
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing captured during the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Time spent in the update phase.
    pub update_time: Duration,
    /// Time spent in the draw phase.
    pub draw_time: Duration,
    /// Wall-clock time for the whole frame.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// The fixed-timestep frame driver.
///
/// Owns a [`MapEntities`] registry and advances it one frame at a time.
/// Rendering is abstracted behind [`Canvas`], so the same loop drives both a
/// real backend and the headless recording canvas used in tests.
pub struct FrameLoop {
    /// The entity registry being driven.
    map: MapEntities,
    /// Configuration used to create this loop.
    config: LoopConfig,
    /// Number of frames executed so far.
    frame_counter: u64,
    /// Diagnostics from the last frame.
    last_diagnostics: FrameDiagnostics,
}

impl FrameLoop {
    /// Create a new frame loop driving the given map.
    ///
    /// The frame counter starts at 0 and simulation time at 0.0.
    ///
    /// # Panics
    ///
    /// Panics unless `config.fixed_dt` is positive and finite.
    pub fn new(map: MapEntities, config: LoopConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            map,
            config,
            frame_counter: 0,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    /// Begin the map lifecycle.
    ///
    /// Builds the static tile caches and tells every entity the map started.
    /// Must be called once before the first [`frame`](Self::frame).
    ///
    /// # Panics
    ///
    /// Panics if the map already started.
    pub fn start(&mut self) {
        self.map.notify_map_started();
        debug!(fixed_dt = self.config.fixed_dt, "frame loop started");
    }

    /// Tell every entity the opening transition finished.
    pub fn finish_opening_transition(&mut self) {
        self.map.notify_map_opening_transition_finished();
    }

    /// End the map lifecycle, telling every entity the map finished.
    pub fn finish(&mut self) {
        self.map.notify_map_finished();
    }

    /// Execute one frame.
    ///
    /// 1. Advances the simulation via [`MapEntities::update`].
    /// 2. Paints every layer via [`MapEntities::draw`].
    /// 3. Advances the frame counter.
    ///
    /// Timing for both phases lands in
    /// [`last_diagnostics`](Self::last_diagnostics).
    ///
    /// # Panics
    ///
    /// Panics if [`start`](Self::start) has not been called.
    pub fn frame(&mut self, canvas: &mut dyn Canvas) {
        let frame_start = Instant::now();

        // Phase 1: advance the simulation.
        let update_start = Instant::now();
        self.map.update();
        let update_time = update_start.elapsed();

        // Phase 2: paint.
        let draw_start = Instant::now();
        self.map.draw(canvas);
        let draw_time = draw_start.elapsed();

        // Phase 3: advance the frame counter.
        self.frame_counter += 1;

        self.last_diagnostics = FrameDiagnostics {
            update_time,
            draw_time,
            total_time: frame_start.elapsed(),
        };
    }

    /// Run multiple frames in sequence.
    ///
    /// Equivalent to calling [`frame`](Self::frame) `count` times.
    pub fn run_frames(&mut self, count: u64, canvas: &mut dyn Canvas) {
        for _ in 0..count {
            self.frame(canvas);
        }
    }

    // -- accessors ----------------------------------------------------------

    /// The number of frames executed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// The current simulation time in seconds.
    ///
    /// Computed as `frame_count * fixed_dt` rather than accumulated, so long
    /// sessions carry no floating-point drift.
    pub fn sim_time(&self) -> f32 {
        self.frame_counter as f32 * self.config.fixed_dt
    }

    /// The fixed time step in seconds per frame.
    pub fn fixed_dt(&self) -> f32 {
        self.config.fixed_dt
    }

    /// Suspend or resume the simulation.
    ///
    /// A suspended loop still draws and still applies queued removals, but
    /// entity behaviors stop receiving updates.
    pub fn set_suspended(&mut self, suspended: bool) {
        self.map.set_suspended(suspended);
    }

    /// Whether the simulation is suspended.
    pub fn is_suspended(&self) -> bool {
        self.map.is_suspended()
    }

    /// Read-only access to the entity registry.
    pub fn map(&self) -> &MapEntities {
        &self.map
    }

    /// Mutable access to the entity registry, for scene setup and direct
    /// mutation between frames.
    pub fn map_mut(&mut self) -> &mut MapEntities {
        &mut self.map
    }

    /// Diagnostics from the last frame (update and draw timing).
    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
