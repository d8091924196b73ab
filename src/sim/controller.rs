//! Surface controller
//!
//! Composition root for the water. Owns the tile grid, the ripple table and the
//! simulation clock, and runs every frame in a fixed order:
//!
//! 1. age ripples (expired ones go inert before anything samples them)
//! 2. recycle rows for the current scroll
//! 3. project ripple origins into view space
//! 4. refresh the render parameters handed to the renderer
//!
//! Nothing here returns an error. Bad input and missing assets degrade to a
//! plainer surface and a log line.

use glam::{Affine2, UVec2, Vec2};

use super::camera::ScrollCamera;
use super::field::{FieldTuning, SurfaceField};
use super::grid::{GridState, TileFill, TileGridScroller};
use super::ripple::{RippleSnapshot, RippleTable};
use crate::consts::{FALLBACK_WATER_COLOR, MAX_FRAME_DT};
use crate::settings::Settings;

/// Per-tile data for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileParams {
    /// Bottom-left corner in view space
    pub view_min: Vec2,
    /// Bottom-left corner in world space
    pub world_min: Vec2,
    /// Texture drift (UV units)
    pub drift: Vec2,
}

/// Everything the renderer consumes for one frame
#[derive(Debug, Clone)]
pub struct RenderParams {
    /// Seconds of simulated time
    pub time: f32,
    pub viewport: Vec2,
    pub view_to_world: Affine2,
    pub tile_size: Vec2,
    pub fill: TileFill,
    pub tiles: Vec<TileParams>,
    /// Ripples with view-space positions
    pub ripples: RippleSnapshot,
    pub tuning: FieldTuning,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            time: 0.0,
            viewport: Vec2::ZERO,
            view_to_world: Affine2::IDENTITY,
            tile_size: Vec2::ZERO,
            fill: TileFill::FlatColor(FALLBACK_WATER_COLOR),
            tiles: Vec::new(),
            ripples: RippleSnapshot::default(),
            tuning: FieldTuning::default(),
        }
    }
}

/// Owns and drives the water surface for one scene
#[derive(Debug, Clone)]
pub struct SurfaceController {
    settings: Settings,
    field: SurfaceField,
    grid: TileGridScroller,
    ripples: RippleTable,
    camera: ScrollCamera,
    world_to_view: Affine2,
    viewport: Vec2,
    asset: Option<UVec2>,
    /// Seconds simulated since the last reset
    simulation_time: f32,
    simulation_start_time: Option<f64>,
    last_update_time: Option<f64>,
    params: RenderParams,
}

impl SurfaceController {
    pub fn new(settings: Settings) -> Self {
        let tuning = settings.effective_field_tuning();
        let camera = ScrollCamera::default();
        Self {
            field: SurfaceField::new(tuning.clone()),
            grid: TileGridScroller::new(),
            ripples: RippleTable::new(),
            world_to_view: camera.world_to_view(),
            camera,
            viewport: Vec2::ZERO,
            asset: None,
            simulation_time: 0.0,
            simulation_start_time: None,
            last_update_time: None,
            params: RenderParams {
                tuning,
                ..Default::default()
            },
            settings,
        }
    }

    /// Build the tile grid for a viewport. `asset` is the native size of the
    /// water texture, if one was loaded.
    pub fn setup(&mut self, viewport: Vec2, asset: Option<UVec2>) {
        self.viewport = viewport;
        self.asset = asset;
        match self.grid.setup(viewport, asset, &self.settings.grid) {
            Ok(()) => {
                self.grid.recycle(self.camera.offset);
            }
            Err(e) => log::warn!("Water surface setup skipped: {}", e),
        }
        self.project_and_refresh();
    }

    /// Rebuild the grid for a new viewport, keeping live ripples
    pub fn resize(&mut self, viewport: Vec2) {
        if viewport == self.viewport && self.grid.state() == GridState::Ready {
            return;
        }
        log::info!("Water surface resized to {}x{}", viewport.x, viewport.y);
        self.setup(viewport, self.asset);
    }

    /// Tear down tiles, clear ripples and restart the clock
    pub fn reset(&mut self) {
        self.grid.teardown();
        self.ripples.clear();
        self.simulation_time = 0.0;
        self.simulation_start_time = None;
        self.last_update_time = None;
        self.set_scroll(0.0);
        self.project_and_refresh();
        log::info!("Water surface reset");
    }

    /// Swap settings; the grid is rebuilt only if its tuning changed
    pub fn apply_settings(&mut self, settings: Settings) {
        let grid_changed = settings.grid != self.settings.grid;
        self.settings = settings;
        self.field.set_tuning(self.settings.effective_field_tuning());
        self.params.tuning = self.field.tuning().clone();
        if grid_changed && self.grid.state() == GridState::Ready {
            self.setup(self.viewport, self.asset);
        }
    }

    /// Record a disturbance at a world position
    pub fn add_ripple(&mut self, world_pos: Vec2, amplitude: f32, frequency: f32) {
        if !world_pos.is_finite() || !frequency.is_finite() {
            log::warn!(
                "Ignoring ripple with non-finite input at {:?} (frequency {})",
                world_pos,
                frequency
            );
            return;
        }
        // Non-finite amplitude counts as no disturbance at all
        let amplitude = if amplitude.is_finite() { amplitude.max(0.0) } else { 0.0 };
        let amplitude = amplitude * self.settings.ripple_amplitude_scale();
        if self.ripples.add(world_pos, amplitude, frequency).is_none() {
            log::trace!("Ignoring inert ripple at {:?}", world_pos);
        }
    }

    /// Scroll the world under the camera
    pub fn set_scroll(&mut self, offset: f32) {
        self.camera = ScrollCamera::new(offset);
        self.world_to_view = self.camera.world_to_view();
    }

    /// Use a host-supplied transform; its vertical translation drives recycling
    pub fn set_world_to_view(&mut self, transform: Affine2) {
        self.camera = ScrollCamera::from_world_to_view(&transform);
        self.world_to_view = transform;
    }

    /// Advance one frame
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };

        self.ripples.update(dt);
        self.simulation_time += dt;
        self.grid.recycle(self.camera.offset);
        self.project_and_refresh();

        log::trace!(
            "Water tick dt={:.4} t={:.3} ripples={} tiles={}",
            dt,
            self.simulation_time,
            self.ripples.active_count(),
            self.params.tiles.len()
        );
    }

    /// Advance to a host clock reading (seconds); the first call only starts the clock
    pub fn advance_to(&mut self, now: f64) {
        self.simulation_start_time.get_or_insert(now);
        let dt = match self.last_update_time {
            Some(last) => (now - last) as f32,
            None => 0.0,
        };
        self.last_update_time = Some(now);
        self.tick(dt);
    }

    fn project_and_refresh(&mut self) {
        let projected =
            TileGridScroller::project_ripple_origins(&self.ripples.snapshot(), &self.world_to_view);

        let tuning = self.field.tuning();
        let params = &mut self.params;
        params.time = self.simulation_time;
        params.viewport = self.viewport;
        params.view_to_world = self.world_to_view.inverse();
        params.tile_size = self.grid.tile_size();
        params.fill = self.grid.fill();
        params.ripples = projected;
        params.tiles.clear();
        params.tiles.extend(self.grid.tiles().map(|tile| TileParams {
            view_min: self.world_to_view.transform_point2(tile.world_position),
            world_min: tile.world_position,
            drift: tile.drift_offset(self.simulation_time, tuning),
        }));
    }

    /// Displacement at a world point using this frame's ripples
    pub fn displacement_at(&self, world_pos: Vec2) -> f32 {
        self.field
            .displacement_at(world_pos, self.simulation_time, &self.ripples.snapshot())
    }

    /// Map a view-space point (e.g. a tap) back into the world
    pub fn view_to_world(&self, view_pos: Vec2) -> Vec2 {
        self.world_to_view.inverse().transform_point2(view_pos)
    }

    pub fn render_params(&self) -> &RenderParams {
        &self.params
    }

    pub fn grid(&self) -> &TileGridScroller {
        &self.grid
    }

    pub fn ripples(&self) -> &RippleTable {
        &self.ripples
    }

    pub fn field(&self) -> &SurfaceField {
        &self.field
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn camera(&self) -> ScrollCamera {
        self.camera
    }

    pub fn simulation_time(&self) -> f32 {
        self.simulation_time
    }

    pub fn simulation_start_time(&self) -> Option<f64> {
        self.simulation_start_time
    }

    pub fn last_update_time(&self) -> Option<f64> {
        self.last_update_time
    }
}
