//! Water surface simulation
//!
//! Everything the renderer needs to draw the water lives here. This module is
//! deterministic and renderer-free:
//! - Single-threaded, driven once per frame by `SurfaceController::tick`
//! - Seeded noise only
//! - Stable slot order for ripples

pub mod camera;
pub mod controller;
pub mod field;
pub mod grid;
pub mod noise;
pub mod ripple;

pub use camera::ScrollCamera;
pub use controller::{RenderParams, SurfaceController, TileParams};
pub use field::{FieldTuning, MAX_AMBIENT_AMPLITUDE, SurfaceField};
pub use grid::{
    GridState, GridTuning, SetupError, Tile, TileFill, TileGridScroller, TileRow,
    compute_tile_size,
};
pub use noise::NoiseField;
pub use ripple::{RippleEvent, RippleSnapshot, RippleTable};
