//! Water Surface - an endlessly scrolling water plane with gameplay ripples
//!
//! Core modules:
//! - `sim`: Deterministic surface simulation (ripple table, displacement field, tile grid)
//! - `renderer`: WebGPU rendering pipeline
//! - `platform`: Browser/native frame clock
//! - `settings`: Tunable surface parameters and quality presets

pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use settings::{QualityPreset, Settings};
pub use sim::{
    FieldTuning, GridTuning, RenderParams, RippleTable, SurfaceController, SurfaceField,
    TileGridScroller,
};

/// Surface configuration constants
pub mod consts {
    /// Ripple slots available to the renderer (three vec4 uniforms per attribute)
    pub const MAX_RIPPLES: usize = 12;
    /// Seconds a ripple stays visible after creation
    pub const RIPPLE_LIFETIME: f32 = 2.0;

    /// Extra rows beyond what the viewport needs, slack for recycling
    pub const ROW_OVERLAP: usize = 2;
    /// Extra columns beyond what the viewport needs
    pub const COL_OVERLAP: usize = 2;

    /// Tile edge length (world units) when no source asset is available
    pub const DEFAULT_TILE_SIZE: f32 = 256.0;
    /// Tile instances the renderer can draw in one pass
    pub const MAX_TILES: usize = 256;

    /// Longest step a single tick may take (stalled frames get clamped)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Flat water colour used when the source texture is missing
    pub const FALLBACK_WATER_COLOR: [f32; 4] = [0.11, 0.38, 0.52, 1.0];
}
