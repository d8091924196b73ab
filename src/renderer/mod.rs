//! WebGPU rendering module
//!
//! Instanced tile quads; all displacement happens in the fragment shader.

pub mod vertex;
pub mod water_pipeline;

pub use vertex::TileInstance;
pub use water_pipeline::{RenderInitError, WaterRenderState};
