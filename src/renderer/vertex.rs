//! Per-tile instance data for the water pass

use bytemuck::{Pod, Zeroable};

use crate::sim::TileParams;

/// One tile quad; the six corners come from `vertex_index` in the shader
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TileInstance {
    pub view_min: [f32; 2],
    pub world_min: [f32; 2],
    pub drift: [f32; 2],
}

impl From<&TileParams> for TileInstance {
    fn from(tile: &TileParams) -> Self {
        Self {
            view_min: tile.view_min.to_array(),
            world_min: tile.world_min.to_array(),
            drift: tile.drift.to_array(),
        }
    }
}

impl TileInstance {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}
