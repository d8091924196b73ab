//! Water surface WebGPU render pipeline
//!
//! Draws every tile as an instanced quad. The fragment shader evaluates the
//! same displacement field as `SurfaceField` (ambient noise in world space,
//! ripples from their view-space positions) and uses it as a UV offset.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::vertex::TileInstance;
use crate::consts::{MAX_RIPPLES, MAX_TILES, RIPPLE_LIFETIME};
use crate::sim::{RenderParams, RippleSnapshot, TileFill};
use crate::sim::noise::PERMUTATION_SIZE;

/// Octaves the shader evaluates
pub const MAX_SHADER_OCTAVES: usize = 4;
/// vec4 chunks per ripple attribute
const RIPPLE_CHUNKS: usize = MAX_RIPPLES / 4;

const _: () = assert!(MAX_RIPPLES % 4 == 0, "ripples are packed four per vec4");

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct Globals {
    resolution: [f32; 2],     // offset 0
    time: f32,                // offset 8
    use_texture: u32,         // offset 12
    tile_size: [f32; 2],      // offset 16
    drift_velocity: [f32; 2], // offset 24
    fill_color: [f32; 4],     // offset 32
    octave_weights: [f32; 4], // offset 48 - pre-normalized
    frequency_scale: f32,     // offset 64
    ambient_amplitude: f32,   // offset 68
    distance_scale: f32,      // offset 72
    ripple_speed: f32,        // offset 76
    falloff_radius: f32,      // offset 80
    fade_exponent: f32,       // offset 84
    ripple_epsilon: f32,      // offset 88
    lifetime: f32,            // offset 92
    octave_count: u32,        // offset 96
    _pad: [u32; 3],           // pad to 112 bytes
}

impl Globals {
    pub(crate) fn from_params(params: &RenderParams) -> Self {
        let tuning = &params.tuning;

        // The shader sums without normalizing, so fold the weight total in here
        let weights = tuning.effective_octave_weights();
        let norm: f32 = weights.iter().map(|w| w.abs()).sum();
        if weights.len() > MAX_SHADER_OCTAVES {
            log::debug!(
                "Shader evaluates {} of {} ambient octaves",
                MAX_SHADER_OCTAVES,
                weights.len()
            );
        }
        let mut octave_weights = [0.0; MAX_SHADER_OCTAVES];
        for (dst, w) in octave_weights.iter_mut().zip(&weights) {
            *dst = if norm > 0.0 { w / norm } else { 0.0 };
        }

        let (use_texture, fill_color) = match params.fill {
            TileFill::Texture => (1, [0.0; 4]),
            TileFill::FlatColor(color) => (0, color),
        };

        Self {
            resolution: params.viewport.to_array(),
            time: params.time,
            use_texture,
            tile_size: params.tile_size.to_array(),
            drift_velocity: tuning.drift_velocity.to_array(),
            fill_color,
            octave_weights,
            frequency_scale: tuning.frequency_scale,
            ambient_amplitude: tuning.clamped_ambient_amplitude(),
            distance_scale: tuning.distance_scale.max(f32::EPSILON),
            ripple_speed: tuning.ripple_speed,
            falloff_radius: tuning.falloff_radius.max(f32::EPSILON),
            fade_exponent: tuning.fade_exponent.max(f32::EPSILON),
            ripple_epsilon: tuning.epsilon,
            lifetime: RIPPLE_LIFETIME,
            octave_count: weights.len().min(MAX_SHADER_OCTAVES) as u32,
            _pad: [0; 3],
        }
    }
}

/// Ripple table as uniform data: each attribute is twelve floats in three vec4s
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct RippleUniforms {
    pos_x: [[f32; 4]; RIPPLE_CHUNKS],
    pos_y: [[f32; 4]; RIPPLE_CHUNKS],
    amplitude: [[f32; 4]; RIPPLE_CHUNKS],
    age: [[f32; 4]; RIPPLE_CHUNKS],
    frequency: [[f32; 4]; RIPPLE_CHUNKS],
}

impl From<&RippleSnapshot> for RippleUniforms {
    fn from(snapshot: &RippleSnapshot) -> Self {
        // Identical layout: [f32; 12] and [[f32; 4]; 3] are the same bytes
        bytemuck::cast(*snapshot)
    }
}

/// Noise permutation, one byte per u32 lane
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct NoiseUniforms {
    perm: [[u32; 4]; PERMUTATION_SIZE / 4],
}

impl NoiseUniforms {
    pub(crate) fn new(permutation: &[u8]) -> Self {
        let mut uniforms = Self::zeroed();
        for (i, &p) in permutation.iter().take(PERMUTATION_SIZE).enumerate() {
            uniforms.perm[i / 4][i % 4] = p as u32;
        }
        uniforms
    }
}

// ============================================================================
// WATER RENDER STATE
// ============================================================================

/// Failures while bringing up the GPU side
#[derive(Debug)]
pub enum RenderInitError {
    Device(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RenderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderInitError::Device(e) => write!(f, "failed to create device: {}", e),
            RenderInitError::UnsupportedSurface => write!(f, "surface reports no formats"),
        }
    }
}

impl std::error::Error for RenderInitError {}

impl From<wgpu::RequestDeviceError> for RenderInitError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        RenderInitError::Device(e)
    }
}

pub struct WaterRenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    ripples_buffer: wgpu::Buffer,
    noise_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    texture_view: wgpu::TextureView,

    pub size: (u32, u32),
}

impl WaterRenderState {
    /// `permutation` is the noise table of the field being drawn
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        permutation: &[u8],
    ) -> Result<Self, RenderInitError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("water-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderInitError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("water_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("water_shader.wgsl").into()),
        });

        // Create buffers
        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let ripples_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ripples"),
            contents: bytemuck::bytes_of(&RippleUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let noise_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("noise"),
            contents: bytemuck::bytes_of(&NoiseUniforms::new(permutation)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tiles"),
            size: (std::mem::size_of::<TileInstance>() * MAX_TILES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("water_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                uniform_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("water_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // 1x1 placeholder until a real texture arrives
        let texture_view = create_texture_view(&device, &queue, &[255, 255, 255, 255], 1, 1);

        let bind_group = create_bind_group(
            &device,
            &bind_group_layout,
            [&globals_buffer, &ripples_buffer, &noise_buffer],
            &texture_view,
            &sampler,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("water_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("water_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[TileInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::info!("Water pipeline ready ({}x{})", config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            globals_buffer,
            ripples_buffer,
            noise_buffer,
            instance_buffer,
            bind_group_layout,
            bind_group,
            sampler,
            texture_view,
            size: (width, height),
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Upload the water texture (tightly packed RGBA8). Returns false and keeps
    /// the current texture if the data does not match the dimensions.
    pub fn set_texture(&mut self, rgba: &[u8], width: u32, height: u32) -> bool {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            log::warn!(
                "Rejecting water texture {}x{} with {} bytes (expected {})",
                width,
                height,
                rgba.len(),
                expected
            );
            return false;
        }
        self.texture_view = create_texture_view(&self.device, &self.queue, rgba, width, height);
        self.bind_group = create_bind_group(
            &self.device,
            &self.bind_group_layout,
            [&self.globals_buffer, &self.ripples_buffer, &self.noise_buffer],
            &self.texture_view,
            &self.sampler,
        );
        log::info!("Water texture uploaded ({}x{})", width, height);
        true
    }

    /// Replace the noise table (after the field's seed changes)
    pub fn set_noise_permutation(&self, permutation: &[u8]) {
        self.queue.write_buffer(
            &self.noise_buffer,
            0,
            bytemuck::bytes_of(&NoiseUniforms::new(permutation)),
        );
    }

    /// Upload this frame's parameters and draw
    pub fn render(&mut self, params: &RenderParams) -> Result<(), wgpu::SurfaceError> {
        let globals = Globals::from_params(params);
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let ripples = RippleUniforms::from(&params.ripples);
        self.queue
            .write_buffer(&self.ripples_buffer, 0, bytemuck::bytes_of(&ripples));

        if params.tiles.len() > MAX_TILES {
            log::debug!("Drawing {} of {} water tiles", MAX_TILES, params.tiles.len());
        }
        let instances: Vec<TileInstance> = params
            .tiles
            .iter()
            .take(MAX_TILES)
            .map(TileInstance::from)
            .collect();
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("water_encoder"),
            });

        let clear = match params.fill {
            TileFill::FlatColor([r, g, b, a]) => wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            },
            TileFill::Texture => wgpu::Color::BLACK,
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("water_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if !instances.is_empty() {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
                render_pass.draw(0..6, 0..instances.len() as u32);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_texture_view(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("water_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        rgba,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    [globals, ripples, noise]: [&wgpu::Buffer; 3],
    texture_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("water_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: ripples.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: noise.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
