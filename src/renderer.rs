// --- File: renderer.rs ---
use std::mem;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::util::DeviceExt;
use winit::{dpi::PhysicalSize, window::Window};

use crate::constants::{
    BACKGROUND_COLOR, CAMERA_ZOOM_STEP, DEFAULT_CAMERA_HALF_HEIGHT, METABALL_ISO_LEVEL,
    METABALL_SMOOTHNESS,
};
use crate::error::RendererError;
use crate::handoff::{RenderView, SplatInstance};

const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

// --- GPU Data Structures ---

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GlobalUniforms {
    camera_center: [f32; 2],
    camera_half_extent: [f32; 2],
    screen_resolution: [f32; 2],
    iso_level: f32,
    smoothness: f32,
    background_color: [f32; 4],
}

// Unit quad corners. Drawn once as the composite pass and instanced per splat.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FullscreenVertex {
    position: [f32; 2], // @location(0)
}

impl FullscreenVertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<FullscreenVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        }
    }
}

// center, radius, weight, color
const SPLAT_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![1 => Float32x2, 2 => Float32, 3 => Float32, 4 => Float32x4];

fn splat_desc() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: mem::size_of::<SplatInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &SPLAT_ATTRIBUTES,
    }
}

// --- Camera ---

/// Orthographic view of the simulation plane. World x maps to screen right, world z to
/// screen up.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera2D {
    pub center: Vec2,
    pub half_height: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            half_height: DEFAULT_CAMERA_HALF_HEIGHT,
        }
    }
}

impl Camera2D {
    pub fn half_extent(&self, size: PhysicalSize<u32>) -> Vec2 {
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        Vec2::new(self.half_height * aspect, self.half_height)
    }

    /// World position under a cursor given in physical pixels (origin top-left).
    pub fn screen_to_world(&self, cursor: Vec2, size: PhysicalSize<u32>) -> Vec2 {
        let resolution = Vec2::new(size.width.max(1) as f32, size.height.max(1) as f32);
        let ndc = Vec2::new(
            cursor.x / resolution.x * 2.0 - 1.0,
            1.0 - cursor.y / resolution.y * 2.0,
        );
        self.center + ndc * self.half_extent(size)
    }

    pub fn zoom_in(&mut self) {
        self.half_height = (self.half_height / CAMERA_ZOOM_STEP).max(1.0);
    }

    pub fn zoom_out(&mut self) {
        self.half_height *= CAMERA_ZOOM_STEP;
    }
}

// --- Renderer ---
pub struct Renderer<'a> {
    surface: wgpu::Surface<'a>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    splat_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    quad_vertex_buffer: wgpu::Buffer,
    splat_buffer: wgpu::Buffer,
    splat_capacity: usize,
    splat_scratch: Vec<SplatInstance>,
    global_uniform_buffer: wgpu::Buffer,
    bind_group_globals: wgpu::BindGroup,
    bind_group_layout_field: wgpu::BindGroupLayout,
    field_view: wgpu::TextureView,
    bind_group_field: wgpu::BindGroup,
}

impl Renderer<'static> {
    /// Creates the surface, device and both metaball passes. `max_splats` sizes the instance
    /// buffer once; see [`RenderView::splat_count`].
    pub async fn new(window: Arc<Window>, max_splats: usize) -> Result<Self, RendererError> {
        let size = window.inner_size();
        let size = PhysicalSize::new(size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::NoAdapter)?;

        let info = adapter.get_info();
        if info.device_type == wgpu::DeviceType::Cpu {
            return Err(RendererError::SoftwareAdapter(info.name));
        }
        let field_features = adapter.get_texture_format_features(FIELD_FORMAT);
        if !field_features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
            || !field_features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
        {
            return Err(RendererError::MissingCapability("blendable Rgba16Float render targets"));
        }

        let required_limits = wgpu::Limits::default().using_resolution(adapter.limits());
        let splat_capacity = max_splats.max(1);
        let splat_bytes = (splat_capacity as u64).saturating_mul(mem::size_of::<SplatInstance>() as u64);
        if splat_bytes > required_limits.max_buffer_size {
            return Err(RendererError::BufferLimit {
                requested: splat_bytes,
                limit: required_limits.max_buffer_size,
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        log::info!("Rendering with {} ({:?})", info.name, info.backend);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RendererError::MissingCapability("a presentable surface format"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Metaball Shader Module"),
            source: wgpu::ShaderSource::Wgsl(include_str!("metaball.wgsl").into()),
        });

        // --- Create Buffers ---

        let quad_vertices = [
            FullscreenVertex { position: [-1.0, -1.0] },
            FullscreenVertex { position: [1.0, -1.0] },
            FullscreenVertex { position: [-1.0, 1.0] },
            FullscreenVertex { position: [-1.0, 1.0] },
            FullscreenVertex { position: [1.0, -1.0] },
            FullscreenVertex { position: [1.0, 1.0] },
        ];
        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let global_uniforms = uniforms_for(&Camera2D::default(), size);
        let global_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global Uniform Buffer"),
            contents: bytemuck::cast_slice(&[global_uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let splat_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Splat Instance Buffer"),
            size: splat_bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // --- Bind Group Layouts ---
        let bind_group_layout_globals =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Globals Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            mem::size_of::<GlobalUniforms>() as _,
                        ),
                    },
                    count: None,
                }],
            });

        let bind_group_layout_field =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Field Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });

        let bind_group_globals = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &bind_group_layout_globals,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_uniform_buffer.as_entire_binding(),
            }],
        });

        let (field_view, bind_group_field) = create_field(&device, &bind_group_layout_field, size);

        // --- Render Pipelines ---
        let splat_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Splat Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout_globals],
            push_constant_ranges: &[],
        });
        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[
                &bind_group_layout_globals, // Group 0
                &bind_group_layout_field,   // Group 1
            ],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let splat_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Splat Pipeline"),
            layout: Some(&splat_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_splat"),
                compilation_options: Default::default(),
                buffers: &[FullscreenVertex::desc(), splat_desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_splat"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FIELD_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: quad_primitive(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let composite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
            layout: Some(&composite_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_composite"),
                compilation_options: Default::default(),
                buffers: &[FullscreenVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_composite"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: quad_primitive(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            splat_pipeline,
            composite_pipeline,
            quad_vertex_buffer,
            splat_buffer,
            splat_capacity,
            splat_scratch: Vec::with_capacity(splat_capacity),
            global_uniform_buffer,
            bind_group_globals,
            bind_group_layout_field,
            field_view,
            bind_group_field,
        })
    }
}

impl Renderer<'_> {
    /// Reapplies the current surface configuration after the surface was lost or outdated.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let new_size = PhysicalSize::new(new_size.width.max(1), new_size.height.max(1));
        if new_size == self.size {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        let (field_view, bind_group_field) =
            create_field(&self.device, &self.bind_group_layout_field, new_size);
        self.field_view = field_view;
        self.bind_group_field = bind_group_field;

        log::debug!("Renderer resized to {}x{}", new_size.width, new_size.height);
    }

    /// Draws one frame: splats accumulate into the field texture, then the composite pass
    /// thresholds the field onto the surface.
    pub fn render(&mut self, view: &RenderView<'_>, camera: &Camera2D) -> Result<(), wgpu::SurfaceError> {
        let output_texture = self.surface.get_current_texture()?;
        let surface_view = output_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        view.write_splats(&mut self.splat_scratch);
        if self.splat_scratch.len() > self.splat_capacity {
            log::warn!(
                "Dropping {} splats over buffer capacity {}",
                self.splat_scratch.len() - self.splat_capacity,
                self.splat_capacity
            );
            self.splat_scratch.truncate(self.splat_capacity);
        }
        let splat_count = self.splat_scratch.len() as u32;
        if splat_count > 0 {
            self.queue
                .write_buffer(&self.splat_buffer, 0, bytemuck::cast_slice(&self.splat_scratch));
        }
        self.queue.write_buffer(
            &self.global_uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms_for(camera, self.size)]),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Metaball Render Encoder"),
            });

        {
            let mut field_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Splat Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.field_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if splat_count > 0 {
                field_pass.set_pipeline(&self.splat_pipeline);
                field_pass.set_bind_group(0, &self.bind_group_globals, &[]);
                field_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                field_pass.set_vertex_buffer(1, self.splat_buffer.slice(..));
                field_pass.draw(0..6, 0..splat_count);
            }
        }

        {
            let mut composite_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            composite_pass.set_pipeline(&self.composite_pipeline);
            composite_pass.set_bind_group(0, &self.bind_group_globals, &[]);
            composite_pass.set_bind_group(1, &self.bind_group_field, &[]);
            composite_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
            composite_pass.draw(0..6, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output_texture.present();

        Ok(())
    }
}

fn uniforms_for(camera: &Camera2D, size: PhysicalSize<u32>) -> GlobalUniforms {
    GlobalUniforms {
        camera_center: camera.center.into(),
        camera_half_extent: camera.half_extent(size).into(),
        screen_resolution: [size.width as f32, size.height as f32],
        iso_level: METABALL_ISO_LEVEL,
        smoothness: METABALL_SMOOTHNESS,
        background_color: [
            BACKGROUND_COLOR.r as f32,
            BACKGROUND_COLOR.g as f32,
            BACKGROUND_COLOR.b as f32,
            BACKGROUND_COLOR.a as f32,
        ],
    }
}

fn quad_primitive() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

// The field texture matches the surface size and is recreated on resize.
fn create_field(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    size: PhysicalSize<u32>,
) -> (wgpu::TextureView, wgpu::BindGroup) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Metaball Field Texture"),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FIELD_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Field Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&view),
        }],
    });
    (view, bind_group)
}
