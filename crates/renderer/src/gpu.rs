//! wgpu backend: surface, depth buffer, model pipeline and the resource
//! arenas behind [`GpuDevice`] handles.

use std::{borrow::Cow, collections::HashMap, num::NonZeroU64, sync::Arc};

use asset::{MipLevel, PixelFormat, TextureData};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::{
    AddressMode, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, BlendState,
    Buffer, BufferBindingType, BufferUsages, Color, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device, DeviceDescriptor,
    Extent3d, Features, FilterMode, FragmentState, IndexFormat, Instance, InstanceDescriptor,
    Limits, LoadOp, Operations, Origin3d, PipelineLayoutDescriptor, PowerPreference, PresentMode,
    Queue, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, SurfaceTexture, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexState, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    RenderError, Vertex,
    device::{GpuDevice, MeshBuffersId, ShaderContext, TextureId},
};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// The only sampler the model shader reads.
const DIFFUSE_SAMPLER: &str = "diffuse0";

/// Scene UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SceneUniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    view_pos: [f32; 4],
    light_pos: [f32; 4],
    light_color: [f32; 4],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            view_pos: [0.0; 4],
            light_pos: [0.0; 4],
            light_color: [1.0; 4],
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: BindGroup,
}

struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Buffer,
}

struct DrawCall {
    buffers: MeshBuffersId,
    index_count: u32,
    diffuse: Option<TextureId>,
}

/// One frame being recorded through [`ShaderContext`]. Uniforms are
/// frame-wide; draws are replayed by [`GpuState::end_frame`].
pub struct FrameRecorder {
    frame: SurfaceTexture,
    view: TextureView,
    uniforms: SceneUniforms,
    program_bound: bool,
    diffuse: Option<TextureId>,
    draws: Vec<DrawCall>,
}

impl FrameRecorder {
    fn new(frame: SurfaceTexture) -> Self {
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        Self {
            frame,
            view,
            uniforms: SceneUniforms::default(),
            program_bound: false,
            diffuse: None,
            draws: Vec::new(),
        }
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }
}

impl ShaderContext for FrameRecorder {
    fn use_program(&mut self) {
        self.program_bound = true;
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        log::trace!("Ignoring bool uniform {} = {}", name, value);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        log::trace!("Ignoring int uniform {} = {}", name, value);
    }

    fn set_float(&mut self, name: &str, value: f32) {
        log::trace!("Ignoring float uniform {} = {}", name, value);
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        let slot = match name {
            "viewPos" => &mut self.uniforms.view_pos,
            "lightPos" => &mut self.uniforms.light_pos,
            "lightColor" => &mut self.uniforms.light_color,
            _ => {
                log::trace!("Ignoring vec3 uniform {}", name);
                return;
            }
        };
        *slot = value.extend(1.0).to_array();
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        let slot = match name {
            "projection" => &mut self.uniforms.projection,
            "view" => &mut self.uniforms.view,
            "model" => &mut self.uniforms.model,
            _ => {
                log::trace!("Ignoring mat4 uniform {}", name);
                return;
            }
        };
        *slot = value.to_cols_array_2d();
    }

    fn bind_texture(&mut self, unit: u32, sampler: &str, texture: TextureId) {
        if sampler == DIFFUSE_SAMPLER {
            self.diffuse = Some(texture);
        } else {
            log::trace!("Ignoring sampler {} on unit {}", sampler, unit);
        }
    }

    fn draw_indexed(&mut self, buffers: MeshBuffersId, index_count: u32) {
        self.draws.push(DrawCall {
            buffers,
            index_count,
            diffuse: self.diffuse,
        });
    }

    fn reset_texture_units(&mut self) {
        self.diffuse = None;
    }
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipeline
    pipeline: RenderPipeline,
    scene_bg: BindGroup,
    scene_buf: Buffer,
    texture_bgl: BindGroupLayout,
    sampler: Sampler,
    default_texture: GpuTexture,

    // Depth
    depth_view: TextureView,

    // Resource arenas
    next_id: u32,
    textures: HashMap<TextureId, GpuTexture>,
    meshes: HashMap<MeshBuffersId, GpuMesh>,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: Backends) -> Result<Self, RenderError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::Init(format!("create_surface failed: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Init(format!("No suitable GPU adapter: {e}")))?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Svarog Viewer Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| RenderError::Init(format!("request_device failed: {e}")))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Init("Surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .ok_or_else(|| RenderError::Init("Surface reports no alpha modes".into()))?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Model WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });

        // ==== Scene BGL/BG ====
        let scene_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Scene BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<SceneUniforms>() as u64),
                },
                count: None,
            }],
        });
        let scene_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene UBO"),
            contents: bytemuck::bytes_of(&SceneUniforms::default()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let scene_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Scene BG"),
            layout: &scene_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: scene_buf.as_entire_binding(),
            }],
        });

        // ==== Texture BGL + shared sampler ====
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension: TextureViewDimension::D2,
                        sample_type: TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Model Sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        });
        let default_texture = create_texture(
            &device,
            &queue,
            &texture_bgl,
            &sampler,
            "Default White",
            &TextureData::solid_rgba([255, 255, 255, 255]),
        );

        // ==== Pipeline ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Model PipelineLayout"),
            bind_group_layouts: &[&scene_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Model Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // No culling: imported winding is not trusted.
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            pipeline,
            scene_bg,
            scene_buf,
            texture_bgl,
            sampler,
            default_texture,
            depth_view,
            next_id: 0,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            width,
            height,
        })
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Acquire the next surface texture and start recording a frame.
    pub fn begin_frame(&mut self) -> Result<FrameRecorder, SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        Ok(FrameRecorder::new(frame))
    }

    /// Upload the frame's uniforms, clear colour + depth, replay the recorded
    /// draws and present.
    pub fn end_frame(&mut self, frame: FrameRecorder) {
        self.queue
            .write_buffer(&self.scene_buf, 0, bytemuck::bytes_of(&frame.uniforms));

        if !frame.program_bound && !frame.draws.is_empty() {
            log::warn!("Dropping {} draws recorded without a program", frame.draws.len());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if frame.program_bound {
                rpass.set_pipeline(&self.pipeline);
                rpass.set_bind_group(0, &self.scene_bg, &[]);

                for draw in &frame.draws {
                    let Some(mesh) = self.meshes.get(&draw.buffers) else {
                        log::warn!("Draw of unknown mesh buffers {:?}", draw.buffers);
                        continue;
                    };
                    let texture = draw
                        .diffuse
                        .and_then(|id| self.textures.get(&id))
                        .unwrap_or(&self.default_texture);

                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                    rpass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                    rpass.set_index_buffer(mesh.index_buf.slice(..), IndexFormat::Uint32);
                    rpass.draw_indexed(0..draw.index_count, 0, 0..1);
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.frame.present();
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuDevice for GpuState {
    fn upload_texture(&mut self, label: &str, texture: &TextureData) -> Result<TextureId, RenderError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if texture.width > limit || texture.height > limit {
            return Err(RenderError::TextureTooLarge {
                width: texture.width,
                height: texture.height,
                limit,
            });
        }

        let gpu_texture = create_texture(
            &self.device,
            &self.queue,
            &self.texture_bgl,
            &self.sampler,
            label,
            texture,
        );
        let id = TextureId(self.next_id());
        self.textures.insert(id, gpu_texture);
        Ok(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            log::warn!("Release of unknown texture {:?}", id);
        }
    }

    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshBuffersId, RenderError> {
        let vertex_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} VB")),
                contents: bytemuck::cast_slice(vertices),
                usage: BufferUsages::VERTEX,
            });
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} IB")),
                contents: bytemuck::cast_slice(indices),
                usage: BufferUsages::INDEX,
            });

        let id = MeshBuffersId(self.next_id());
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buf,
                index_buf,
            },
        );
        Ok(id)
    }

    fn release_mesh(&mut self, id: MeshBuffersId) {
        if self.meshes.remove(&id).is_none() {
            log::warn!("Release of unknown mesh buffers {:?}", id);
        }
    }
}

/// Create a sampled texture with its full mip chain and bind group.
fn create_texture(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    sampler: &Sampler,
    label: &str,
    data: &TextureData,
) -> GpuTexture {
    let (format, bytes_per_pixel) = match data.format {
        PixelFormat::Red => (TextureFormat::R8Unorm, 1),
        PixelFormat::Rgb | PixelFormat::Rgba => (TextureFormat::Rgba8UnormSrgb, 4),
    };
    let levels = data.mip_chain();

    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip_level, level) in levels.iter().enumerate() {
        queue.write_texture(
            TexelCopyTextureInfo {
                aspect: TextureAspect::All,
                texture: &texture,
                mip_level: mip_level as u32,
                origin: Origin3d::ZERO,
            },
            &level_pixels(level, data.format),
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * level.width),
                rows_per_image: Some(level.height),
            },
            Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ],
    });

    GpuTexture {
        _texture: texture,
        bind_group,
    }
}

/// Pixels of one level in the uploaded layout; RGB has no 3-byte GPU format.
fn level_pixels(level: &MipLevel, format: PixelFormat) -> Cow<'_, [u8]> {
    match format {
        PixelFormat::Rgb => Cow::Owned(
            level
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
        ),
        PixelFormat::Red | PixelFormat::Rgba => Cow::Borrowed(level.data.as_slice()),
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
