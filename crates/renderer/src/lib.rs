//! Renderer: model loading pipeline (texture cache, mesh builder, scene
//! importer) on top of a small GPU seam, plus the wgpu backend.
//! wgpu = 26.x, winit = 0.30.x

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use wgpu::{VertexBufferLayout, VertexStepMode};

pub mod device;
pub mod gpu;
pub mod headless;
pub mod import;
pub mod mesh;
pub mod model;
pub mod texture_cache;

pub use asset::{TextureError, TextureKind};
pub use device::{GpuDevice, MeshBuffersId, ShaderContext, TextureId};
pub use gpu::{FrameRecorder, GpuState};
pub use import::SceneImporter;
pub use mesh::Mesh;
pub use model::Model;
pub use texture_cache::{Texture, TextureCache};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Mesh has no vertices or no indices")]
    EmptyMesh,
    #[error("Index {index} out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { index: u32, vertex_count: usize },
    #[error("Texture {width}x{height} exceeds the device limit of {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error("GPU initialisation failed: {0}")]
    Init(String),
}

/// Vertex: position + normal + texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}
