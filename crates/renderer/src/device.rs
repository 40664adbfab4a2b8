//! The seam between the loading pipeline and the graphics device.

use asset::TextureData;
use glam::{Mat4, Vec3};

use crate::{RenderError, Vertex};

/// Opaque handle of an uploaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Opaque handle of an uploaded vertex + index buffer pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshBuffersId(pub u32);

/// Resource allocation on the graphics device.
pub trait GpuDevice {
    /// Uploads every level of the texture's mip chain. Sampling uses repeat
    /// wrapping and trilinear filtering.
    fn upload_texture(&mut self, label: &str, texture: &TextureData) -> Result<TextureId, RenderError>;

    fn release_texture(&mut self, id: TextureId);

    /// Uploads a vertex buffer (position/normal/uv layout) and a `u32` index buffer.
    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshBuffersId, RenderError>;

    fn release_mesh(&mut self, id: MeshBuffersId);
}

/// A bound shader program and the draw commands issued through it.
///
/// Uniforms and samplers are addressed by name, the way the model shader
/// declares them (`projection`, `view`, `model`, `viewPos`, `diffuse0`, ...).
pub trait ShaderContext {
    fn use_program(&mut self);

    fn set_bool(&mut self, name: &str, value: bool);

    fn set_int(&mut self, name: &str, value: i32);

    fn set_float(&mut self, name: &str, value: f32);

    fn set_vec3(&mut self, name: &str, value: Vec3);

    fn set_mat4(&mut self, name: &str, value: Mat4);

    /// Binds `texture` to texture unit `unit` and points sampler `sampler` at it.
    fn bind_texture(&mut self, unit: u32, sampler: &str, texture: TextureId);

    fn draw_indexed(&mut self, buffers: MeshBuffersId, index_count: u32);

    /// Unbinds all textures and makes unit 0 active again.
    fn reset_texture_units(&mut self);
}
