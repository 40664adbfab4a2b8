//! Headless backend: allocates handles and records commands without a GPU.
//! Used by `--inspect` and by tests.

use std::collections::BTreeMap;

use asset::{PixelFormat, TextureData};
use glam::{Mat4, Vec3};

use crate::{
    RenderError, Vertex,
    device::{GpuDevice, MeshBuffersId, ShaderContext, TextureId},
};

#[derive(Clone, Debug, PartialEq)]
pub struct TextureInfo {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_levels: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshInfo {
    pub label: String,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// [`GpuDevice`] that keeps a ledger of live resources.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_id: u32,
    textures: BTreeMap<TextureId, TextureInfo>,
    meshes: BTreeMap<MeshBuffersId, MeshInfo>,
    texture_uploads: usize,
    mesh_uploads: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total texture uploads, including released ones.
    pub fn texture_uploads(&self) -> usize {
        self.texture_uploads
    }

    /// Total mesh uploads, including released ones.
    pub fn mesh_uploads(&self) -> usize {
        self.mesh_uploads
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureInfo> {
        self.textures.get(&id)
    }

    pub fn mesh(&self, id: MeshBuffersId) -> Option<&MeshInfo> {
        self.meshes.get(&id)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuDevice for RecordingDevice {
    fn upload_texture(&mut self, label: &str, texture: &TextureData) -> Result<TextureId, RenderError> {
        let id = TextureId(self.next_id());
        self.texture_uploads += 1;
        self.textures.insert(
            id,
            TextureInfo {
                label: label.to_owned(),
                width: texture.width,
                height: texture.height,
                format: texture.format,
                mip_levels: texture.mip_level_count() as usize,
            },
        );
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
        let id = MeshBuffersId(self.next_id());
        self.mesh_uploads += 1;
        self.meshes.insert(
            id,
            MeshInfo {
                label: label.to_owned(),
                vertex_count: vertices.len(),
                index_count: indices.len(),
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

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    UseProgram,
    Uniform { name: String, value: UniformValue },
    BindTexture { unit: u32, sampler: String, texture: TextureId },
    DrawIndexed { buffers: MeshBuffersId, index_count: u32 },
    ResetTextureUnits,
}

/// [`ShaderContext`] that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingShader {
    pub commands: Vec<Command>,
}

impl RecordingShader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = (MeshBuffersId, u32)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawIndexed {
                buffers,
                index_count,
            } => Some((*buffers, *index_count)),
            _ => None,
        })
    }

    pub fn texture_bindings(&self) -> impl Iterator<Item = (u32, &str, TextureId)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::BindTexture {
                unit,
                sampler,
                texture,
            } => Some((*unit, sampler.as_str(), *texture)),
            _ => None,
        })
    }

    /// Last value assigned to a uniform.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|cmd| match cmd {
            Command::Uniform { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }

    fn uniform_set(&mut self, name: &str, value: UniformValue) {
        self.commands.push(Command::Uniform {
            name: name.to_owned(),
            value,
        });
    }
}

impl ShaderContext for RecordingShader {
    fn use_program(&mut self) {
        self.commands.push(Command::UseProgram);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.uniform_set(name, UniformValue::Bool(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.uniform_set(name, UniformValue::Int(value));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.uniform_set(name, UniformValue::Float(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.uniform_set(name, UniformValue::Vec3(value));
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.uniform_set(name, UniformValue::Mat4(value));
    }

    fn bind_texture(&mut self, unit: u32, sampler: &str, texture: TextureId) {
        self.commands.push(Command::BindTexture {
            unit,
            sampler: sampler.to_owned(),
            texture,
        });
    }

    fn draw_indexed(&mut self, buffers: MeshBuffersId, index_count: u32) {
        self.commands.push(Command::DrawIndexed {
            buffers,
            index_count,
        });
    }

    fn reset_texture_units(&mut self) {
        self.commands.push(Command::ResetTextureUnits);
    }
}
