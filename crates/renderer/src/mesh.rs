//! GPU-resident mesh: vertex/index data, its textures and the uploaded buffers.

use std::{collections::HashMap, rc::Rc};

use asset::TextureKind;

use crate::{
    RenderError, Vertex,
    device::{GpuDevice, MeshBuffersId, ShaderContext},
    texture_cache::Texture,
};

#[derive(Debug)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Rc<Texture>>,
    /// Sampler name per texture: `{kind}{n}` with a counter per kind.
    samplers: Vec<String>,
    buffers: MeshBuffersId,
}

impl Mesh {
    /// Validates the geometry and uploads it. Every index must address a vertex.
    pub fn build(
        device: &mut dyn GpuDevice,
        label: &str,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<Rc<Texture>>,
    ) -> Result<Self, RenderError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::EmptyMesh);
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::IndexOutOfBounds {
                index,
                vertex_count: vertices.len(),
            });
        }

        let samplers = sampler_names(&textures);
        let buffers = device.upload_mesh(label, &vertices, &indices)?;
        log::trace!(
            "Built mesh '{}': {} vertices, {} indices, {} textures",
            label,
            vertices.len(),
            indices.len(),
            textures.len()
        );

        Ok(Self {
            vertices,
            indices,
            textures,
            samplers,
            buffers,
        })
    }

    /// Binds texture `i` to unit `i`, issues one indexed draw, then resets
    /// the texture units.
    pub fn draw(&self, shader: &mut dyn ShaderContext) {
        for (unit, (texture, sampler)) in self.textures.iter().zip(&self.samplers).enumerate() {
            shader.bind_texture(unit as u32, sampler, texture.id);
        }
        shader.draw_indexed(self.buffers, self.index_count());
        shader.reset_texture_units();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[Rc<Texture>] {
        &self.textures
    }

    pub fn buffers(&self) -> MeshBuffersId {
        self.buffers
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Frees the vertex and index buffers. Textures belong to the cache.
    pub fn release(self, device: &mut dyn GpuDevice) {
        device.release_mesh(self.buffers);
    }
}

fn sampler_names(textures: &[Rc<Texture>]) -> Vec<String> {
    let mut counters: HashMap<TextureKind, u32> = HashMap::new();
    textures
        .iter()
        .map(|texture| {
            let n = counters.entry(texture.kind).or_insert(0);
            let name = format!("{}{}", texture.kind, n);
            *n += 1;
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TextureId,
        headless::{Command, RecordingDevice, RecordingShader},
    };

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    fn texture(id: u32, kind: TextureKind) -> Rc<Texture> {
        Rc::new(Texture {
            id: TextureId(id),
            kind,
            path: format!("tex{id}.png"),
        })
    }

    #[test]
    fn untextured_draw_is_one_call_without_bindings() {
        let mut device = RecordingDevice::new();
        let mesh = Mesh::build(&mut device, "tri", triangle(), vec![0, 1, 2], Vec::new()).unwrap();

        let mut shader = RecordingShader::new();
        mesh.draw(&mut shader);

        assert_eq!(shader.draw_calls().collect::<Vec<_>>(), [(mesh.buffers(), 3)]);
        assert_eq!(shader.texture_bindings().count(), 0);
        assert_eq!(shader.commands.last(), Some(&Command::ResetTextureUnits));
    }

    #[test]
    fn sampler_names_count_per_kind() {
        let mut device = RecordingDevice::new();
        let textures = vec![
            texture(10, TextureKind::Diffuse),
            texture(11, TextureKind::Diffuse),
            texture(12, TextureKind::Specular),
        ];
        let mesh = Mesh::build(&mut device, "tri", triangle(), vec![0, 1, 2], textures).unwrap();

        let mut shader = RecordingShader::new();
        mesh.draw(&mut shader);

        let bindings: Vec<_> = shader.texture_bindings().collect();
        assert_eq!(
            bindings,
            [
                (0, "diffuse0", TextureId(10)),
                (1, "diffuse1", TextureId(11)),
                (2, "specular0", TextureId(12)),
            ]
        );
    }

    #[test]
    fn bindings_precede_the_draw() {
        let mut device = RecordingDevice::new();
        let mesh = Mesh::build(
            &mut device,
            "tri",
            triangle(),
            vec![0, 1, 2],
            vec![texture(5, TextureKind::Diffuse)],
        )
        .unwrap();

        let mut shader = RecordingShader::new();
        mesh.draw(&mut shader);
        assert!(matches!(
            shader.commands.as_slice(),
            [
                Command::BindTexture { unit: 0, .. },
                Command::DrawIndexed { index_count: 3, .. },
                Command::ResetTextureUnits,
            ]
        ));
    }

    #[test]
    fn rejects_empty_geometry() {
        let mut device = RecordingDevice::new();
        assert!(matches!(
            Mesh::build(&mut device, "empty", Vec::new(), vec![0, 1, 2], Vec::new()),
            Err(RenderError::EmptyMesh)
        ));
        assert!(matches!(
            Mesh::build(&mut device, "empty", triangle(), Vec::new(), Vec::new()),
            Err(RenderError::EmptyMesh)
        ));
        assert_eq!(device.mesh_uploads(), 0);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut device = RecordingDevice::new();
        let err = Mesh::build(&mut device, "bad", triangle(), vec![0, 1, 3], Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::IndexOutOfBounds {
                index: 3,
                vertex_count: 3
            }
        ));
        assert_eq!(device.live_meshes(), 0);
    }

    #[test]
    fn release_frees_buffers() {
        let mut device = RecordingDevice::new();
        let mesh = Mesh::build(&mut device, "tri", triangle(), vec![0, 1, 2], Vec::new()).unwrap();
        assert_eq!(device.mesh(mesh.buffers()).map(|m| m.index_count), Some(3));
        mesh.release(&mut device);
        assert_eq!(device.live_meshes(), 0);
    }
}
