//! Converts an imported scene graph into GPU meshes.

use std::rc::Rc;

use asset::{ImportedMesh, ImportedScene, SceneNode, TextureKind};

use crate::{
    Vertex,
    device::GpuDevice,
    mesh::Mesh,
    texture_cache::{Texture, TextureCache},
};

/// Texture kinds bound to meshes, in binding order.
const BOUND_KINDS: [TextureKind; 2] = [TextureKind::Diffuse, TextureKind::Specular];

pub struct SceneImporter<'a> {
    device: &'a mut dyn GpuDevice,
    cache: &'a mut TextureCache,
}

impl<'a> SceneImporter<'a> {
    pub fn new(device: &'a mut dyn GpuDevice, cache: &'a mut TextureCache) -> Self {
        Self { device, cache }
    }

    /// Walks the scene depth-first: a node's own meshes, then its children
    /// left to right. Meshes that fail to build are logged and skipped.
    pub fn import(&mut self, scene: &ImportedScene) -> Vec<Mesh> {
        let mut meshes = Vec::with_capacity(scene.meshes.len());
        self.visit(&scene.root, scene, &mut meshes);
        meshes
    }

    fn visit(&mut self, node: &SceneNode, scene: &ImportedScene, out: &mut Vec<Mesh>) {
        for &index in &node.meshes {
            let Some(imported) = scene.meshes.get(index) else {
                log::warn!("Node '{}' references missing mesh {}", node.name, index);
                continue;
            };
            if let Some(mesh) = self.convert(imported, scene) {
                out.push(mesh);
            }
        }
        for child in &node.children {
            self.visit(child, scene, out);
        }
    }

    fn convert(&mut self, imported: &ImportedMesh, scene: &ImportedScene) -> Option<Mesh> {
        let vertices = build_vertices(imported);
        let indices: Vec<u32> = imported
            .faces
            .iter()
            .flat_map(|face| face.0.iter().copied())
            .collect();
        let textures = self.load_textures(imported, scene);

        match Mesh::build(&mut *self.device, &imported.name, vertices, indices, textures) {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                log::warn!("Skipping mesh '{}': {}", imported.name, e);
                None
            }
        }
    }

    fn load_textures(&mut self, imported: &ImportedMesh, scene: &ImportedScene) -> Vec<Rc<Texture>> {
        let Some(material_index) = imported.material else {
            return Vec::new();
        };
        let Some(material) = scene.materials.get(material_index) else {
            log::warn!(
                "Mesh '{}' references missing material {}",
                imported.name,
                material_index
            );
            return Vec::new();
        };

        let mut textures = Vec::new();
        for kind in BOUND_KINDS {
            for path in material.textures_of(kind) {
                match self.cache.load_or_get(&mut *self.device, path, kind) {
                    Ok(texture) => textures.push(texture),
                    Err(e) => log::warn!("Omitting {} texture '{}': {}", kind, path, e),
                }
            }
        }
        textures
    }
}

fn build_vertices(mesh: &ImportedMesh) -> Vec<Vertex> {
    let uvs = mesh.first_tex_coords();
    if uvs.is_none() {
        log::warn!("Mesh '{}' has no texture coordinates, using (0, 0)", mesh.name);
    }

    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let normal = mesh.normals.get(i).copied().unwrap_or([0.0; 3]);
            let uv = uvs.and_then(|uvs| uvs.get(i).copied()).unwrap_or([0.0; 2]);
            Vertex::new(position, normal, uv)
        })
        .collect()
}
