//! glTF 2.0 importer. Keeps the node hierarchy; every triangle primitive
//! becomes one [`ImportedMesh`].

use std::path::Path;

use anyhow::{Context, Result};
use gltf::{buffer, image::Source, mesh::Mode};

use crate::{
    mesh::{Face, ImportedMesh},
    scene::{ImportedMaterial, ImportedScene, SceneNode, TextureKind},
};

/// Load a `.gltf` or `.glb` file. External buffers are resolved relative to
/// the file; only URI-referenced images are recorded as textures.
pub fn load_gltf_from_path(path: impl AsRef<Path>) -> Result<ImportedScene> {
    let path = path.as_ref();
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path)
        .with_context(|| format!("Failed to open glTF file: {}", path.display()))?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)
        .with_context(|| format!("Failed to load glTF buffers for {}", path.display()))?;

    let materials = document.materials().map(|m| import_material(&m)).collect();

    // glTF meshes own several primitives; remember which imported meshes
    // each glTF mesh expanded into so nodes can reference all of them.
    let mut meshes = Vec::new();
    let mut expanded: Vec<Vec<usize>> = Vec::new();
    for mesh in document.meshes() {
        let mut ids = Vec::new();
        for primitive in mesh.primitives() {
            let name = match mesh.name() {
                Some(name) => format!("{}#{}", name, primitive.index()),
                None => format!("mesh{}#{}", mesh.index(), primitive.index()),
            };
            if let Some(imported) = import_primitive(&primitive, &buffers, name) {
                meshes.push(imported);
                ids.push(meshes.len() - 1);
            }
        }
        expanded.push(ids);
    }

    let mut root = SceneNode::new("root");
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        root.children = scene.nodes().map(|node| import_node(&node, &expanded)).collect();
    } else {
        log::warn!("glTF file {} has no scenes", path.display());
    }

    Ok(ImportedScene {
        root,
        meshes,
        materials,
    })
}

fn import_node(node: &gltf::Node<'_>, expanded: &[Vec<usize>]) -> SceneNode {
    let mut out = SceneNode::new(node.name().map_or_else(|| format!("node{}", node.index()), str::to_owned));
    if let Some(mesh) = node.mesh() {
        out.meshes = expanded.get(mesh.index()).cloned().unwrap_or_default();
    }
    out.children = node.children().map(|child| import_node(&child, expanded)).collect();
    out
}

fn import_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[buffer::Data],
    name: String,
) -> Option<ImportedMesh> {
    if primitive.mode() != Mode::Triangles {
        log::warn!("Skipping primitive {} with mode {:?}", name, primitive.mode());
        return None;
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping primitive {} without positions", name);
        return None;
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let normals: Vec<[f32; 3]> = reader.read_normals().map(Iterator::collect).unwrap_or_default();

    let mut tex_coords: Vec<Vec<[f32; 2]>> = Vec::new();
    while let Some(channel) = reader.read_tex_coords(tex_coords.len() as u32) {
        tex_coords.push(channel.into_f32().collect());
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let faces = indices.chunks_exact(3).map(|tri| Face(tri.to_vec())).collect();

    Some(ImportedMesh {
        name,
        positions,
        normals,
        tex_coords,
        faces,
        material: primitive.material().index(),
    })
}

fn import_material(material: &gltf::Material<'_>) -> ImportedMaterial {
    let name = material
        .name()
        .map_or_else(|| format!("material{}", material.index().unwrap_or_default()), str::to_owned);
    let mut out = ImportedMaterial::new(name);

    let base_color = material
        .pbr_metallic_roughness()
        .base_color_texture()
        .map(|info| info.texture());
    let normal = material.normal_texture().map(|info| info.texture());

    for (kind, texture) in [(TextureKind::Diffuse, base_color), (TextureKind::Normal, normal)] {
        let Some(texture) = texture else { continue };
        match texture.source().source() {
            Source::Uri { uri, .. } => out.textures.push((kind, uri.to_owned())),
            Source::View { .. } => {
                log::warn!("Material '{}': embedded {} image is not supported", out.name, kind);
            }
        }
    }

    out
}
