//! Imported scene graph: nodes referencing meshes, meshes referencing materials.

use std::{ffi::OsStr, fmt, path::Path};

use anyhow::{Result, anyhow, bail};

use crate::{gltf_scene, mesh::ImportedMesh, obj};

/// Semantic role of a texture referenced by a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
}

impl TextureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "diffuse",
            TextureKind::Specular => "specular",
            TextureKind::Normal => "normal",
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Material: named list of texture references. Paths are relative to the
/// scene file's directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub textures: Vec<(TextureKind, String)>,
}

impl ImportedMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: Vec::new(),
        }
    }

    /// Texture paths of one kind, in declaration order.
    pub fn textures_of(&self, kind: TextureKind) -> impl Iterator<Item = &str> + '_ {
        self.textures
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, path)| path.as_str())
    }
}

/// Scene graph node. `meshes` index into [`ImportedScene::meshes`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedScene {
    pub root: SceneNode,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
}

impl ImportedScene {
    /// Number of faces across all meshes.
    pub fn face_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.faces.len()).sum()
    }
}

/// Load a scene file, picking the importer by extension.
pub fn load_scene(path: impl AsRef<Path>) -> Result<ImportedScene> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| anyhow!("Scene file has no extension: {}", path.display()))?;

    log::info!("Importing scene {:?}", path);

    match ext.as_str() {
        "obj" => obj::load_obj_from_path(path),
        "gltf" | "glb" => gltf_scene::load_gltf_from_path(path),
        other => bail!("Unsupported scene format '{}': {}", other, path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_textures_filtered_by_kind() {
        let mut mat = ImportedMaterial::new("wood");
        mat.textures.push((TextureKind::Diffuse, "a.png".into()));
        mat.textures.push((TextureKind::Specular, "s.png".into()));
        mat.textures.push((TextureKind::Diffuse, "b.png".into()));

        let diffuse: Vec<_> = mat.textures_of(TextureKind::Diffuse).collect();
        assert_eq!(diffuse, ["a.png", "b.png"]);
        assert_eq!(mat.textures_of(TextureKind::Normal).count(), 0);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_scene("model.fbx").unwrap_err();
        assert!(err.to_string().contains("Unsupported scene format"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_scene("does/not/exist.obj").is_err());
    }
}
