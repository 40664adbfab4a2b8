//! Per-model texture cache: each texture path is decoded and uploaded once.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use asset::{TextureData, TextureKind};

use crate::{
    RenderError,
    device::{GpuDevice, TextureId},
};

/// An uploaded texture. Owned by the [`TextureCache`]; meshes hold shared
/// references, so the handle is released exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    pub id: TextureId,
    pub kind: TextureKind,
    /// Normalized path relative to the model directory; the dedup key.
    pub path: String,
}

#[derive(Debug)]
pub struct TextureCache {
    base_dir: PathBuf,
    loaded: HashMap<String, Rc<Texture>>,
}

impl TextureCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            loaded: HashMap::new(),
        }
    }

    /// Returns the cached texture for `path`, or decodes and uploads it.
    ///
    /// A hit returns the texture recorded first for that path, whatever
    /// `kind` is requested now. Failed loads are not cached.
    pub fn load_or_get(
        &mut self,
        device: &mut dyn GpuDevice,
        path: &str,
        kind: TextureKind,
    ) -> Result<Rc<Texture>, RenderError> {
        let key = normalize_path(path);
        if let Some(texture) = self.loaded.get(&key) {
            log::trace!("Texture cache hit: {}", key);
            return Ok(Rc::clone(texture));
        }

        let full_path = self.base_dir.join(&key);
        log::debug!("Loading {} texture {:?}", kind, full_path);

        let data = TextureData::load(&full_path)?;
        let id = device.upload_texture(&key, &data)?;

        let texture = Rc::new(Texture {
            id,
            kind,
            path: key.clone(),
        });
        self.loaded.insert(key, Rc::clone(&texture));
        Ok(texture)
    }

    pub fn get(&self, path: &str) -> Option<&Rc<Texture>> {
        self.loaded.get(&normalize_path(path))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Texture>> {
        self.loaded.values()
    }

    /// Releases every uploaded texture.
    pub fn release(self, device: &mut dyn GpuDevice) {
        for texture in self.loaded.into_values() {
            device.release_texture(texture.id);
        }
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_owned()
}
