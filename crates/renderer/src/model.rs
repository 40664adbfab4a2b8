//! A loaded model: the meshes of one scene file plus its texture cache.

use std::{
    mem,
    path::{Path, PathBuf},
};

use crate::{
    device::{GpuDevice, ShaderContext},
    import::SceneImporter,
    mesh::Mesh,
    texture_cache::TextureCache,
};

#[derive(Debug)]
pub struct Model {
    meshes: Vec<Mesh>,
    directory: PathBuf,
    textures: TextureCache,
}

impl Model {
    pub fn empty() -> Self {
        Self {
            meshes: Vec::new(),
            directory: PathBuf::new(),
            textures: TextureCache::new(PathBuf::new()),
        }
    }

    /// Loads the scene at `path`. A file that cannot be parsed yields an
    /// empty model.
    pub fn from_path(device: &mut dyn GpuDevice, path: impl AsRef<Path>) -> Self {
        let mut model = Self::empty();
        model.load(device, path);
        model
    }

    /// Replaces the contents with the scene at `path`, releasing whatever was
    /// loaded before. Load failures are logged and leave the model empty.
    pub fn load(&mut self, device: &mut dyn GpuDevice, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.clear(device);

        self.directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.textures = TextureCache::new(self.directory.clone());

        let scene = match asset::load_scene(path) {
            Ok(scene) => scene,
            Err(e) => {
                log::error!("Failed to load model {:?}: {:#}", path, e);
                return;
            }
        };

        self.meshes = SceneImporter::new(device, &mut self.textures).import(&scene);
        log::info!(
            "Loaded model {:?}: {} meshes, {} textures, {} indices",
            path,
            self.meshes.len(),
            self.textures.len(),
            self.index_count()
        );
    }

    /// Draws every mesh in load order.
    pub fn draw(&self, shader: &mut dyn ShaderContext) {
        for mesh in &self.meshes {
            mesh.draw(shader);
        }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.index_count() as usize).sum()
    }

    /// Frees every mesh buffer and texture owned by the model.
    pub fn release(mut self, device: &mut dyn GpuDevice) {
        self.clear(device);
    }

    fn clear(&mut self, device: &mut dyn GpuDevice) {
        for mesh in self.meshes.drain(..) {
            mesh.release(device);
        }
        mem::replace(&mut self.textures, TextureCache::new(PathBuf::new())).release(device);
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{RecordingDevice, RecordingShader};
    use image::{Rgb, RgbImage};
    use std::fs;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn write_png(dir: &Path, name: &str) {
        RgbImage::from_pixel(4, 4, Rgb([120, 80, 40]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn single_triangle_without_uvs_or_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        fs::write(&path, TRIANGLE).unwrap();

        let mut device = RecordingDevice::new();
        let model = Model::from_path(&mut device, &path);

        assert_eq!(model.meshes().len(), 1);
        let mesh = &model.meshes()[0];
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.indices(), [0, 1, 2]);
        assert!(mesh.vertices().iter().all(|v| v.uv == [0.0, 0.0]));
        assert!(mesh.textures().is_empty());
        assert_eq!(model.directory(), dir.path());

        let mut shader = RecordingShader::new();
        model.draw(&mut shader);
        assert_eq!(shader.draw_calls().map(|(_, n)| n).collect::<Vec<_>>(), [3]);
        assert_eq!(shader.texture_bindings().count(), 0);
    }

    #[test]
    fn nonexistent_path_gives_empty_model() {
        let mut device = RecordingDevice::new();
        let model = Model::from_path(&mut device, "does/not/exist.obj");
        assert!(model.is_empty());
        assert_eq!(device.mesh_uploads(), 0);

        let mut shader = RecordingShader::new();
        model.draw(&mut shader);
        assert!(shader.commands.is_empty());
    }

    #[test]
    fn unparseable_file_gives_empty_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.obj");
        fs::write(&path, "v 0 0 0\nv 1 0 0\nl 1 2\n").unwrap();

        let mut device = RecordingDevice::new();
        assert!(Model::from_path(&mut device, &path).is_empty());
    }

    #[test]
    fn texture_shared_across_meshes_is_uploaded_once() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wood.png");
        fs::write(
            dir.path().join("scene.mtl"),
            "newmtl a\nmap_Kd wood.png\nnewmtl b\nmap_Kd ./wood.png\nmap_Ks missing.png\n",
        )
        .unwrap();
        let path = dir.path().join("scene.obj");
        fs::write(
            &path,
            "mtllib scene.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\nvt 1 1\n\
             o first\nusemtl a\nf 1/1 2/2 3/3\n\
             o second\nusemtl b\nf 2/2 4/4 3/3\n",
        )
        .unwrap();

        let mut device = RecordingDevice::new();
        let model = Model::from_path(&mut device, &path);

        assert_eq!(model.meshes().len(), 2);
        let first = &model.meshes()[0].textures()[0];
        let second = &model.meshes()[1].textures()[0];
        assert_eq!(first.id, second.id);
        // The missing specular map is omitted.
        assert_eq!(model.meshes()[1].textures().len(), 1);
        assert_eq!(device.texture_uploads(), 1);
        assert_eq!(model.textures().len(), 1);
    }

    #[test]
    fn indices_match_faces_and_stay_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 2 0 0\nf 1 2 3 4\nf 2 5 3\n",
        )
        .unwrap();
        let scene = asset::load_scene(&path).unwrap();

        let mut device = RecordingDevice::new();
        let model = Model::from_path(&mut device, &path);

        assert_eq!(model.index_count(), 3 * scene.face_count());
        for mesh in model.meshes() {
            let n = mesh.vertices().len() as u32;
            assert!(mesh.indices().iter().all(|&i| i < n));
        }
    }

    #[test]
    fn reload_and_release_free_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wood.png");
        fs::write(dir.path().join("m.mtl"), "newmtl wood\nmap_Kd wood.png\n").unwrap();
        let path = dir.path().join("m.obj");
        fs::write(&path, format!("mtllib m.mtl\nusemtl wood\n{TRIANGLE}")).unwrap();

        let mut device = RecordingDevice::new();
        let mut model = Model::from_path(&mut device, &path);
        assert_eq!((device.live_meshes(), device.live_textures()), (1, 1));

        model.load(&mut device, &path);
        assert_eq!((device.live_meshes(), device.live_textures()), (1, 1));
        assert_eq!(device.mesh_uploads(), 2);

        model.release(&mut device);
        assert_eq!((device.live_meshes(), device.live_textures()), (0, 0));
    }
}
