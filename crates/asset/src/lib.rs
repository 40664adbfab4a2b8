//! Asset loading/parsers (scenes, meshes, textures).
//! Importers turn files on disk into CPU-side data; nothing here touches the GPU.

pub mod gltf_scene;
pub mod mesh;
pub mod obj;
pub mod scene;
pub mod texture;

pub use mesh::{Face, ImportedMesh};
pub use scene::{ImportedMaterial, ImportedScene, SceneNode, TextureKind, load_scene};
pub use texture::{MipLevel, PixelFormat, TextureData, TextureError};
