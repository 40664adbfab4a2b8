//! CPU-side mesh representation produced by scene importers.

/// One polygon of an imported mesh. Importers triangulate, so every face
/// carries exactly three vertex indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face(pub Vec<u32>);

/// Mesh as delivered by an importer: parallel per-vertex arrays plus faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Empty when the source has no normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture-coordinate channels, each with one entry per vertex.
    pub tex_coords: Vec<Vec<[f32; 2]>>,
    pub faces: Vec<Face>,
    /// Index into [`crate::ImportedScene::materials`].
    pub material: Option<usize>,
}

impl ImportedMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Total number of indices once faces are flattened.
    pub fn index_count(&self) -> usize {
        self.faces.iter().map(|face| face.0.len()).sum()
    }

    /// The first texture-coordinate channel, if the mesh has one.
    pub fn first_tex_coords(&self) -> Option<&[[f32; 2]]> {
        self.tex_coords.first().map(Vec::as_slice)
    }

    /// Returns `true` if the mesh has vertices and at least one face.
    pub fn is_valid(&self) -> bool {
        !self.positions.is_empty() && !self.faces.is_empty()
    }
}
