//! OBJ/MTL importer supporting positions, normals, texture coordinates,
//! object/group nodes and per-mesh materials.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    mem,
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::{
    mesh::{Face, ImportedMesh},
    scene::{ImportedMaterial, ImportedScene, SceneNode, TextureKind},
};

const DEFAULT_GROUP: &str = "default";

/// Load an OBJ scene from a file path. `mtllib` references are resolved
/// next to the OBJ file.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<ImportedScene> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    load_obj_from_reader(BufReader::new(file), path.parent())
}

/// Load an OBJ scene from a [`BufRead`] implementation. Without a base
/// directory `mtllib` statements are ignored.
pub fn load_obj_from_reader<R: BufRead>(reader: R, base_dir: Option<&Path>) -> Result<ImportedScene> {
    parse_obj(reader, base_dir)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<ImportedScene> {
    parse_obj(io::Cursor::new(contents), None)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

/// Mesh under construction. Vertices are deduplicated per (v, vt, vn) triple.
#[derive(Default)]
struct PendingMesh {
    name: String,
    material: Option<usize>,
    unique: HashMap<Key, u32>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    has_normals: bool,
    has_uvs: bool,
    faces: Vec<Face>,
}

impl PendingMesh {
    fn new(name: String, material: Option<usize>) -> Self {
        Self {
            name,
            material,
            ..Default::default()
        }
    }

    fn vertex(&mut self, key: Key, attribs: &Attributes, line_no: usize) -> Result<u32> {
        if let Some(&idx) = self.unique.get(&key) {
            return Ok(idx);
        }

        let Key(vi, vti, vni) = key;
        let position = attribs.positions.get(vi).copied().ok_or_else(|| {
            anyhow!("Position index out of bounds on line {}", line_no + 1)
        })?;
        let uv = vti.and_then(|i| attribs.texcoords.get(i).copied());
        let normal = vni.and_then(|i| attribs.normals.get(i).copied());
        self.has_uvs |= uv.is_some();
        self.has_normals |= normal.is_some();

        let idx = u32::try_from(self.positions.len())
            .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
        self.positions.push(position);
        self.uvs.push(uv.unwrap_or([0.0, 0.0]));
        self.normals.push(normal.unwrap_or([0.0, 0.0, 1.0]));
        self.unique.insert(key, idx);
        Ok(idx)
    }

    fn finish(self) -> Option<ImportedMesh> {
        if self.faces.is_empty() {
            return None;
        }
        Some(ImportedMesh {
            name: self.name,
            positions: self.positions,
            normals: if self.has_normals { self.normals } else { Vec::new() },
            tex_coords: if self.has_uvs { vec![self.uvs] } else { Vec::new() },
            faces: self.faces,
            material: self.material,
        })
    }
}

/// File-global attribute pools that faces index into.
#[derive(Default)]
struct Attributes {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
}

struct SceneBuilder<'a> {
    base_dir: Option<&'a Path>,
    meshes: Vec<ImportedMesh>,
    materials: Vec<ImportedMaterial>,
    material_ids: HashMap<String, usize>,
    nodes: Vec<SceneNode>,
    current_node: Option<usize>,
    group: String,
    pending: PendingMesh,
}

impl<'a> SceneBuilder<'a> {
    fn new(base_dir: Option<&'a Path>) -> Self {
        Self {
            base_dir,
            meshes: Vec::new(),
            materials: Vec::new(),
            material_ids: HashMap::new(),
            nodes: Vec::new(),
            current_node: None,
            group: DEFAULT_GROUP.to_owned(),
            pending: PendingMesh::new(DEFAULT_GROUP.to_owned(), None),
        }
    }

    /// Close the pending mesh (if it has faces) and attach it to the node of
    /// the current group, creating that node on first use.
    fn flush(&mut self) {
        let next = PendingMesh::new(self.group.clone(), self.pending.material);
        let Some(mesh) = mem::replace(&mut self.pending, next).finish() else {
            return;
        };

        let node = match self.current_node {
            Some(node) => node,
            None => {
                self.nodes.push(SceneNode::new(mesh.name.clone()));
                let node = self.nodes.len() - 1;
                self.current_node = Some(node);
                node
            }
        };
        self.meshes.push(mesh);
        self.nodes[node].meshes.push(self.meshes.len() - 1);
    }

    fn begin_group(&mut self, name: &str) {
        self.flush();
        self.group = if name.is_empty() { DEFAULT_GROUP.to_owned() } else { name.to_owned() };
        self.current_node = None;
        self.pending.name = self.group.clone();
    }

    fn use_material(&mut self, name: &str) {
        let material = self.material_ids.get(name).copied();
        if material.is_none() {
            log::warn!("OBJ references unknown material '{}'", name);
        }
        if material != self.pending.material {
            self.flush();
            self.pending.material = material;
        }
    }

    fn load_library(&mut self, file_name: &str) {
        let Some(base_dir) = self.base_dir else {
            log::debug!("Ignoring mtllib '{}' (no base directory)", file_name);
            return;
        };
        let path = base_dir.join(file_name);
        let parsed = File::open(&path)
            .with_context(|| format!("Failed to open MTL file: {}", path.display()))
            .and_then(|file| parse_mtl(BufReader::new(file)));
        match parsed {
            Ok(materials) => {
                for material in materials {
                    let id = self.materials.len();
                    self.material_ids.entry(material.name.clone()).or_insert(id);
                    self.materials.push(material);
                }
            }
            Err(e) => log::warn!("{:#}", e),
        }
    }

    fn finish(mut self) -> ImportedScene {
        self.flush();
        let mut root = SceneNode::new("root");
        root.children = self.nodes;
        ImportedScene {
            root,
            meshes: self.meshes,
            materials: self.materials,
        }
    }
}

fn parse_obj<R: BufRead>(reader: R, base_dir: Option<&Path>) -> Result<ImportedScene> {
    let mut attribs = Attributes::default();
    let mut builder = SceneBuilder::new(base_dir);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                attribs.positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                attribs.texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                attribs.normals.push([nx, ny, nz]);
            }
            "f" => {
                let mut face_indices: Vec<u32> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        attribs.positions.len(),
                        attribs.texcoords.len(),
                        attribs.normals.len(),
                        line_no,
                    )?;
                    face_indices.push(builder.pending.vertex(Key(vi, vti, vni), &attribs, line_no)?);
                }

                if face_indices.len() < 3 {
                    log::warn!("Skipping degenerate face on line {}", line_no + 1);
                    continue;
                }
                // Triangulate fan
                for tri in 1..(face_indices.len() - 1) {
                    builder.pending.faces.push(Face(vec![
                        face_indices[0],
                        face_indices[tri],
                        face_indices[tri + 1],
                    ]));
                }
            }
            "o" | "g" => builder.begin_group(&rest_of_line(trimmed, tag)),
            "usemtl" => builder.use_material(&rest_of_line(trimmed, tag)),
            "mtllib" => {
                for file_name in parts {
                    builder.load_library(file_name);
                }
            }
            _ => {
                // Ignore other directives (s/l/p/etc.)
            }
        }
    }

    let scene = builder.finish();
    if scene.meshes.is_empty() {
        anyhow::bail!("OBJ contained no triangles");
    }

    log::debug!(
        "Parsed OBJ: {} meshes, {} materials, {} faces",
        scene.meshes.len(),
        scene.materials.len(),
        scene.face_count()
    );
    Ok(scene)
}

/// Parse a material library. Texture statements keep only the file name
/// (the last token), dropping map options such as `-s 1 1 1`.
pub fn parse_mtl<R: BufRead>(reader: R) -> Result<Vec<ImportedMaterial>> {
    let mut materials: Vec<ImportedMaterial> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read MTL line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else { continue };

        let kind = match tag {
            "newmtl" => {
                materials.push(ImportedMaterial::new(rest_of_line(trimmed, tag)));
                continue;
            }
            "map_Kd" => TextureKind::Diffuse,
            "map_Ks" => TextureKind::Specular,
            "map_Bump" | "map_bump" | "bump" | "norm" => TextureKind::Normal,
            _ => continue,
        };

        let path = parts
            .last()
            .ok_or_else(|| anyhow!("Missing texture path on MTL line {}", line_no + 1))?;
        let material = materials
            .last_mut()
            .ok_or_else(|| anyhow!("Texture before 'newmtl' on MTL line {}", line_no + 1))?;
        material.textures.push((kind, path.to_owned()));
    }

    Ok(materials)
}

fn rest_of_line(line: &str, tag: &str) -> String {
    line[tag.len()..].trim().to_owned()
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i32>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 {
        (raw - 1) as isize
    } else {
        (len as isize) + (raw as isize)
    };

    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let scene = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, [Face(vec![0, 1, 2])]);
        assert_eq!(mesh.first_tex_coords().map(<[_]>::len), Some(3));
        assert_eq!(mesh.normals.len(), 3);
        assert!(mesh.material.is_none());
        assert_eq!(scene.root.children.len(), 1);
        assert_eq!(scene.root.children[0].meshes, [0]);
    }

    #[test]
    fn missing_uvs_and_normals_leave_channels_empty() {
        let scene = load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = &scene.meshes[0];
        assert!(mesh.tex_coords.is_empty());
        assert!(mesh.normals.is_empty());
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let scene = load_obj_from_str(src).unwrap();
        assert_eq!(scene.meshes[0].faces, [Face(vec![0, 1, 2]), Face(vec![0, 2, 3])]);
        assert!(scene.meshes[0].faces.iter().all(|f| f.0.len() == 3));
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let scene = load_obj_from_str(src).unwrap();
        assert_eq!(scene.meshes[0].positions[2], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn groups_become_nodes_with_local_indices() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
o first
f 1 2 3
o second
f 2 4 3
";
        let scene = load_obj_from_str(src).unwrap();
        assert_eq!(scene.meshes.len(), 2);
        let names: Vec<_> = scene.root.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(scene.root.children[1].meshes, [1]);
        // The second mesh indexes into its own vertex list.
        assert_eq!(scene.meshes[1].faces, [Face(vec![0, 1, 2])]);
        assert_eq!(scene.meshes[1].positions[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_index_is_rejected() {
        assert!(load_obj_from_str("v 0 0 0\nf 0 1 1\n").is_err());
    }

    #[test]
    fn no_faces_is_an_error() {
        assert!(load_obj_from_str("v 0 0 0\n").is_err());
    }

    #[test]
    fn mtl_textures_by_kind() {
        let src = "\
newmtl wood
Kd 1 1 1
map_Kd -s 1 1 1 wood_diffuse.png
map_Ks wood_spec.png
newmtl metal
map_Kd metal.jpg
map_Bump metal_n.png
";
        let mats = parse_mtl(io::Cursor::new(src)).unwrap();
        assert_eq!(mats.len(), 2);
        assert_eq!(mats[0].name, "wood");
        assert_eq!(mats[0].textures_of(TextureKind::Diffuse).collect::<Vec<_>>(), ["wood_diffuse.png"]);
        assert_eq!(mats[0].textures_of(TextureKind::Specular).collect::<Vec<_>>(), ["wood_spec.png"]);
        assert_eq!(mats[1].textures_of(TextureKind::Normal).collect::<Vec<_>>(), ["metal_n.png"]);
    }

    #[test]
    fn usemtl_splits_meshes_and_resolves_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scene.mtl"),
            "newmtl a\nmap_Kd a.png\nnewmtl b\nmap_Kd b.png\n",
        )
        .unwrap();
        let obj_path = dir.path().join("scene.obj");
        std::fs::write(
            &obj_path,
            "mtllib scene.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl a\nf 1 2 3\nusemtl b\nf 1 3 2\n",
        )
        .unwrap();

        let scene = load_obj_from_path(&obj_path).unwrap();
        assert_eq!(scene.materials.len(), 2);
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[0].material, Some(0));
        assert_eq!(scene.meshes[1].material, Some(1));
        // Both meshes belong to the implicit default group.
        assert_eq!(scene.root.children.len(), 1);
        assert_eq!(scene.root.children[0].meshes, [0, 1]);
    }

    #[test]
    fn missing_library_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let obj_path = dir.path().join("scene.obj");
        std::fs::write(&obj_path, "mtllib nope.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl x\nf 1 2 3\n")
            .unwrap();
        let scene = load_obj_from_path(&obj_path).unwrap();
        assert!(scene.materials.is_empty());
        assert_eq!(scene.meshes[0].material, None);
    }
}
