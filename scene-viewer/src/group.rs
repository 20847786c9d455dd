use nalgebra::{Vector2, Vector3};
use std::path::Path;

use crate::face::Face;
use crate::material::Material;
use crate::texture::{TextureCache, TextureId};

// position<3> + texcoord<2> + normal<3>
// the render pipeline's vertex layout depends on this exact order
pub const FLOATS_PER_VERTEX: usize = 8;

const MISSING_TEX_COORD: [f32; 2] = [0.0, 0.0];
// pointing up instead of zero so unlit faces don't go completely black
const MISSING_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

#[derive(Clone, Debug)]
pub struct Group {
    pub name: String,
    // triangles only; emptied once the vertex buffer is built
    pub faces: Vec<Face>,
    pub material: Material,
    // interleaved, FLOATS_PER_VERTEX floats per vertex
    pub vertices: Vec<f32>,
    // owned by the texture cache
    pub texture: Option<TextureId>,
}

// obj indices are 1-based; 0 or anything past the end is treated as missing
fn lookup<T>(items: &[T], index: u32) -> Option<&T> {
    let index = index.checked_sub(1)?;
    items.get(index as usize)
}

/// Resolves every face's three index lists against the shared attribute arrays.
///
/// Out-of-range positions come out as the origin, missing texcoords as `(0, 0)` and
/// missing normals as `(0, 1, 0)`. Same inputs always give the same buffer.
pub fn build_vertex_buffer(
    faces: &[Face],
    vertices: &[Vector3<f32>],
    tex_coords: &[Vector2<f32>],
    normals: &[Vector3<f32>],
) -> Vec<f32> {
    let count: usize = faces.iter().map(|f| f.vertex_indices.len()).sum();
    let mut buffer = Vec::with_capacity(count * FLOATS_PER_VERTEX);

    for face in faces {
        for (i, &vi) in face.vertex_indices.iter().enumerate() {
            match lookup(vertices, vi) {
                Some(p) => buffer.extend_from_slice(&[p.x, p.y, p.z]),
                None => buffer.extend_from_slice(&[0.0, 0.0, 0.0]),
            }
            match face.texture_indices.get(i).and_then(|&ti| lookup(tex_coords, ti)) {
                Some(t) => buffer.extend_from_slice(&[t.x, t.y]),
                None => buffer.extend_from_slice(&MISSING_TEX_COORD),
            }
            match face.normal_indices.get(i).and_then(|&ni| lookup(normals, ni)) {
                Some(n) => buffer.extend_from_slice(&[n.x, n.y, n.z]),
                None => buffer.extend_from_slice(&MISSING_NORMAL),
            }
        }
    }

    buffer
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: vec![],
            material: Material::default(),
            vertices: vec![],
            texture: None,
        }
    }

    // triangulates on the way in
    pub fn add_face(&mut self, face: &Face) {
        self.faces.extend(face.triangulate());
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    pub fn setup_vertex_buffer(
        &mut self,
        vertices: &[Vector3<f32>],
        tex_coords: &[Vector2<f32>],
        normals: &[Vector3<f32>],
    ) {
        let out_of_range = self
            .faces
            .iter()
            .flat_map(|f| f.vertex_indices.iter())
            .filter(|&&vi| lookup(vertices, vi).is_none())
            .count();
        if out_of_range > 0 {
            log::warn!(
                "Group {:?} references {} vertex position(s) that don't exist",
                self.name,
                out_of_range
            );
        }
        self.vertices = build_vertex_buffer(&self.faces, vertices, tex_coords, normals);
        self.faces = vec![];
        log::debug!("Group {:?} assembled with {} vertices", self.name, self.vertex_count());
    }

    /// Asks the cache for this group's diffuse map, resolved against `model_dir`.
    /// A texture that can't be loaded leaves the group untextured.
    pub fn load_material_texture(&mut self, model_dir: &Path, textures: &mut TextureCache) {
        let file = match self.material.map_kd.as_deref() {
            Some(f) if !f.is_empty() => f,
            _ => return,
        };
        let path = model_dir.join(file);
        match textures.load_texture(&path) {
            Ok(id) => self.texture = Some(id),
            Err(e) => log::warn!("Group {:?} stays untextured: {}", self.name, e),
        }
    }
}
