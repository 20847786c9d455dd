use nalgebra::{Vector2, Vector3};
use std::path::Path;

use crate::bounds::BoundingBox;
use crate::group::Group;
use crate::material::MaterialTable;
use crate::objparse::{parse_obj, ObjData, ObjError};
use crate::texture::TextureCache;

// one loaded obj file: shared attribute arrays plus the groups built from them
#[derive(Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub groups: Vec<Group>,
    pub materials: MaterialTable,
    pub bounding_box: BoundingBox,
}

impl Mesh {
    pub fn load(path: &Path, textures: &mut TextureCache) -> Result<Self, ObjError> {
        let data = parse_obj(path)?;
        let model_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mesh = Self::assemble(data, model_dir, textures);
        log::info!(
            "Loaded {} with {} group(s), {} vertices",
            path.display(),
            mesh.groups.len(),
            mesh.vertex_count()
        );
        Ok(mesh)
    }

    /// Turns parsed obj data into something drawable: every group gets its
    /// texture resolved and its interleaved buffer built, then the box is fit.
    pub fn assemble(data: ObjData, model_dir: &Path, textures: &mut TextureCache) -> Self {
        let ObjData {
            vertices,
            tex_coords,
            normals,
            mut groups,
            materials,
        } = data;
        for group in groups.iter_mut() {
            group.load_material_texture(model_dir, textures);
            group.setup_vertex_buffer(&vertices, &tex_coords, &normals);
        }
        let mut mesh = Self {
            vertices,
            tex_coords,
            normals,
            groups,
            materials,
            bounding_box: BoundingBox::default(),
        };
        mesh.calculate_bounding_box();
        mesh
    }

    // from scratch every time; there's no way to shrink a box incrementally
    pub fn calculate_bounding_box(&mut self) {
        self.bounding_box = BoundingBox::from_points(self.vertices.iter());
    }

    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(Group::vertex_count).sum()
    }

    // model space
    #[cfg(test)]
    pub fn ray_intersect(&self, origin: &Vector3<f32>, direction: &Vector3<f32>) -> Option<f32> {
        self.bounding_box.ray_intersect(origin, direction)
    }
}
