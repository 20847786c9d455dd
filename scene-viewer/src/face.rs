// one polygon as read off an `f` line
// indices are kept exactly as written in the file (1-based);
// they only get decremented when the group assembler dereferences them

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub vertex_indices: Vec<u32>,
    // empty when the face has no texcoords
    pub texture_indices: Vec<u32>,
    // empty when the face has no normals
    pub normal_indices: Vec<u32>,
}

impl Face {
    pub fn new(vertex_indices: Vec<u32>, texture_indices: Vec<u32>, normal_indices: Vec<u32>) -> Self {
        Self {
            vertex_indices,
            texture_indices,
            normal_indices,
        }
    }

    /// Fan triangulation around the first vertex.
    ///
    /// Fewer than 3 vertices gives nothing, a triangle comes back as a copy of
    /// itself, and an n-gon gives n-2 triangles `{0, i, i+1}`.
    /// Only correct for convex planar polygons; concave ones will come out wrong.
    pub fn triangulate(&self) -> Vec<Face> {
        let n = self.vertex_indices.len();
        if n < 3 {
            return vec![];
        }
        if n == 3 {
            return vec![self.clone()];
        }

        // a texcoord/normal list that doesn't line up with the positions
        // can't be fanned out, so the triangles just go without it
        let fan = |list: &[u32], i: usize| -> Vec<u32> {
            if list.len() == n {
                vec![list[0], list[i], list[i + 1]]
            } else {
                vec![]
            }
        };

        (1..n - 1)
            .map(|i| Face {
                vertex_indices: fan(&self.vertex_indices, i),
                texture_indices: fan(&self.texture_indices, i),
                normal_indices: fan(&self.normal_indices, i),
            })
            .collect()
    }
}
