// line-at-a-time obj reader
// keeps the three attribute streams separate, exactly as the file indexes them;
// faces keep their own per-attribute indices and the group assembler
// stitches the interleaved vertices together afterwards

use nalgebra::{Vector2, Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use thiserror::Error;

use crate::face::Face;
use crate::group::Group;
use crate::material::{load_mtl, MaterialTable};

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("couldn't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected a number, found {token:?}")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: `{keyword}` is missing a value")]
    MissingValue { line: usize, keyword: String },
    #[error("line {line}: face vertex {token:?} has no position index")]
    MissingVertexIndex { line: usize, token: String },
}

#[derive(Debug, Default)]
pub struct ObjData {
    pub vertices: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub groups: Vec<Group>,
    pub materials: MaterialTable,
}

// a number that's missing or doesn't parse, before it's tied to a file kind
#[derive(Debug)]
pub(crate) enum NumberError {
    Invalid { line: usize, token: String },
    Missing { line: usize, keyword: String },
}

impl From<NumberError> for ObjError {
    fn from(e: NumberError) -> Self {
        match e {
            NumberError::Invalid { line, token } => ObjError::InvalidNumber { line, token },
            NumberError::Missing { line, keyword } => ObjError::MissingValue { line, keyword },
        }
    }
}

pub(crate) fn parse_floats<const N: usize>(
    tokens: &mut SplitWhitespace,
    line: usize,
    keyword: &str,
) -> Result<[f32; N], NumberError> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        let token = tokens.next().ok_or_else(|| NumberError::Missing {
            line,
            keyword: keyword.to_string(),
        })?;
        *slot = token.parse().map_err(|_| NumberError::Invalid {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(out)
}

// negative indices count back from the last attribute read so far;
// one that still names nothing becomes 0 and gets the fallback attribute
fn parse_index(token: &str, line: usize, count: usize) -> Result<u32, ObjError> {
    let index: i64 = token.parse().map_err(|_| ObjError::InvalidNumber {
        line,
        token: token.to_string(),
    })?;
    let resolved = if index < 0 {
        count as i64 + 1 + index
    } else {
        index
    };
    match u32::try_from(resolved) {
        Ok(i) if i > 0 => Ok(i),
        _ => {
            log::warn!("line {}: face index {} is out of range", line, token);
            Ok(0)
        }
    }
}

// `v`, `v/t`, `v//n`, `v/t/n`
fn parse_face(tokens: SplitWhitespace, line: usize, data: &ObjData) -> Result<Face, ObjError> {
    let mut face = Face::default();
    for vtx in tokens {
        let mut parts = vtx.split('/');
        match parts.next() {
            Some(p) if !p.is_empty() => face
                .vertex_indices
                .push(parse_index(p, line, data.vertices.len())?),
            _ => {
                return Err(ObjError::MissingVertexIndex {
                    line,
                    token: vtx.to_string(),
                })
            }
        }
        if let Some(t) = parts.next().filter(|t| !t.is_empty()) {
            face.texture_indices
                .push(parse_index(t, line, data.tex_coords.len())?);
        }
        if let Some(n) = parts.next().filter(|n| !n.is_empty()) {
            face.normal_indices
                .push(parse_index(n, line, data.normals.len())?);
        }
    }

    // a list that skips some vertices can't be paired up by position
    let n = face.vertex_indices.len();
    for (kind, list) in [
        ("texture", &mut face.texture_indices),
        ("normal", &mut face.normal_indices),
    ] {
        if !list.is_empty() && list.len() != n {
            log::warn!(
                "line {}: only {} of {} face vertices have {} indices, ignoring them",
                line,
                list.len(),
                n,
                kind
            );
            list.clear();
        }
    }
    Ok(face)
}

// opens a fresh group and hands it whatever material is current
fn open_group(data: &mut ObjData, name: &str, current_material: Option<&str>) -> usize {
    let mut group = Group::new(name);
    if let Some(material) = current_material.and_then(|m| data.materials.get(m)) {
        group.material = material.clone();
    }
    data.groups.push(group);
    data.groups.len() - 1
}

pub fn parse_obj(path: &Path) -> Result<ObjData, ObjError> {
    let file = File::open(path).map_err(|source| ObjError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_obj_reader(BufReader::new(file), path)
}

/// Parses obj statements from `reader`. `origin` is the path of the obj file;
/// `mtllib` references are looked up next to it.
pub fn parse_obj_reader(reader: impl BufRead, origin: &Path) -> Result<ObjData, ObjError> {
    let directory = origin.parent().unwrap_or_else(|| Path::new(""));
    let mut data = ObjData::default();
    let mut current_group: Option<usize> = None;
    let mut current_material: Option<String> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ObjError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
        let lineno = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let prefix = match tokens.next() {
            Some(p) => p,
            None => continue,
        };

        match prefix {
            "mtllib" => {
                for file in tokens {
                    let mtl_path = directory.join(file);
                    match load_mtl(&mtl_path) {
                        Ok(materials) => data.materials.extend(materials),
                        // geometry still renders without it
                        Err(e) => log::warn!("Skipping material library: {}", e),
                    }
                }
            }
            "v" => data
                .vertices
                .push(parse_floats::<3>(&mut tokens, lineno, prefix)?.into()),
            "vt" => data
                .tex_coords
                .push(parse_floats::<2>(&mut tokens, lineno, prefix)?.into()),
            "vn" => data
                .normals
                .push(parse_floats::<3>(&mut tokens, lineno, prefix)?.into()),
            "g" | "o" => {
                let name = tokens.next().unwrap_or("default");
                current_group = Some(open_group(&mut data, name, current_material.as_deref()));
            }
            "usemtl" => {
                let name = match tokens.next() {
                    Some(n) => n,
                    None => continue,
                };
                match (current_group, data.materials.get(name)) {
                    // replaces the material of the whole group, faces already added included
                    (Some(g), Some(material)) => data.groups[g].material = material.clone(),
                    (_, None) => log::warn!(
                        "{}:{}: unknown material {:?}",
                        origin.display(),
                        lineno,
                        name
                    ),
                    _ => {}
                }
                current_material = Some(name.to_string());
            }
            "f" => {
                let face = parse_face(tokens, lineno, &data)?;
                let g = match current_group {
                    Some(g) => g,
                    None => {
                        let g = open_group(&mut data, "default", current_material.as_deref());
                        current_group = Some(g);
                        g
                    }
                };
                data.groups[g].add_face(&face);
            }
            _ => {}
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(src: &str) -> ObjData {
        parse_obj_reader(src.as_bytes(), Path::new("model.obj")).unwrap()
    }

    #[test]
    fn attribute_streams_are_read_in_order() {
        let data = parse(
            "# a comment\n\
             v 1 2 3\n\
             \t v -1.5 0 2e1  \n\
             vt 0.25 0.75\n\
             vn 0 0 1\n",
        );
        assert_eq!(
            data.vertices,
            vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.5, 0.0, 20.0)]
        );
        assert_eq!(data.tex_coords, vec![Vector2::new(0.25, 0.75)]);
        assert_eq!(data.normals, vec![Vector3::new(0.0, 0.0, 1.0)]);
        assert!(data.groups.is_empty());
    }

    #[test]
    fn quad_without_group_lands_in_default_group_as_two_triangles() {
        let data = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n");
        assert_eq!(data.groups.len(), 1);
        let group = &data.groups[0];
        assert_eq!(group.name, "default");
        assert_eq!(group.faces.len(), 2);
        assert_eq!(group.faces[0].vertex_indices, vec![1, 2, 3]);
        assert_eq!(group.faces[1].vertex_indices, vec![1, 3, 4]);
        assert!(group.faces.iter().all(|f| f.texture_indices.is_empty()));
        assert!(group.faces.iter().all(|f| f.normal_indices.is_empty()));
    }

    #[test]
    fn face_token_forms() {
        let data = parse("f 1/2/3 4/5/6 7/8/9\nf 1//3 4//6 7//9\nf 1/2 3/4 5/6\n");
        let faces = &data.groups[0].faces;
        assert_eq!(faces[0], Face::new(vec![1, 4, 7], vec![2, 5, 8], vec![3, 6, 9]));
        assert_eq!(faces[1], Face::new(vec![1, 4, 7], vec![], vec![3, 6, 9]));
        assert_eq!(faces[2], Face::new(vec![1, 3, 5], vec![2, 4, 6], vec![]));
    }

    #[test]
    fn negative_indices_count_back_from_the_end() {
        let data = parse(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvt 1 0\nvt 1 1\n\
             f -3/-3 -2/-2 -1/-1\n\
             v 0 1 0\n\
             f -4 -2 -1\n",
        );
        assert_eq!(data.groups.len(), 1);
        let faces = &data.groups[0].faces;
        assert_eq!(faces[0], Face::new(vec![1, 2, 3], vec![1, 2, 3], vec![]));
        assert_eq!(faces[1].vertex_indices, vec![1, 3, 4]);
    }

    #[test]
    fn unresolvable_indices_fall_back_instead_of_failing() {
        let data = parse("v 0 0 0\nf -3 -2 -1\nf 1 2 99999999999\n");
        assert_eq!(data.groups.len(), 1);
        let faces = &data.groups[0].faces;
        assert_eq!(faces[0].vertex_indices, vec![0, 0, 1]);
        assert_eq!(faces[1].vertex_indices, vec![1, 2, 0]);
    }

    #[test]
    fn partial_attribute_lists_are_dropped() {
        let data = parse("f 1/1 2 3/3\nf 1//1 2//2 3\nf 1/1/1 2/2/2 3/3\n");
        let faces = &data.groups[0].faces;
        assert_eq!(faces[0], Face::new(vec![1, 2, 3], vec![], vec![]));
        assert_eq!(faces[1], Face::new(vec![1, 2, 3], vec![], vec![]));
        assert_eq!(faces[2], Face::new(vec![1, 2, 3], vec![1, 2, 3], vec![]));
    }

    #[test]
    fn groups_and_objects_open_new_groups() {
        let data = parse("g first\nf 1 2 3\no\nf 1 2 3\ng third\n");
        let names: Vec<_> = data.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["first", "default", "third"]);
        assert!(data.groups[2].faces.is_empty());
    }

    #[test]
    fn degenerate_face_adds_nothing() {
        let data = parse("f 1 2\n");
        assert_eq!(data.groups.len(), 1);
        assert!(data.groups[0].faces.is_empty());
    }

    #[test]
    fn malformed_vertex_is_an_error() {
        let err = parse_obj_reader("v 1 2 3\nv 1 two 3\n".as_bytes(), Path::new("m.obj")).unwrap_err();
        assert!(matches!(err, ObjError::InvalidNumber { line: 2, .. }));
        let err = parse_obj_reader("v 1 2\n".as_bytes(), Path::new("m.obj")).unwrap_err();
        assert!(matches!(err, ObjError::MissingValue { line: 1, .. }));
    }

    #[test]
    fn malformed_face_is_an_error() {
        let err = parse_obj_reader("f 1 x 3\n".as_bytes(), Path::new("m.obj")).unwrap_err();
        assert!(matches!(err, ObjError::InvalidNumber { line: 1, .. }));
        let err = parse_obj_reader("f 1 /2/3 3\n".as_bytes(), Path::new("m.obj")).unwrap_err();
        assert!(matches!(err, ObjError::MissingVertexIndex { line: 1, .. }));
    }

    #[test]
    fn missing_obj_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_obj(&dir.path().join("missing.obj")).unwrap_err();
        assert!(matches!(err, ObjError::Io { .. }));
    }

    #[test]
    fn materials_follow_mtllib_and_usemtl() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("colours.mtl"),
            "newmtl Red\nKd 1 0 0\nnewmtl Blue\nKd 0 0 1\nmap_Kd blue.png\n",
        )
        .unwrap();
        let obj = dir.path().join("scene.obj");
        fs::write(
            &obj,
            "mtllib colours.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             usemtl Red\n\
             g a\nf 1 2 3\n\
             g b\nf 1 2 3\nusemtl Blue\nf 1 2 3\n\
             usemtl Nope\n",
        )
        .unwrap();
        let data = parse_obj(&obj).unwrap();
        assert_eq!(data.materials.len(), 2);
        assert_eq!(data.groups.len(), 2);
        // picked up from the pending usemtl when the group opened
        assert_eq!(data.groups[0].material.name, "Red");
        // the last usemtl wins for the whole group
        assert_eq!(data.groups[1].material.name, "Blue");
        assert_eq!(data.groups[1].faces.len(), 2);
        assert!(data.groups[1].material.has_texture());
    }

    #[test]
    fn missing_mtllib_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("lonely.obj");
        fs::write(&obj, "mtllib gone.mtl\nusemtl Red\nv 0 0 0\nf 1 1 1\n").unwrap();
        let data = parse_obj(&obj).unwrap();
        assert!(data.materials.is_empty());
        assert_eq!(data.groups[0].material, crate::material::Material::default());
    }

    #[test]
    fn group_material_is_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.mtl"), "newmtl Red\nKd 1 0 0\n").unwrap();
        let obj = dir.path().join("m.obj");
        fs::write(&obj, "mtllib m.mtl\ng a\nusemtl Red\n").unwrap();
        let mut data = parse_obj(&obj).unwrap();
        data.materials.get_mut("Red").unwrap().kd = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(data.groups[0].material.kd, Vector3::new(1.0, 0.0, 0.0));
    }
}
