use nalgebra::{Matrix4, Vector3};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use thiserror::Error;

use crate::bounds::BoundingBox;
use crate::mesh::Mesh;
use crate::objparse::{parse_floats, NumberError, ObjError};
use crate::texture::TextureCache;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("couldn't read scene config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected a number, found {token:?}")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: `{keyword}` is missing a value")]
    MissingValue { line: usize, keyword: String },
    #[error("line {line}: {value:?} isn't a valid {what}")]
    InvalidValue {
        line: usize,
        what: &'static str,
        value: String,
    },
}

impl From<NumberError> for SceneError {
    fn from(e: NumberError) -> Self {
        match e {
            NumberError::Invalid { line, token } => SceneError::InvalidNumber { line, token },
            NumberError::Missing { line, keyword } => SceneError::MissingValue { line, keyword },
        }
    }
}

fn flag(parts: &mut SplitWhitespace, line: usize, keyword: &str) -> Result<bool, SceneError> {
    match parts.next() {
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => Err(SceneError::InvalidValue {
            line,
            what: "flag",
            value: other.to_string(),
        }),
        None => Err(SceneError::MissingValue {
            line,
            keyword: keyword.to_string(),
        }),
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub position: Vector3<f32>,
    pub intensity: Vector3<f32>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 10.0, 5.0),
            intensity: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

// c1 + c2*d + c3*d^2
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.045,
            quadratic: 0.0075,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum FogKind {
    Linear = 0,
    Exponential = 1,
    ExponentialSquared = 2,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fog {
    pub enabled: bool,
    pub color: Vector3<f32>,
    pub density: f32,
    pub start: f32,
    pub end: f32,
    pub kind: FogKind,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Vector3::new(0.9, 0.9, 0.9),
            density: 0.05,
            start: 10.0,
            end: 50.0,
            kind: FogKind::Exponential,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    // radians
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    // scale first, then x, y, z rotations, then translation
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.translation)
            * Matrix4::from_axis_angle(&Vector3::x_axis(), self.rotation.x)
            * Matrix4::from_axis_angle(&Vector3::y_axis(), self.rotation.y)
            * Matrix4::from_axis_angle(&Vector3::z_axis(), self.rotation.z)
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    pub name: String,
    // already resolved against the config's directory
    pub model_path: PathBuf,
    pub transform: Transform,
    pub eliminable: bool,
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub camera_position: Vector3<f32>,
    pub light: Light,
    pub attenuation: Attenuation,
    pub fog: Fog,
    pub objects: Vec<ObjectInfo>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera_position: Vector3::new(0.0, 2.0, 20.0),
            light: Light::default(),
            attenuation: Attenuation::default(),
            fog: Fog::default(),
            objects: vec![],
        }
    }
}

pub fn load_scene(path: &Path) -> Result<SceneConfig, SceneError> {
    let contents = read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let scene = parse_scene(&contents, path.parent().unwrap_or_else(|| Path::new("")))?;
    if scene.objects.is_empty() {
        log::warn!("{} doesn't list any objects", path.display());
    } else {
        log::info!("{} object(s) listed in {}", scene.objects.len(), path.display());
    }
    Ok(scene)
}

/// Keyword lines set up the camera, light, attenuation and fog; every other line
/// describes one object:
/// `name model.obj px py pz rx ry rz sx sy sz eliminable`, rotations in degrees.
pub fn parse_scene(contents: &str, base_dir: &Path) -> Result<SceneConfig, SceneError> {
    let mut scene = SceneConfig::default();

    for (index, line) in contents.lines().enumerate() {
        let lineno = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let keyword = match parts.next() {
            Some(k) => k,
            None => continue,
        };
        match keyword {
            "CAMERA" => {
                scene.camera_position = parse_floats::<3>(&mut parts, lineno, keyword)?.into();
                log::debug!("Camera starts at {:?}", scene.camera_position);
            }
            "LIGHT" => {
                let [px, py, pz, r, g, b] = parse_floats::<6>(&mut parts, lineno, keyword)?;
                scene.light = Light {
                    position: Vector3::new(px, py, pz),
                    intensity: Vector3::new(r, g, b),
                };
            }
            "ATTENUATION" => {
                let [constant, linear, quadratic] = parse_floats::<3>(&mut parts, lineno, keyword)?;
                scene.attenuation = Attenuation {
                    constant,
                    linear,
                    quadratic,
                };
            }
            "FOG" => {
                let enabled = flag(&mut parts, lineno, keyword)?;
                let [r, g, b, density, start, end] = parse_floats::<6>(&mut parts, lineno, keyword)?;
                let kind = match parts.next() {
                    Some("0") => FogKind::Linear,
                    Some("1") => FogKind::Exponential,
                    Some("2") => FogKind::ExponentialSquared,
                    Some(other) => {
                        return Err(SceneError::InvalidValue {
                            line: lineno,
                            what: "fog type",
                            value: other.to_string(),
                        })
                    }
                    None => {
                        return Err(SceneError::MissingValue {
                            line: lineno,
                            keyword: keyword.to_string(),
                        })
                    }
                };
                scene.fog = Fog {
                    enabled,
                    color: Vector3::new(r, g, b),
                    density,
                    start,
                    end,
                    kind,
                };
            }
            name => {
                let model = parts.next().ok_or_else(|| SceneError::MissingValue {
                    line: lineno,
                    keyword: name.to_string(),
                })?;
                let [px, py, pz, rx, ry, rz, sx, sy, sz] = parse_floats::<9>(&mut parts, lineno, name)?;
                let eliminable = flag(&mut parts, lineno, name)?;
                scene.objects.push(ObjectInfo {
                    name: name.to_string(),
                    model_path: base_dir.join(model),
                    transform: Transform {
                        translation: Vector3::new(px, py, pz),
                        rotation: Vector3::new(rx.to_radians(), ry.to_radians(), rz.to_radians()),
                        scale: Vector3::new(sx, sy, sz),
                    },
                    eliminable,
                });
            }
        }
    }

    Ok(scene)
}

// a mesh placed in the world
#[derive(Debug)]
pub struct SceneObject {
    // position in the config; stays unique after other objects are removed
    pub id: usize,
    pub name: String,
    pub mesh: Mesh,
    pub transform: Transform,
    pub eliminable: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: Mesh, transform: Transform, eliminable: bool) -> Self {
        Self {
            id: 0,
            name: name.into(),
            mesh,
            transform,
            eliminable,
        }
    }

    pub fn load(info: &ObjectInfo, textures: &mut TextureCache) -> Result<Self, ObjError> {
        let mesh = Mesh::load(&info.model_path, textures)?;
        Ok(Self::new(info.name.clone(), mesh, info.transform, info.eliminable))
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.transform.matrix()
    }

    pub fn transformed_bounding_box(&self) -> BoundingBox {
        self.mesh.bounding_box.transformed(&self.matrix())
    }

    // world space, against the current transformed box
    pub fn ray_intersect(&self, origin: &Vector3<f32>, direction: &Vector3<f32>) -> Option<f32> {
        self.transformed_bounding_box().ray_intersect(origin, direction)
    }
}

/// Loads every listed object. One that fails is logged and left out;
/// the rest of the scene still comes up.
pub fn load_objects(scene: &SceneConfig, textures: &mut TextureCache) -> Vec<SceneObject> {
    scene
        .objects
        .iter()
        .enumerate()
        .filter_map(|(id, info)| match SceneObject::load(info, textures) {
            Ok(mut object) => {
                object.id = id;
                log::info!("Object {:?} ready", info.name);
                Some(object)
            }
            Err(e) => {
                log::warn!("Skipping object {:?}: {}", info.name, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    const CONFIG: &str = "\
# system
CAMERA 0 5 30
LIGHT 1 2 3 0.5 0.5 0.5
ATTENUATION 1 0.1 0.01
FOG 0 0.2 0.3 0.4 0.1 5 25 2

# objects
Track models/track.obj 0 -1 0 0 90 0 10 1 10 0
Cube models/cube.obj 1 2 3 0 0 0 1 1 1 1
";

    #[test]
    fn keywords_and_objects_are_parsed() {
        let scene = parse_scene(CONFIG, Path::new("assets")).unwrap();
        assert_eq!(scene.camera_position, Vector3::new(0.0, 5.0, 30.0));
        assert_eq!(scene.light.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.light.intensity, Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(scene.attenuation.linear, 0.1);
        assert!(!scene.fog.enabled);
        assert_eq!(scene.fog.kind, FogKind::ExponentialSquared);
        assert_eq!(scene.fog.end, 25.0);

        assert_eq!(scene.objects.len(), 2);
        let track = &scene.objects[0];
        assert_eq!(track.name, "Track");
        assert_eq!(track.model_path, Path::new("assets").join("models/track.obj"));
        assert_relative_eq!(track.transform.rotation.y, std::f32::consts::FRAC_PI_2);
        assert_eq!(track.transform.scale, Vector3::new(10.0, 1.0, 10.0));
        assert!(!track.eliminable);
        assert!(scene.objects[1].eliminable);
    }

    #[test]
    fn missing_keywords_keep_defaults() {
        let scene = parse_scene("", Path::new("")).unwrap();
        assert_eq!(scene.camera_position, Vector3::new(0.0, 2.0, 20.0));
        assert_eq!(scene.light, Light::default());
        assert_eq!(scene.fog, Fog::default());
        assert!(scene.objects.is_empty());
    }

    #[test]
    fn malformed_lines_are_errors() {
        let err = parse_scene("LIGHT 1 2 three 4 5 6", Path::new("")).unwrap_err();
        assert!(matches!(err, SceneError::InvalidNumber { line: 1, .. }));
        let err = parse_scene("\nFOG 1 0 0 0 0.1 1 2 7", Path::new("")).unwrap_err();
        assert!(matches!(err, SceneError::InvalidValue { line: 2, .. }));
        let err = parse_scene("Cube cube.obj 0 0 0", Path::new("")).unwrap_err();
        assert!(matches!(err, SceneError::MissingValue { line: 1, .. }));
    }

    #[test]
    fn transform_scales_then_rotates_then_translates() {
        let t = Transform {
            translation: Vector3::new(5.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let p = t.matrix().transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.coords, Vector3::new(5.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn object_ray_query_uses_world_box() {
        let mut mesh = Mesh::default();
        mesh.bounding_box =
            BoundingBox::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let object = SceneObject::new(
            "Cube",
            mesh,
            Transform {
                translation: Vector3::new(10.0, 0.0, 0.0),
                ..Default::default()
            },
            true,
        );
        let d = object
            .ray_intersect(&Vector3::zeros(), &Vector3::x())
            .unwrap();
        assert_relative_eq!(d, 9.0);
        assert_eq!(object.ray_intersect(&Vector3::zeros(), &-Vector3::x()), None);
    }

    #[test]
    fn object_without_geometry_is_never_hit() {
        let object = SceneObject::new("Ghost", Mesh::default(), Transform::default(), true);
        assert!(object.transformed_bounding_box().is_empty());
        assert_eq!(object.ray_intersect(&Vector3::zeros(), &Vector3::x()), None);
    }

    #[test]
    fn relative_face_indices_still_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("rel.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n",
        )
        .unwrap();
        let config = dir.path().join("scene.txt");
        fs::write(&config, "Rel rel.obj 0 0 0 0 0 0 1 1 1 1\n").unwrap();
        let objects = load_objects(&load_scene(&config).unwrap(), &mut TextureCache::default());
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].mesh.groups.len(), 1);
        assert_eq!(&objects[0].mesh.groups[0].vertices[8..11], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn broken_objects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tri.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        fs::write(dir.path().join("bad.obj"), "v 0 zero 0\n").unwrap();
        let config = dir.path().join("scene.txt");
        fs::write(
            &config,
            "Good tri.obj 0 0 0 0 0 0 1 1 1 1\n\
             Missing nowhere.obj 0 0 0 0 0 0 1 1 1 1\n\
             Broken bad.obj 0 0 0 0 0 0 1 1 1 1\n",
        )
        .unwrap();
        let scene = load_scene(&config).unwrap();
        assert_eq!(scene.objects.len(), 3);
        let objects = load_objects(&scene, &mut TextureCache::default());
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "Good");
        assert_eq!(objects[0].id, 0);
        assert_eq!(objects[0].mesh.vertex_count(), 3);
    }

    #[test]
    fn bundled_scene_loads() {
        let config = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/scene.cfg");
        let scene = load_scene(&config).unwrap();
        let objects = load_objects(&scene, &mut TextureCache::default());
        assert_eq!(objects.len(), 4);
        assert_eq!(objects[0].name, "Track");
        assert!(objects.iter().all(|o| !o.transformed_bounding_box().is_empty()));
        assert_eq!(objects[1].mesh.groups[0].material.name, "Crate");
        assert_eq!(objects[1].mesh.vertex_count(), 36);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_scene(&dir.path().join("none.txt")),
            Err(SceneError::Io { .. })
        ));
    }
}
