use nalgebra::Vector3;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::objparse::{parse_floats, ObjError};

pub type MaterialTable = HashMap<String, Material>;

// reflectance coefficients straight out of an mtl file
// groups get a copy of one of these, not a reference into the table
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub ka: Vector3<f32>,
    pub kd: Vector3<f32>,
    pub ks: Vector3<f32>,
    // shininess exponent
    pub ns: f32,
    // file name as written after map_Kd; resolved against the model's directory later
    pub map_kd: Option<String>,
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_texture(&self) -> bool {
        self.map_kd.as_deref().map_or(false, |m| !m.is_empty())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ka: Vector3::new(0.2, 0.2, 0.2),
            kd: Vector3::new(0.8, 0.8, 0.8),
            ks: Vector3::new(1.0, 1.0, 1.0),
            ns: 32.0,
            map_kd: None,
        }
    }
}

pub fn load_mtl(path: &Path) -> Result<MaterialTable, ObjError> {
    let file = File::open(path).map_err(|source| ObjError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let materials = parse_mtl(BufReader::new(file), path)?;
    log::info!("Loaded {} material(s) from {}", materials.len(), path.display());
    Ok(materials)
}

/// Reads `newmtl`/`Ka`/`Kd`/`Ks`/`Ns`/`map_Kd` statements into a table keyed by name.
///
/// A material is only committed to the table once the next `newmtl` or the end of
/// the file is reached, so a later block with the same name replaces the earlier one.
/// Statements before the first `newmtl` have nothing to apply to and are skipped.
pub fn parse_mtl(reader: impl BufRead, origin: &Path) -> Result<MaterialTable, ObjError> {
    let mut materials = MaterialTable::new();
    let mut current: Option<Material> = None;

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
        let keyword = match tokens.next() {
            Some(k) => k,
            None => continue,
        };

        if keyword == "newmtl" {
            if let Some(done) = current.take() {
                materials.insert(done.name.clone(), done);
            }
            current = Some(Material::named(tokens.next().unwrap_or("default")));
            continue;
        }

        let material = match current.as_mut() {
            Some(m) => m,
            None => {
                log::debug!("{}:{}: `{}` outside of any newmtl", origin.display(), lineno, keyword);
                continue;
            }
        };
        match keyword {
            "Ka" => material.ka = parse_floats::<3>(&mut tokens, lineno, keyword)?.into(),
            "Kd" => material.kd = parse_floats::<3>(&mut tokens, lineno, keyword)?.into(),
            "Ks" => material.ks = parse_floats::<3>(&mut tokens, lineno, keyword)?.into(),
            "Ns" => material.ns = parse_floats::<1>(&mut tokens, lineno, keyword)?[0].max(0.0),
            "map_Kd" => {
                let file = line[keyword.len()..].trim();
                material.map_kd = (!file.is_empty()).then(|| file.to_string());
            }
            // Ke, Ni, d, illum and friends aren't used by the shader
            _ => {}
        }
    }

    if let Some(done) = current {
        materials.insert(done.name.clone(), done);
    }
    Ok(materials)
}
