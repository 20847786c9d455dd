use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("couldn't load texture {}: {source}", path.display())]
pub struct TextureError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

// index into the cache; the renderer uploads textures in the same order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

// one decoded image per distinct path, shared by every group that names it
// nothing is freed until clear()
#[derive(Default)]
pub struct TextureCache {
    by_path: HashMap<PathBuf, TextureId>,
    images: Vec<RgbaImage>,
}

impl TextureCache {
    pub fn load_texture(&mut self, path: &Path) -> Result<TextureId, TextureError> {
        if let Some(id) = self.by_path.get(path) {
            log::debug!("Texture {} already cached as {:?}", path.display(), id);
            return Ok(*id);
        }
        // obj texcoords have v going up, images are stored top row first
        let image = image::open(path)
            .map_err(|source| TextureError {
                path: path.to_path_buf(),
                source,
            })?
            .flipv()
            .into_rgba8();
        let id = TextureId(self.images.len());
        log::info!(
            "Loaded texture {} ({}x{}) as {:?}",
            path.display(),
            image.width(),
            image.height(),
            id
        );
        self.images.push(image);
        self.by_path.insert(path.to_path_buf(), id);
        Ok(id)
    }

    #[cfg(test)]
    pub fn get(&self, id: TextureId) -> Option<&RgbaImage> {
        self.images.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &RgbaImage)> {
        self.images.iter().enumerate().map(|(i, img)| (TextureId(i), img))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.images.clear();
    }
}
