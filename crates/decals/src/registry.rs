//! Decal type registry: one entry per distinct footprint texture name.
//!
//! Lookup is a linear scan over the registered types; the registry holds
//! dozens of entries at most, so a map would buy nothing. Texture pixels are
//! loaded at resolve time (event time) and uploaded to the backend lazily on
//! the next rendered frame. A failed load is cached and warned about once,
//! after which the name keeps resolving to [`TypeLookup::Missing`].

use std::collections::HashSet;

use tracing::warn;

use crate::assets::{ImageSource, RgbaPixels};
use crate::backend::{DrawBackend, TextureHandle};
use crate::pool::DecalHandle;

/// Result of resolving a decal type name. `Missing` is an asset-level
/// failure, distinct from the subsystem-wide disabled toggle (callers check
/// that before consulting the registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLookup {
    Index(usize),
    Missing,
}

#[derive(Debug)]
pub(crate) struct DecalType {
    pub name: String,
    pixels: Option<RgbaPixels>,
    pub texture: Option<TextureHandle>,
    /// Live decals using this texture; non-owning, compacted during draws.
    pub decals: Vec<DecalHandle>,
}

#[derive(Debug, Default)]
pub struct DecalTypeRegistry {
    types: Vec<DecalType>,
    failed: HashSet<String>,
}

impl DecalTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Resolves `name` to a type index, loading the texture on first use
    /// from `unittextures/<lowercased-name>`.
    pub fn resolve(&mut self, name: &str, images: &dyn ImageSource) -> TypeLookup {
        let lower = name.to_lowercase();

        if let Some(index) = self.types.iter().position(|t| t.name == lower) {
            return TypeLookup::Index(index);
        }
        if self.failed.contains(&lower) {
            return TypeLookup::Missing;
        }

        let path = format!("unittextures/{lower}");
        match images.load_rgba(&path) {
            Ok(pixels) => {
                self.types.push(DecalType {
                    name: lower,
                    pixels: Some(pixels),
                    texture: None,
                    decals: Vec::new(),
                });
                TypeLookup::Index(self.types.len() - 1)
            }
            Err(error) => {
                warn!(path = %path, error = %error, "decal_texture_load_failed");
                self.failed.insert(lower);
                TypeLookup::Missing
            }
        }
    }

    /// Uploads any textures resolved since the last frame.
    pub fn upload_pending(&mut self, backend: &mut dyn DrawBackend) {
        for decal_type in &mut self.types {
            if decal_type.texture.is_none() {
                if let Some(pixels) = decal_type.pixels.take() {
                    decal_type.texture = Some(backend.upload_texture(&pixels));
                }
            }
        }
    }

    pub fn texture(&self, index: usize) -> Option<TextureHandle> {
        self.types.get(index).and_then(|t| t.texture)
    }

    pub(crate) fn attach(&mut self, index: usize, handle: DecalHandle) {
        if let Some(decal_type) = self.types.get_mut(index) {
            decal_type.decals.push(handle);
        }
    }

    pub(crate) fn decals_mut(&mut self, index: usize) -> &mut Vec<DecalHandle> {
        &mut self.types[index].decals
    }

    pub fn live_decal_count(&self) -> usize {
        self.types.iter().map(|t| t.decals.len()).sum()
    }

    /// Releases backend textures and forgets every type.
    pub fn teardown(&mut self, backend: &mut dyn DrawBackend) {
        for decal_type in self.types.drain(..) {
            if let Some(texture) = decal_type.texture {
                backend.release_texture(texture);
            }
        }
        self.failed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryImages;
    use crate::backend::NullBackend;

    fn images_with(name: &str) -> MemoryImages {
        let mut images = MemoryImages::new();
        images.insert(
            format!("unittextures/{name}"),
            RgbaPixels::solid(8, 8, [255; 4]),
        );
        images
    }

    #[test]
    fn resolve_is_case_insensitive_and_cached() {
        let mut registry = DecalTypeRegistry::new();
        let images = images_with("factory");

        let first = registry.resolve("Factory", &images);
        let second = registry.resolve("FACTORY", &images);

        assert_eq!(first, TypeLookup::Index(0));
        assert_eq!(second, TypeLookup::Index(0));
        assert_eq!(registry.type_count(), 1);
    }

    #[test]
    fn distinct_names_get_distinct_indices() {
        let mut registry = DecalTypeRegistry::new();
        let mut images = images_with("factory");
        images.insert("unittextures/turret", RgbaPixels::solid(4, 4, [1; 4]));

        assert_eq!(registry.resolve("factory", &images), TypeLookup::Index(0));
        assert_eq!(registry.resolve("turret", &images), TypeLookup::Index(1));
    }

    #[test]
    fn missing_texture_resolves_missing_and_is_cached() {
        let mut registry = DecalTypeRegistry::new();
        let images = MemoryImages::new();

        assert_eq!(registry.resolve("ghost_town", &images), TypeLookup::Missing);
        assert_eq!(registry.resolve("ghost_town", &images), TypeLookup::Missing);
        assert_eq!(registry.type_count(), 0);
    }

    #[test]
    fn upload_pending_is_one_shot_per_type() {
        let mut registry = DecalTypeRegistry::new();
        let images = images_with("factory");
        registry.resolve("factory", &images);

        let mut backend = NullBackend::default();
        registry.upload_pending(&mut backend);
        registry.upload_pending(&mut backend);

        assert_eq!(backend.uploads.len(), 1);
        assert!(registry.texture(0).is_some());
    }

    #[test]
    fn teardown_releases_uploaded_textures() {
        let mut registry = DecalTypeRegistry::new();
        let images = images_with("factory");
        registry.resolve("factory", &images);

        let mut backend = NullBackend::default();
        registry.upload_pending(&mut backend);
        let texture = registry.texture(0).expect("uploaded");

        registry.teardown(&mut backend);

        assert_eq!(backend.released, vec![texture]);
        assert_eq!(registry.type_count(), 0);
    }
}
