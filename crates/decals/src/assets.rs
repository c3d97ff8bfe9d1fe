//! Image loading seam.
//!
//! Decal art is resolved by path through an [`ImageSource`] so the core never
//! touches the filesystem directly. [`DiskImages`] is the production
//! implementation; [`MemoryImages`] serves embedded or procedural art and
//! keeps tests hermetic.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;

/// Raw RGBA8 pixel buffer, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaPixels {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("no image registered under {path}")]
    NotRegistered { path: String },
}

pub trait ImageSource {
    /// Loads the image stored under `path` (a forward-slash relative key,
    /// e.g. `unittextures/factory`) as RGBA8.
    fn load_rgba(&self, path: &str) -> Result<RgbaPixels, ImageLoadError>;
}

/// Loads images from a directory tree on disk.
#[derive(Debug, Clone)]
pub struct DiskImages {
    root: PathBuf,
}

impl DiskImages {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for DiskImages {
    fn load_rgba(&self, path: &str) -> Result<RgbaPixels, ImageLoadError> {
        let resolved = self.root.join(path);
        let reader = ImageReader::open(&resolved).map_err(|source| ImageLoadError::Open {
            path: path.to_string(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| ImageLoadError::Decode {
            path: path.to_string(),
            source,
        })?;
        let image = decoded.to_rgba8();
        Ok(RgbaPixels::new(
            image.width(),
            image.height(),
            image.into_raw(),
        ))
    }
}

/// In-memory image table keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryImages {
    images: HashMap<String, RgbaPixels>,
}

impl MemoryImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, pixels: RgbaPixels) {
        self.images.insert(path.into(), pixels);
    }
}

impl ImageSource for MemoryImages {
    fn load_rgba(&self, path: &str) -> Result<RgbaPixels, ImageLoadError> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| ImageLoadError::NotRegistered {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_images_round_trip() {
        let mut images = MemoryImages::new();
        images.insert("unittextures/base", RgbaPixels::solid(4, 4, [1, 2, 3, 4]));

        let loaded = images.load_rgba("unittextures/base").expect("registered");
        assert_eq!(loaded.width, 4);
        assert_eq!(loaded.pixel(3, 3), [1, 2, 3, 4]);

        assert!(matches!(
            images.load_rgba("unittextures/missing"),
            Err(ImageLoadError::NotRegistered { .. })
        ));
    }

    #[test]
    fn disk_images_load_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mark.png");
        let mut img = image::RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([10, 20, 30, 40]));
        img.save(&path).expect("save png");

        let images = DiskImages::new(dir.path());
        let loaded = images.load_rgba("mark.png").expect("load");

        assert_eq!(loaded.width, 2);
        assert_eq!(loaded.pixel(0, 0), [10, 20, 30, 40]);
    }

    #[test]
    fn disk_images_report_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let images = DiskImages::new(dir.path());

        assert!(matches!(
            images.load_rgba("nope.png"),
            Err(ImageLoadError::Open { .. })
        ));
    }
}
