//! Scar atlas assembly.
//!
//! The four scar textures named by the resource table are each rescaled to
//! 256x256 and packed into one 512x512 RGBA atlas; scar geometry selects a
//! quadrant through a (0|0.5, 0|0.5) UV offset. Legacy `.bmp` art has no
//! alpha channel: its red channel is treated as brightness (tinted toward
//! scorched brown) and the green channel as alpha. A missing or corrupt
//! entry leaves its quadrant transparent and only costs a warning.

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;
use tracing::warn;

use crate::assets::{ImageLoadError, ImageSource, RgbaPixels};

pub const ATLAS_SIZE: u32 = 512;
pub const ATLAS_CELL: u32 = 256;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error(transparent)]
    Load(#[from] ImageLoadError),
    #[error("image {path} has a malformed pixel buffer")]
    MalformedBuffer { path: String },
}

/// Builds the 2x2 scar atlas. Quadrant placement mirrors the classic
/// resource-table order: entries 2 and 3 fill the top row, 1 and 4 the
/// bottom row.
pub fn build_scar_atlas(entries: &[String; 4], images: &dyn ImageSource) -> RgbaPixels {
    let mut atlas = RgbaPixels::solid(ATLAS_SIZE, ATLAS_SIZE, [0, 0, 0, 0]);

    let placements: [(usize, u32, u32); 4] = [
        (1, 0, 0),
        (2, ATLAS_CELL, 0),
        (0, 0, ATLAS_CELL),
        (3, ATLAS_CELL, ATLAS_CELL),
    ];

    for (entry, x_offset, y_offset) in placements {
        let path = &entries[entry];
        if let Err(error) = blit_entry(&mut atlas, path, x_offset, y_offset, images) {
            warn!(path = %path, error = %error, "scar_texture_load_failed");
        }
    }

    atlas
}

fn blit_entry(
    atlas: &mut RgbaPixels,
    path: &str,
    x_offset: u32,
    y_offset: u32,
    images: &dyn ImageSource,
) -> Result<(), AtlasError> {
    let pixels = images.load_rgba(path)?;
    let cell = rescale_to_cell(pixels, path)?;

    if is_bmp(path) {
        // bitmaps carry no alpha: red is brightness, green is alpha
        for y in 0..ATLAS_CELL {
            for x in 0..ATLAS_CELL {
                let src = cell.pixel(x, y);
                let brightness = src[0] as u32;
                let out = [
                    ((brightness * 90) / 255) as u8,
                    ((brightness * 60) / 255) as u8,
                    ((brightness * 30) / 255) as u8,
                    src[1],
                ];
                put_pixel(atlas, x + x_offset, y + y_offset, out);
            }
        }
    } else {
        for y in 0..ATLAS_CELL {
            for x in 0..ATLAS_CELL {
                put_pixel(atlas, x + x_offset, y + y_offset, cell.pixel(x, y));
            }
        }
    }

    Ok(())
}

fn rescale_to_cell(pixels: RgbaPixels, path: &str) -> Result<RgbaPixels, AtlasError> {
    if pixels.width == ATLAS_CELL && pixels.height == ATLAS_CELL {
        return Ok(pixels);
    }

    let image = RgbaImage::from_raw(pixels.width, pixels.height, pixels.data).ok_or_else(|| {
        AtlasError::MalformedBuffer {
            path: path.to_string(),
        }
    })?;
    let resized = image::imageops::resize(&image, ATLAS_CELL, ATLAS_CELL, FilterType::Triangle);
    Ok(RgbaPixels::new(ATLAS_CELL, ATLAS_CELL, resized.into_raw()))
}

fn is_bmp(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bmp"))
}

fn put_pixel(atlas: &mut RgbaPixels, x: u32, y: u32, color: [u8; 4]) {
    let i = ((y * atlas.width + x) * 4) as usize;
    atlas.data[i..i + 4].copy_from_slice(&color);
}
