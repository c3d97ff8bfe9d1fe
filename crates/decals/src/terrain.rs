//! Terrain seam: height queries and map extents.

use crate::backend::TextureHandle;
use crate::world::MapDims;

pub trait TerrainView {
    /// Ground height at a world-space (x, z) position.
    fn height_at(&self, x: f32, z: f32) -> f32;

    fn dims(&self) -> MapDims;

    /// Baked shading/lighting texture, if the map has one. Backends may
    /// modulate decal output by it; the core only passes it through.
    fn shading_texture(&self) -> Option<TextureHandle> {
        None
    }
}

/// Terrain with a single uniform height. Handy for headless runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub height: f32,
    pub dims: MapDims,
}

impl FlatTerrain {
    pub fn new(height: f32, dims: MapDims) -> Self {
        Self { height, dims }
    }
}

impl TerrainView for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }

    fn dims(&self) -> MapDims {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_terrain_is_flat() {
        let terrain = FlatTerrain::new(12.5, MapDims::new(64, 64));

        assert_eq!(terrain.height_at(0.0, 0.0), 12.5);
        assert_eq!(terrain.height_at(300.0, -7.0), 12.5);
        assert!(terrain.shading_texture().is_none());
    }
}
