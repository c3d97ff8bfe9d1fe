//! Render-backend seam.
//!
//! The subsystem treats the renderer as an opaque "upload a texture, draw
//! batched textured quads" capability. Geometry is submitted in groups of
//! four vertices per quad, already in world space, pre-sorted by texture so a
//! backend can bind once per batch.

use crate::assets::RgbaPixels;

/// Opaque backend texture id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// One corner of a textured ground quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalVertex {
    /// World-space position (x, height, z).
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    /// RGBA, alpha premodulates the decal opacity.
    pub color: [u8; 4],
}

pub trait DrawBackend {
    fn upload_texture(&mut self, pixels: &RgbaPixels) -> TextureHandle;

    fn release_texture(&mut self, texture: TextureHandle);

    /// Draws `verts` (four per quad) with `texture` bound. `offset` is a
    /// world-space (x, z) translation applied to every vertex; footprint
    /// decals use it to stay aligned with owners that sit off the square
    /// grid.
    fn draw_quads(&mut self, texture: TextureHandle, verts: &[DecalVertex], offset: [f32; 2]);
}

/// Backend that records submissions without rendering anything. Useful for
/// headless runs and tests.
#[derive(Debug, Default)]
pub struct NullBackend {
    next_texture: u32,
    pub uploads: Vec<(TextureHandle, u32, u32)>,
    pub released: Vec<TextureHandle>,
    pub draws: Vec<DrawCall>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub texture: TextureHandle,
    pub vert_count: usize,
    pub offset: [f32; 2],
}

impl DrawBackend for NullBackend {
    fn upload_texture(&mut self, pixels: &RgbaPixels) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.uploads.push((handle, pixels.width, pixels.height));
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.released.push(texture);
    }

    fn draw_quads(&mut self, texture: TextureHandle, verts: &[DecalVertex], offset: [f32; 2]) {
        self.draws.push(DrawCall {
            texture,
            vert_count: verts.len(),
            offset,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_hands_out_distinct_textures() {
        let mut backend = NullBackend::default();
        let pixels = RgbaPixels::solid(2, 2, [255, 0, 0, 255]);

        let a = backend.upload_texture(&pixels);
        let b = backend.upload_texture(&pixels);

        assert_ne!(a, b);
        assert_eq!(backend.uploads.len(), 2);
    }

    #[test]
    fn null_backend_records_draw_batches() {
        let mut backend = NullBackend::default();
        let tex = backend.upload_texture(&RgbaPixels::solid(1, 1, [0; 4]));
        let vert = DecalVertex {
            pos: [0.0; 3],
            uv: [0.0; 2],
            color: [255; 4],
        };

        backend.draw_quads(tex, &[vert; 4], [3.0, 5.0]);

        assert_eq!(backend.draws.len(), 1);
        assert_eq!(backend.draws[0].vert_count, 4);
        assert_eq!(backend.draws[0].offset, [3.0, 5.0]);
    }
}
