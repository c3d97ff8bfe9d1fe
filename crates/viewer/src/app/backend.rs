use decals::{DecalVertex, DrawBackend, MapDims, RgbaPixels, TextureHandle};

/// Software implementation of the decal draw seam: a top-down orthographic
/// view of the whole map rasterized into an RGBA canvas, which the loop then
/// copies into the `pixels` framebuffer.
///
/// Decal geometry is always made of axis-aligned world-space rectangles, so
/// each quad reduces to a screen-space bounding box with bilinear UV
/// interpolation from its four corners.
pub(crate) struct CpuBackend {
    width: u32,
    height: u32,
    world_w: f32,
    world_h: f32,
    textures: Vec<Option<RgbaPixels>>,
    canvas: Vec<u8>,
}

const GROUND_COLOR: [u8; 4] = [52, 72, 44, 255];

impl CpuBackend {
    pub(crate) fn new(width: u32, height: u32, dims: MapDims) -> Self {
        Self {
            width,
            height,
            world_w: dims.world_x(),
            world_h: dims.world_z(),
            textures: Vec::new(),
            canvas: vec![0; (width * height * 4) as usize],
        }
    }

    pub(crate) fn clear(&mut self) {
        for pixel in self.canvas.chunks_exact_mut(4) {
            pixel.copy_from_slice(&GROUND_COLOR);
        }
    }

    pub(crate) fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    pub(crate) fn screen_to_world(&self, px: f32, py: f32) -> (f32, f32) {
        (
            px / self.width as f32 * self.world_w,
            py / self.height as f32 * self.world_h,
        )
    }

    fn world_to_screen_x(&self, x: f32) -> f32 {
        x / self.world_w * self.width as f32
    }

    fn world_to_screen_y(&self, z: f32) -> f32 {
        z / self.world_h * self.height as f32
    }
}

impl DrawBackend for CpuBackend {
    fn upload_texture(&mut self, pixels: &RgbaPixels) -> TextureHandle {
        self.textures.push(Some(pixels.clone()));
        TextureHandle((self.textures.len() - 1) as u32)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(slot) = self.textures.get_mut(texture.0 as usize) {
            *slot = None;
        }
    }

    fn draw_quads(&mut self, texture: TextureHandle, verts: &[DecalVertex], offset: [f32; 2]) {
        let Some(Some(tex)) = self.textures.get(texture.0 as usize) else {
            return;
        };

        let (width, height) = (self.width as i32, self.height as i32);
        for quad in verts.chunks_exact(4) {
            // corner order: (x1,z1), (x2,z1), (x2,z2), (x1,z2)
            let x1 = quad[0].pos[0] + offset[0];
            let z1 = quad[0].pos[2] + offset[1];
            let x2 = quad[2].pos[0] + offset[0];
            let z2 = quad[2].pos[2] + offset[1];
            if x2 <= x1 || z2 <= z1 {
                continue;
            }

            let sx1 = self.world_to_screen_x(x1).floor() as i32;
            let sy1 = self.world_to_screen_y(z1).floor() as i32;
            let sx2 = self.world_to_screen_x(x2).ceil() as i32;
            let sy2 = self.world_to_screen_y(z2).ceil() as i32;

            for py in sy1.max(0)..sy2.min(height) {
                for px in sx1.max(0)..sx2.min(width) {
                    let wx = (px as f32 + 0.5) / self.width as f32 * self.world_w;
                    let wz = (py as f32 + 0.5) / self.height as f32 * self.world_h;
                    let fx = ((wx - x1) / (x2 - x1)).clamp(0.0, 1.0);
                    let fz = ((wz - z1) / (z2 - z1)).clamp(0.0, 1.0);

                    let top = lerp_uv(quad[0].uv, quad[1].uv, fx);
                    let bottom = lerp_uv(quad[3].uv, quad[2].uv, fx);
                    let uv = lerp_uv(top, bottom, fz);

                    let texel = sample(tex, uv);
                    let alpha = texel[3] as u32 * quad[0].color[3] as u32 / 255;
                    if alpha == 0 {
                        continue;
                    }

                    let index = ((py * width + px) * 4) as usize;
                    blend(&mut self.canvas[index..index + 4], texel, alpha);
                }
            }
        }
    }
}

fn lerp_uv(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

fn sample(tex: &RgbaPixels, uv: [f32; 2]) -> [u8; 4] {
    let tx = (uv[0].clamp(0.0, 1.0) * (tex.width - 1) as f32) as u32;
    let ty = (uv[1].clamp(0.0, 1.0) * (tex.height - 1) as f32) as u32;
    tex.pixel(tx, ty)
}

fn blend(dst: &mut [u8], src: [u8; 4], alpha: u32) {
    let inv = 255 - alpha;
    for channel in 0..3 {
        let mixed = src[channel] as u32 * alpha + dst[channel] as u32 * inv;
        dst[channel] = (mixed / 255) as u8;
    }
    dst[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: MapDims = MapDims {
        squares_x: 8,
        squares_y: 8,
    };

    fn quad(x1: f32, z1: f32, x2: f32, z2: f32, alpha: u8) -> [DecalVertex; 4] {
        let vertex = |pos: [f32; 3], uv: [f32; 2]| DecalVertex {
            pos,
            uv,
            color: [255, 255, 255, alpha],
        };
        [
            vertex([x1, 0.0, z1], [0.0, 0.0]),
            vertex([x2, 0.0, z1], [1.0, 0.0]),
            vertex([x2, 0.0, z2], [1.0, 1.0]),
            vertex([x1, 0.0, z2], [0.0, 1.0]),
        ]
    }

    #[test]
    fn opaque_quad_overwrites_the_ground() {
        // 64x64 canvas over a 64x64 world: 1 pixel per world unit
        let mut backend = CpuBackend::new(64, 64, DIMS);
        backend.clear();
        let tex = backend.upload_texture(&RgbaPixels::solid(4, 4, [200, 10, 10, 255]));

        backend.draw_quads(tex, &quad(8.0, 8.0, 24.0, 24.0, 255), [0.0, 0.0]);

        let center = (16 * 64 + 16) * 4;
        assert_eq!(&backend.canvas()[center..center + 3], &[200, 10, 10]);
        // well outside the quad the ground shows through
        let outside = (40 * 64 + 40) * 4;
        assert_eq!(&backend.canvas()[outside..outside + 3], &GROUND_COLOR[..3]);
    }

    #[test]
    fn half_alpha_quad_blends_with_the_ground() {
        let mut backend = CpuBackend::new(64, 64, DIMS);
        backend.clear();
        let tex = backend.upload_texture(&RgbaPixels::solid(2, 2, [255, 255, 255, 255]));

        backend.draw_quads(tex, &quad(0.0, 0.0, 64.0, 64.0, 128), [0.0, 0.0]);

        let center = (32 * 64 + 32) * 4;
        let red = backend.canvas()[center];
        assert!(red > GROUND_COLOR[0] && red < 255);
    }

    #[test]
    fn released_texture_draws_nothing() {
        let mut backend = CpuBackend::new(64, 64, DIMS);
        backend.clear();
        let tex = backend.upload_texture(&RgbaPixels::solid(2, 2, [255, 0, 0, 255]));
        backend.release_texture(tex);

        backend.draw_quads(tex, &quad(0.0, 0.0, 64.0, 64.0, 255), [0.0, 0.0]);

        let center = (32 * 64 + 32) * 4;
        assert_eq!(&backend.canvas()[center..center + 3], &GROUND_COLOR[..3]);
    }

    #[test]
    fn screen_and_world_coordinates_round_trip() {
        let backend = CpuBackend::new(128, 128, DIMS);
        let (wx, wz) = backend.screen_to_world(64.0, 32.0);

        assert_eq!(wx, 32.0);
        assert_eq!(wz, 16.0);
    }
}
