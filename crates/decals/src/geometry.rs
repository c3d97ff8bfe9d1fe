//! Cached renderable geometry for decals and scars.
//!
//! Geometry is built lazily on first draw and thereafter only patched in
//! place: vertex heights track terrain deformation and vertex colors track
//! the current opacity. The cache state is explicit so the build/refresh
//! machine is testable without a backend.

use crate::backend::DecalVertex;
use crate::terrain::TerrainView;
use crate::world::{Facing, WorldPos, SQUARE_SIZE, TEX_QUAD_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildState {
    /// No vertices yet; a full build is required before drawing.
    #[default]
    Empty,
    /// Vertices are current for this frame.
    Built,
    /// Vertices exist but heights/alpha are stale; patch in place.
    NeedsRefresh,
}

#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    pub state: BuildState,
    pub verts: Vec<DecalVertex>,
}

impl GeometryCache {
    /// Drops the geometry but keeps the vertex allocation for reuse.
    pub fn reset(&mut self) {
        self.verts.clear();
        self.state = BuildState::Empty;
    }

    pub fn mark_needs_refresh(&mut self) {
        if self.state == BuildState::Built {
            self.state = BuildState::NeedsRefresh;
        }
    }
}

/// Placement of a footprint decal on the heightmap-square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootprintLayout {
    /// Top-left square coordinate; may be negative near the map edge.
    pub pos_x: i32,
    pub pos_y: i32,
    /// Size in heightmap squares (post-rotation).
    pub size_x: i32,
    pub size_y: i32,
    pub facing: Facing,
}

fn alpha_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0) as u8
}

/// Builds one quad per heightmap square covered by the footprint, clipped to
/// the map bounds, with UVs rotated for the build facing.
pub fn build_footprint(
    cache: &mut GeometryCache,
    terrain: &dyn TerrainView,
    layout: &FootprintLayout,
    alpha: f32,
) {
    cache.verts.clear();

    let dims = terrain.dims();
    let color = [255, 255, 255, alpha_byte(alpha)];

    let dxsize = layout.size_x;
    let dzsize = layout.size_y;
    let dxpos = layout.pos_x;
    let dzpos = layout.pos_y;
    // offsets from the top/left map edge
    let dxoff = (-dxpos).max(0);
    let dzoff = (-dzpos).max(0);

    let xts = 1.0 / dxsize as f32;
    let zts = 1.0 / dzsize as f32;

    // clipped decal dimensions
    let mut cxsize = dxsize - dxoff;
    let mut czsize = dzsize - dzoff;
    if dxpos + dxsize > dims.squares_x {
        cxsize -= (dxpos + dxsize) - dims.squares_x;
    }
    if dzpos + dzsize > dims.squares_y {
        czsize -= (dzpos + dzsize) - dims.squares_y;
    }

    for vx in 0..cxsize.max(0) {
        for vz in 0..czsize.max(0) {
            let rx = dxoff + vx; // decal-space
            let rz = dzoff + vz;
            let px = dxpos + rx; // heightmap-space
            let pz = dzpos + rz;

            let (rxf, rzf) = (rx as f32, rz as f32);
            let (dxf, dzf) = (dxsize as f32, dzsize as f32);
            let uv: [f32; 8] = match layout.facing {
                Facing::South => [
                    rxf * xts,
                    rzf * zts,
                    (rxf + 1.0) * xts,
                    rzf * zts,
                    (rxf + 1.0) * xts,
                    (rzf + 1.0) * zts,
                    rxf * xts,
                    (rzf + 1.0) * zts,
                ],
                Facing::North => [
                    (dxf - rxf) * xts,
                    (dzf - rzf) * zts,
                    (dxf - rxf - 1.0) * xts,
                    (dzf - rzf) * zts,
                    (dxf - rxf - 1.0) * xts,
                    (dzf - rzf - 1.0) * zts,
                    (dxf - rxf) * xts,
                    (dzf - rzf - 1.0) * zts,
                ],
                Facing::East => [
                    1.0 - rzf * zts,
                    rxf * xts,
                    1.0 - rzf * zts,
                    (rxf + 1.0) * xts,
                    1.0 - (rzf + 1.0) * zts,
                    (rxf + 1.0) * xts,
                    1.0 - (rzf + 1.0) * zts,
                    rxf * xts,
                ],
                Facing::West => [
                    rzf * zts,
                    1.0 - rxf * xts,
                    rzf * zts,
                    1.0 - (rxf + 1.0) * xts,
                    (rzf + 1.0) * zts,
                    1.0 - (rxf + 1.0) * xts,
                    (rzf + 1.0) * zts,
                    1.0 - rxf * xts,
                ],
            };

            push_square_quad(&mut cache.verts, terrain, px, pz, &uv, color);
        }
    }

    cache.state = BuildState::Built;
}

fn push_square_quad(
    verts: &mut Vec<DecalVertex>,
    terrain: &dyn TerrainView,
    px: i32,
    pz: i32,
    uv: &[f32; 8],
    color: [u8; 4],
) {
    let corner = |sx: i32, sz: i32| {
        let wx = sx as f32 * SQUARE_SIZE;
        let wz = sz as f32 * SQUARE_SIZE;
        [wx, terrain.height_at(wx, wz), wz]
    };

    verts.push(DecalVertex {
        pos: corner(px, pz),
        uv: [uv[0], uv[1]],
        color,
    });
    verts.push(DecalVertex {
        pos: corner(px + 1, pz),
        uv: [uv[2], uv[3]],
        color,
    });
    verts.push(DecalVertex {
        pos: corner(px + 1, pz + 1),
        uv: [uv[4], uv[5]],
        color,
    });
    verts.push(DecalVertex {
        pos: corner(px, pz + 1),
        uv: [uv[6], uv[7]],
        color,
    });
}

/// Re-samples vertex heights and rewrites the opacity in place.
pub fn refresh_footprint(cache: &mut GeometryCache, terrain: &dyn TerrainView, alpha: f32) {
    let color = [255, 255, 255, alpha_byte(alpha)];
    for vert in &mut cache.verts {
        vert.pos[1] = terrain.height_at(vert.pos[0], vert.pos[2]);
        vert.color = color;
    }
    cache.state = BuildState::Built;
}

/// Builds the texel-quad grid covering a scar's radius, clamped to the map.
/// UVs project the quad into one quadrant of the 2x2 scar atlas.
pub fn build_scar(
    cache: &mut GeometryCache,
    terrain: &dyn TerrainView,
    pos: WorldPos,
    radius: f32,
    tex_offset: [f32; 2],
) {
    cache.verts.clear();

    let dims = terrain.dims();
    let color = [255, 255, 255, 255];
    let radius4 = radius * 4.0;
    let inv_quad = 1.0 / TEX_QUAD_SIZE;

    let sx = ((pos.x - radius) * inv_quad).max(0.0) as i32;
    let ex = ((pos.x + radius) * inv_quad).min((dims.texels_x() - 1) as f32) as i32;
    let sz = ((pos.z - radius) * inv_quad).max(0.0) as i32;
    let ez = ((pos.z + radius) * inv_quad).min((dims.texels_y() - 1) as f32) as i32;

    let mut px1 = sx as f32 * TEX_QUAD_SIZE;
    for _x in sx..=ex {
        let px2 = px1 + TEX_QUAD_SIZE;
        let mut pz1 = sz as f32 * TEX_QUAD_SIZE;

        for _z in sz..=ez {
            let pz2 = pz1 + TEX_QUAD_SIZE;
            let tx1 = ((pos.x - px1) / radius4 + 0.25).min(0.5);
            let tx2 = ((pos.x - px2) / radius4 + 0.25).max(0.0);
            let tz1 = ((pos.z - pz1) / radius4 + 0.25).min(0.5);
            let tz2 = ((pos.z - pz2) / radius4 + 0.25).max(0.0);

            let h1 = terrain.height_at(px1, pz1);
            let h2 = terrain.height_at(px2, pz1);
            let h3 = terrain.height_at(px2, pz2);
            let h4 = terrain.height_at(px1, pz2);

            let (tox, toy) = (tex_offset[0], tex_offset[1]);
            cache.verts.push(DecalVertex {
                pos: [px1, h1, pz1],
                uv: [tx1 + tox, tz1 + toy],
                color,
            });
            cache.verts.push(DecalVertex {
                pos: [px2, h2, pz1],
                uv: [tx2 + tox, tz1 + toy],
                color,
            });
            cache.verts.push(DecalVertex {
                pos: [px2, h3, pz2],
                uv: [tx2 + tox, tz2 + toy],
                color,
            });
            cache.verts.push(DecalVertex {
                pos: [px1, h4, pz2],
                uv: [tx1 + tox, tz2 + toy],
                color,
            });
            pz1 = pz2;
        }

        px1 = px2;
    }

    cache.state = BuildState::Built;
}

/// Patches scar vertex heights and applies a fade alpha (0..=255).
pub fn refresh_scar(cache: &mut GeometryCache, terrain: &dyn TerrainView, alpha: u8) {
    let color = [255, 255, 255, alpha];
    for vert in &mut cache.verts {
        vert.pos[1] = terrain.height_at(vert.pos[0], vert.pos[2]);
        vert.color = color;
    }
    cache.state = BuildState::Built;
}

/// Alpha curve for the optional scar fade mode: a 10-frame ramp-in, then a
/// linear decay toward expiry.
pub fn scar_fade_alpha(start_alpha: f32, alpha_decay: f32, creation_frame: i32, frame: i32) -> u8 {
    let age = (frame - creation_frame) as f32;
    let value = if creation_frame + 10 > frame {
        start_alpha * age * 0.1
    } else {
        start_alpha - age * alpha_decay
    };
    value.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::FlatTerrain;
    use crate::world::MapDims;

    fn terrain() -> FlatTerrain {
        FlatTerrain::new(4.0, MapDims::new(64, 64))
    }

    fn layout(pos_x: i32, pos_y: i32, size_x: i32, size_y: i32, facing: Facing) -> FootprintLayout {
        FootprintLayout {
            pos_x,
            pos_y,
            size_x,
            size_y,
            facing,
        }
    }

    #[test]
    fn footprint_build_emits_one_quad_per_square() {
        let mut cache = GeometryCache::default();
        build_footprint(&mut cache, &terrain(), &layout(4, 4, 2, 3, Facing::South), 1.0);

        assert_eq!(cache.state, BuildState::Built);
        assert_eq!(cache.verts.len(), 2 * 3 * 4);
        assert!(cache.verts.iter().all(|v| v.pos[1] == 4.0));
    }

    #[test]
    fn footprint_clips_at_map_edges() {
        let mut cache = GeometryCache::default();
        // two columns off the left edge
        build_footprint(&mut cache, &terrain(), &layout(-2, 0, 4, 4, Facing::South), 1.0);

        assert_eq!(cache.verts.len(), 2 * 4 * 4);
        assert!(cache.verts.iter().all(|v| v.pos[0] >= 0.0));
    }

    #[test]
    fn footprint_fully_off_map_builds_nothing() {
        let mut cache = GeometryCache::default();
        build_footprint(
            &mut cache,
            &terrain(),
            &layout(-10, -10, 4, 4, Facing::South),
            1.0,
        );

        assert_eq!(cache.state, BuildState::Built);
        assert!(cache.verts.is_empty());
    }

    #[test]
    fn north_facing_flips_uvs() {
        let mut south = GeometryCache::default();
        let mut north = GeometryCache::default();
        build_footprint(&mut south, &terrain(), &layout(0, 0, 1, 1, Facing::South), 1.0);
        build_footprint(&mut north, &terrain(), &layout(0, 0, 1, 1, Facing::North), 1.0);

        // the top-left vertex of a south decal is uv (0, 0); north puts (1, 1) there
        assert_eq!(south.verts[0].uv, [0.0, 0.0]);
        assert_eq!(north.verts[0].uv, [1.0, 1.0]);
    }

    #[test]
    fn refresh_rewrites_alpha_and_heights_in_place() {
        let mut cache = GeometryCache::default();
        build_footprint(&mut cache, &terrain(), &layout(0, 0, 2, 2, Facing::South), 1.0);
        let count = cache.verts.len();

        let raised = FlatTerrain::new(9.0, MapDims::new(64, 64));
        refresh_footprint(&mut cache, &raised, 0.5);

        assert_eq!(cache.verts.len(), count);
        assert!(cache.verts.iter().all(|v| v.pos[1] == 9.0));
        assert!(cache.verts.iter().all(|v| v.color[3] == 127));
    }

    #[test]
    fn alpha_is_clamped_to_byte_range() {
        let mut cache = GeometryCache::default();
        build_footprint(&mut cache, &terrain(), &layout(0, 0, 1, 1, Facing::South), 7.5);
        assert!(cache.verts.iter().all(|v| v.color[3] == 255));

        refresh_footprint(&mut cache, &terrain(), -2.0);
        assert!(cache.verts.iter().all(|v| v.color[3] == 0));
    }

    #[test]
    fn scar_quads_cover_the_clamped_radius() {
        let mut cache = GeometryCache::default();
        build_scar(
            &mut cache,
            &terrain(),
            WorldPos::new(128.0, 0.0, 128.0),
            32.0,
            [0.0, 0.0],
        );

        // 64..=160 in 16-unit steps along each axis
        assert_eq!(cache.verts.len(), 5 * 5 * 4);
        assert!(cache.verts.iter().all(|v| (0.0..=0.5).contains(&v.uv[0])));
    }

    #[test]
    fn scar_atlas_offset_shifts_uvs_into_quadrant() {
        let mut cache = GeometryCache::default();
        build_scar(
            &mut cache,
            &terrain(),
            WorldPos::new(128.0, 0.0, 128.0),
            32.0,
            [0.5, 0.5],
        );

        assert!(cache.verts.iter().all(|v| v.uv[0] >= 0.5 && v.uv[1] >= 0.5));
    }

    #[test]
    fn scar_fade_ramps_in_then_decays() {
        // ramp: 10% of start alpha per frame for the first 10 frames
        assert_eq!(scar_fade_alpha(200.0, 1.0, 100, 100), 0);
        assert_eq!(scar_fade_alpha(200.0, 1.0, 100, 105), 100);
        // past the ramp: linear decay
        assert_eq!(scar_fade_alpha(200.0, 1.0, 100, 150), 150);
        // never negative
        assert_eq!(scar_fade_alpha(200.0, 10.0, 100, 200), 0);
    }

    #[test]
    fn reset_keeps_allocation_but_empties_state() {
        let mut cache = GeometryCache::default();
        build_footprint(&mut cache, &terrain(), &layout(0, 0, 2, 2, Facing::South), 1.0);
        let capacity = cache.verts.capacity();

        cache.reset();

        assert_eq!(cache.state, BuildState::Empty);
        assert!(cache.verts.is_empty());
        assert_eq!(cache.verts.capacity(), capacity);
    }

    #[test]
    fn mark_needs_refresh_only_from_built() {
        let mut cache = GeometryCache::default();
        cache.mark_needs_refresh();
        assert_eq!(cache.state, BuildState::Empty);

        cache.state = BuildState::Built;
        cache.mark_needs_refresh();
        assert_eq!(cache.state, BuildState::NeedsRefresh);
    }
}
