//! World-space units and map geometry shared by the decal subsystem.
//!
//! The terrain is a grid of heightmap squares, each `SQUARE_SIZE` world units
//! across. Scar bookkeeping runs on a half-resolution texel grid (one texel =
//! two squares = `TEX_QUAD_SIZE` world units), and the scar spatial index
//! buckets those texels into coarse field cells of `SCAR_FIELD_CELL_TEXELS`
//! texels each.

/// World units per heightmap square.
pub const SQUARE_SIZE: f32 = 8.0;

/// World units per scar texel-quad (two heightmap squares).
pub const TEX_QUAD_SIZE: f32 = 16.0;

/// Half-resolution texels per scar-field cell, along each axis.
pub const SCAR_FIELD_CELL_TEXELS: i32 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Clamps the horizontal components into the map rectangle.
    pub fn clamped(self, dims: MapDims) -> Self {
        Self {
            x: self.x.clamp(0.0, dims.world_x()),
            y: self.y,
            z: self.z.clamp(0.0, dims.world_z()),
        }
    }
}

/// Build facing of a footprint decal; rotates the decal texture in
/// quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    #[default]
    South,
    East,
    North,
    West,
}

impl Facing {
    /// East/West-facing footprints have their axes swapped relative to the
    /// unrotated texture.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Facing::East | Facing::West)
    }
}

/// Map dimensions in heightmap squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDims {
    pub squares_x: i32,
    pub squares_y: i32,
}

impl MapDims {
    pub fn new(squares_x: i32, squares_y: i32) -> Self {
        Self {
            squares_x: squares_x.max(1),
            squares_y: squares_y.max(1),
        }
    }

    pub fn world_x(self) -> f32 {
        self.squares_x as f32 * SQUARE_SIZE
    }

    pub fn world_z(self) -> f32 {
        self.squares_y as f32 * SQUARE_SIZE
    }

    /// Half-resolution texel grid width (scar bounding rects live here).
    pub fn texels_x(self) -> i32 {
        (self.squares_x / 2).max(1)
    }

    pub fn texels_y(self) -> i32 {
        (self.squares_y / 2).max(1)
    }

    /// Scar-field width in coarse cells.
    pub fn field_x(self) -> i32 {
        (self.texels_x() / SCAR_FIELD_CELL_TEXELS).max(1)
    }

    pub fn field_y(self) -> i32 {
        (self.texels_y() / SCAR_FIELD_CELL_TEXELS).max(1)
    }
}
