//! Scar table and the overlap/eviction spatial index.
//!
//! Scars live in a fixed table; ids double as free-list tokens. A coarse
//! grid (one cell per 16x16 half-resolution texels) maps terrain cells to
//! the scar ids whose bounding rectangle intersects them. Inserting a new
//! scar first charges overlap "debt" to every already-placed scar it covers
//! and evicts the ones whose cumulative debt crosses the configured
//! threshold. Only scars that expire no later than the incoming one can be
//! evicted, so long-lived scars survive sustained bombardment by short ones.

use crate::geometry::GeometryCache;
use crate::world::{MapDims, WorldPos, SCAR_FIELD_CELL_TEXELS, TEX_QUAD_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScarId(u16);

impl ScarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Axis-aligned bounding rectangle in half-resolution texel coordinates,
/// exclusive on the high edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TexelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl TexelRect {
    pub fn area(self) -> i32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    /// Overlap area in texels; zero when the rectangles do not intersect.
    /// Symmetric: `a.overlap_area(b) == b.overlap_area(a)`.
    pub fn overlap_area(self, other: TexelRect) -> i32 {
        if self.x1 >= other.x2 || self.x2 <= other.x1 {
            return 0;
        }
        if self.y1 >= other.y2 || self.y2 <= other.y1 {
            return 0;
        }

        let xs = if self.x1 < other.x1 {
            self.x2 - other.x1
        } else {
            other.x2 - self.x1
        };
        let ys = if self.y1 < other.y1 {
            self.y2 - other.y1
        } else {
            other.y2 - self.y1
        };

        xs * ys
    }
}

/// A time-bound terrain mark.
#[derive(Debug, Clone)]
pub struct Scar {
    id: u16,
    pub pos: WorldPos,
    /// Draw radius in world units (already padded past the crater).
    pub radius: f32,
    pub rect: TexelRect,
    pub creation_frame: i32,
    /// Simulation frame at which the scar expires (inclusive).
    pub life_end: i32,
    pub start_alpha: f32,
    pub alpha_decay: f32,
    /// Atlas quadrant offset, each component 0.0 or 0.5.
    pub tex_offset: [f32; 2],
    /// Bounding-rect texel area at creation; normalizes overlap debt.
    pub basesize: i32,
    /// Accumulated overlap debt (integer-truncated fractions).
    pub overdrawn: i32,
    last_test: u32,
    allocated: bool,
    pub geometry: GeometryCache,
}

impl Scar {
    fn new(id: u16) -> Self {
        Self {
            id,
            pos: WorldPos::default(),
            radius: 0.0,
            rect: TexelRect::default(),
            creation_frame: 0,
            life_end: 0,
            start_alpha: 0.0,
            alpha_decay: 0.0,
            tex_offset: [0.0, 0.0],
            basesize: 0,
            overdrawn: 0,
            last_test: 0,
            allocated: false,
            geometry: GeometryCache::default(),
        }
    }

    fn reset(&mut self) {
        let id = self.id;
        let mut geometry = std::mem::take(&mut self.geometry);
        geometry.reset();
        *self = Self::new(id);
        // keep the vertex allocation for the next occupant of this slot
        self.geometry = geometry;
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }
}

/// Creation parameters computed by the explosion falloff formula.
#[derive(Debug, Clone, Copy)]
pub struct ScarSpawn {
    pub pos: WorldPos,
    /// Radius used for drawing.
    pub draw_radius: f32,
    /// Radius used for the overlap bounding rectangle.
    pub rect_radius: f32,
    pub creation_frame: i32,
    pub life_end: i32,
    pub start_alpha: f32,
    pub alpha_decay: f32,
}

#[derive(Debug)]
pub struct ScarTable {
    scars: Vec<Scar>,
    free_ids: Vec<u16>,
    used_ids: Vec<u16>,
    pending: Vec<u16>,
    field: Vec<Vec<u16>>,
    field_x: i32,
    field_y: i32,
    dims: MapDims,
    /// Monotonic pass stamp; guards against testing a pair twice when a scar
    /// spans several cells.
    overlap_stamp: u32,
    max_overlap: i32,
    evicted_total: u64,
    expired_total: u64,
}

impl ScarTable {
    pub fn new(capacity: usize, dims: MapDims, max_overlap: i32) -> Self {
        let capacity = capacity.clamp(1, u16::MAX as usize);
        let field_x = dims.field_x();
        let field_y = dims.field_y();
        Self {
            scars: (0..capacity as u16).map(Scar::new).collect(),
            free_ids: (0..capacity as u16).rev().collect(),
            used_ids: Vec::new(),
            pending: Vec::new(),
            field: vec![Vec::new(); (field_x * field_y) as usize],
            field_x,
            field_y,
            dims,
            overlap_stamp: 0,
            max_overlap,
            evicted_total: 0,
            expired_total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.scars.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_ids.len()
    }

    pub fn used_count(&self) -> usize {
        self.used_ids.len()
    }

    pub fn used_at(&self, index: usize) -> ScarId {
        ScarId(self.used_ids[index])
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn expired_total(&self) -> u64 {
        self.expired_total
    }

    pub fn scar(&self, id: ScarId) -> Option<&Scar> {
        self.scars.get(id.index()).filter(|scar| scar.allocated)
    }

    pub fn scar_mut(&mut self, id: ScarId) -> Option<&mut Scar> {
        self.scars.get_mut(id.index()).filter(|scar| scar.allocated)
    }

    /// Takes a free id and stages the scar for insertion on the next commit.
    /// `None` means the table is full and the scar is dropped.
    pub fn spawn(&mut self, spawn: ScarSpawn) -> Option<ScarId> {
        let id = self.free_ids.pop()?;

        let rect = self.bounding_rect(spawn.pos, spawn.rect_radius);
        let scar = &mut self.scars[id as usize];
        scar.pos = spawn.pos;
        scar.radius = spawn.draw_radius;
        scar.rect = rect;
        scar.creation_frame = spawn.creation_frame;
        scar.life_end = spawn.life_end;
        scar.start_alpha = spawn.start_alpha;
        scar.alpha_decay = spawn.alpha_decay;
        // the atlas is 2x2; key the quadrant off the id
        scar.tex_offset = [
            if id & 1 == 0 { 0.0 } else { 0.5 },
            if id & 2 == 0 { 0.0 } else { 0.5 },
        ];
        scar.basesize = rect.area();
        scar.overdrawn = 0;
        scar.last_test = 0;
        scar.allocated = true;
        scar.geometry.reset();

        self.pending.push(id);
        Some(ScarId(id))
    }

    /// Runs the eviction pass for every staged scar, then inserts each into
    /// the spatial index and the used set.
    pub fn commit_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);

        for &id in &pending {
            self.charge_overlaps(id);
        }

        for &id in &pending {
            let rect = self.scars[id as usize].rect;
            let (fx1, fy1, fx2, fy2) = self.field_span(rect);
            for fy in fy1..=fy2 {
                for fx in fx1..=fx2 {
                    let cell = (fy * self.field_x + fx) as usize;
                    insert_unique(&mut self.field[cell], id);
                }
            }
            self.used_ids.push(id);
        }
    }

    /// A scar whose lifetime tick has been reached is removed in the same
    /// frame's sweep.
    pub fn is_expired(&self, id: ScarId, frame: i32) -> bool {
        self.scars[id.index()].life_end <= frame
    }

    pub fn expire(&mut self, id: ScarId) {
        self.expired_total += 1;
        self.remove(id);
    }

    /// Erases the scar from every cell it occupies, recycles its id, and
    /// resets the record.
    pub fn remove(&mut self, id: ScarId) {
        let index = id.index();
        if !self.scars[index].allocated {
            return;
        }

        let rect = self.scars[index].rect;
        let (fx1, fy1, fx2, fy2) = self.field_span(rect);
        for fy in fy1..=fy2 {
            for fx in fx1..=fx2 {
                let cell = (fy * self.field_x + fx) as usize;
                erase(&mut self.field[cell], id.0);
            }
        }

        insert_unique(&mut self.free_ids, id.0);
        erase(&mut self.used_ids, id.0);
        erase(&mut self.pending, id.0);
        self.scars[index].reset();
    }

    /// Charges overlap debt from the staged scar `id` onto every committed
    /// scar sharing a field cell, evicting the ones that cross the
    /// threshold. Each existing scar is tested at most once per pass.
    fn charge_overlaps(&mut self, id: u16) {
        let (rect, life_end) = {
            let scar = &self.scars[id as usize];
            (scar.rect, scar.life_end)
        };

        self.overlap_stamp = self.overlap_stamp.wrapping_add(1);
        let stamp = self.overlap_stamp;

        let (fx1, fy1, fx2, fy2) = self.field_span(rect);
        for fy in fy1..=fy2 {
            for fx in fx1..=fx2 {
                let cell = (fy * self.field_x + fx) as usize;
                let mut i = 0;
                while i < self.field[cell].len() {
                    let other_id = self.field[cell][i];
                    let evict = {
                        let other = &mut self.scars[other_id as usize];

                        if other.last_test == stamp || life_end < other.life_end {
                            i += 1;
                            continue;
                        }
                        other.last_test = stamp;

                        let area = rect.overlap_area(other.rect);
                        if area == 0 || other.basesize == 0 {
                            i += 1;
                            continue;
                        }

                        other.overdrawn += area / other.basesize;
                        other.overdrawn > self.max_overlap
                    };

                    if evict {
                        // removal swap-compacts this cell; re-examine index i
                        self.evicted_total += 1;
                        self.remove(ScarId(other_id));
                    } else {
                        i += 1;
                    }
                }
            }
        }
    }

    fn bounding_rect(&self, pos: WorldPos, radius: f32) -> TexelRect {
        let max_x = (self.dims.texels_x() - 1) as f32;
        let max_y = (self.dims.texels_y() - 1) as f32;
        TexelRect {
            x1: ((pos.x - radius) / TEX_QUAD_SIZE).max(0.0) as i32,
            y1: ((pos.z - radius) / TEX_QUAD_SIZE).max(0.0) as i32,
            x2: ((pos.x + radius) / TEX_QUAD_SIZE + 1.0).min(max_x) as i32,
            y2: ((pos.z + radius) / TEX_QUAD_SIZE + 1.0).min(max_y) as i32,
        }
    }

    fn field_span(&self, rect: TexelRect) -> (i32, i32, i32, i32) {
        (
            (rect.x1 / SCAR_FIELD_CELL_TEXELS).clamp(0, self.field_x - 1),
            (rect.y1 / SCAR_FIELD_CELL_TEXELS).clamp(0, self.field_y - 1),
            (rect.x2 / SCAR_FIELD_CELL_TEXELS).clamp(0, self.field_x - 1),
            (rect.y2 / SCAR_FIELD_CELL_TEXELS).clamp(0, self.field_y - 1),
        )
    }

    #[cfg(test)]
    fn cells_containing(&self, id: ScarId) -> usize {
        self.field
            .iter()
            .filter(|cell| cell.contains(&(id.index() as u16)))
            .count()
    }
}

fn insert_unique(ids: &mut Vec<u16>, id: u16) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn erase(ids: &mut Vec<u16>, id: u16) {
    if let Some(position) = ids.iter().position(|&entry| entry == id) {
        ids.swap_remove(position);
    }
}
