use std::collections::HashMap;

use decals::{
    DecalsConfig, Facing, FootprintDecalDef, GhostDrawState, GhostId, GroundDecals, MapDims,
    MemoryImages, ObjectDrawState, ObjectId, ObjectInfo, ObjectStateSource, RgbaPixels,
    TerrainView, WorldPos,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub(crate) const BUILDING_SPAWN_INTERVAL: i32 = 90;
const BUILDING_LIFETIME_FRAMES: i32 = 600;
const GHOST_LIFETIME_FRAMES: i32 = 450;
const BOMBARDMENT_CHANCE: f64 = 0.15;
const BUILD_PROGRESS_PER_FRAME: f32 = 0.01;

struct Building {
    id: ObjectId,
    dies_at: i32,
}

struct Ghost {
    id: GhostId,
    dies_at: i32,
}

/// Scripted stand-in for a game simulation. Spawns buildings that slowly
/// construct and later die (half leaving ghosts behind), and rains random
/// bombardment on the terrain, driving every decal lifecycle path.
pub(crate) struct Battlefield {
    rng: StdRng,
    dims: MapDims,
    sim_frame: i32,
    next_object: u64,
    next_ghost: u64,
    buildings: Vec<Building>,
    ghosts: Vec<Ghost>,
    objects: HashMap<ObjectId, ObjectDrawState>,
    ghost_states: HashMap<GhostId, GhostDrawState>,
}

impl Battlefield {
    pub(crate) fn new(dims: MapDims, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dims,
            sim_frame: 0,
            next_object: 1,
            next_ghost: 1,
            buildings: Vec::new(),
            ghosts: Vec::new(),
            objects: HashMap::new(),
            ghost_states: HashMap::new(),
        }
    }

    pub(crate) fn sim_frame(&self) -> i32 {
        self.sim_frame
    }

    /// Advances the script by one simulation tick.
    pub(crate) fn tick(
        &mut self,
        decals: &mut GroundDecals,
        terrain: &dyn TerrainView,
        draw_frame: u32,
    ) {
        self.sim_frame += 1;

        if self.sim_frame % BUILDING_SPAWN_INTERVAL == 0 {
            self.spawn_building(decals, terrain);
        }

        let mut died = Vec::new();
        for building in &self.buildings {
            if building.dies_at <= self.sim_frame {
                died.push(building.id);
            } else if let Some(ObjectDrawState::Unit { build_progress, .. }) =
                self.objects.get_mut(&building.id)
            {
                *build_progress = (*build_progress + BUILD_PROGRESS_PER_FRAME).min(1.0);
            }
        }
        for id in died {
            self.buildings.retain(|b| b.id != id);
            self.objects.remove(&id);
            if self.rng.gen_bool(0.5) {
                let ghost = GhostId(self.next_ghost);
                self.next_ghost += 1;
                self.ghost_states.insert(
                    ghost,
                    GhostDrawState {
                        last_draw_frame: draw_frame,
                    },
                );
                self.ghosts.push(Ghost {
                    id: ghost,
                    dies_at: self.sim_frame + GHOST_LIFETIME_FRAMES,
                });
                decals.on_object_destroyed(id, Some(ghost));
                debug!(object = id.0, ghost = ghost.0, "building_ghosted");
            } else {
                decals.on_object_destroyed(id, None);
                debug!(object = id.0, "building_destroyed");
            }
        }

        // every ghost is on screen in this harness
        for state in self.ghost_states.values_mut() {
            state.last_draw_frame = draw_frame;
        }

        let expired: Vec<GhostId> = self
            .ghosts
            .iter()
            .filter(|g| g.dies_at <= self.sim_frame)
            .map(|g| g.id)
            .collect();
        for id in expired {
            self.ghosts.retain(|g| g.id != id);
            let last_drawn = self
                .ghost_states
                .remove(&id)
                .map(|g| g.last_draw_frame)
                .unwrap_or(0);
            decals.on_ghost_destroyed(id, last_drawn);
        }

        if self.rng.gen_bool(BOMBARDMENT_CHANCE) {
            let x = self.rng.gen_range(0.0..self.dims.world_x());
            let z = self.rng.gen_range(0.0..self.dims.world_z());
            let damage = self.rng.gen_range(40.0..320.0);
            let radius = self.rng.gen_range(8.0..48.0);
            let pos = WorldPos::new(x, terrain.height_at(x, z), z);
            decals.on_explosion(pos, damage, radius, true, terrain, self.sim_frame);
        }
    }

    /// Player-triggered explosion at a world position.
    pub(crate) fn drop_explosion(
        &mut self,
        x: f32,
        z: f32,
        decals: &mut GroundDecals,
        terrain: &dyn TerrainView,
    ) {
        let pos = WorldPos::new(x, terrain.height_at(x, z), z);
        decals.on_explosion(pos, 300.0, 40.0, true, terrain, self.sim_frame);
    }

    fn spawn_building(&mut self, decals: &mut GroundDecals, terrain: &dyn TerrainView) {
        let id = ObjectId(self.next_object);
        self.next_object += 1;

        let margin = 64.0;
        let x = self.rng.gen_range(margin..self.dims.world_x() - margin);
        let z = self.rng.gen_range(margin..self.dims.world_z() - margin);
        let facing = match self.rng.gen_range(0..4) {
            0 => Facing::South,
            1 => Facing::East,
            2 => Facing::North,
            _ => Facing::West,
        };
        let info = ObjectInfo {
            id,
            pos: WorldPos::new(x, terrain.height_at(x, z), z),
            facing,
            footprint_x: self.rng.gen_range(2..5),
            footprint_y: self.rng.gen_range(2..5),
            decal: FootprintDecalDef {
                uses_ground_decal: true,
                type_name: "launchpad".to_string(),
                decay_rate: 0.25,
            },
        };

        self.objects.insert(
            id,
            ObjectDrawState::Unit {
                build_progress: BUILD_PROGRESS_PER_FRAME,
                in_los: true,
                in_prev_los: true,
                is_icon: false,
            },
        );
        self.buildings.push(Building {
            id,
            dies_at: self.sim_frame + BUILDING_LIFETIME_FRAMES,
        });
        decals.on_object_created(&info);
        debug!(object = id.0, x, z, "building_spawned");
    }
}

impl ObjectStateSource for Battlefield {
    fn object_state(&self, id: ObjectId) -> Option<ObjectDrawState> {
        self.objects.get(&id).copied()
    }

    fn ghost_state(&self, id: GhostId) -> Option<GhostDrawState> {
        self.ghost_states.get(&id).copied()
    }
}

/// Procedural stand-ins for the texture assets the subsystem expects, so the
/// viewer runs without files on disk.
pub(crate) fn build_images(config: &DecalsConfig) -> MemoryImages {
    let mut images = MemoryImages::new();
    images.insert("unittextures/launchpad", pad_texture(64));
    for (index, path) in config.scar_textures.iter().enumerate() {
        images.insert(path.clone(), scar_texture(128, index as u32 + 1));
    }
    images
}

fn pad_texture(size: u32) -> RgbaPixels {
    let mut pixels = RgbaPixels::solid(size, size, [0, 0, 0, 0]);
    for y in 0..size {
        for x in 0..size {
            let border = x < 2 || y < 2 || x >= size - 2 || y >= size - 2;
            let checker = ((x / 8) + (y / 8)) % 2 == 0;
            let color = if border {
                [230, 220, 90, 255]
            } else if checker {
                [90, 90, 100, 220]
            } else {
                [60, 60, 70, 220]
            };
            let i = ((y * size + x) * 4) as usize;
            pixels.data[i..i + 4].copy_from_slice(&color);
        }
    }
    pixels
}

/// Radial crater blob in the legacy scar channel convention: red carries
/// brightness, green carries alpha.
fn scar_texture(size: u32, variant: u32) -> RgbaPixels {
    let mut pixels = RgbaPixels::solid(size, size, [0, 0, 0, 0]);
    let center = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let distance = (dx * dx + dy * dy).sqrt() / center;
            let falloff = (1.0 - distance).clamp(0.0, 1.0);
            // each variant gets a slightly different ring profile
            let ring = ((distance * (4.0 + variant as f32)).sin() * 0.25 + 0.75).clamp(0.0, 1.0);
            let brightness = (falloff * ring * 255.0) as u8;
            let alpha = (falloff * falloff * 255.0) as u8;
            let i = ((y * size + x) * 4) as usize;
            pixels.data[i..i + 4].copy_from_slice(&[brightness, alpha, 0, 255]);
        }
    }
    pixels
}
