//! Frame orchestrator and simulation-event adapter.
//!
//! [`GroundDecals`] is the single owner of all decal state: the footprint
//! pool, the scar table, the type registry, and the maps binding simulation
//! objects and ghosts to their decal handles. Simulation events mutate state
//! only; all drawing, fading, expiry, and geometry work happens inside
//! [`GroundDecals::render_frame`], once per rendered frame, on one thread.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::assets::{ImageSource, RgbaPixels};
use crate::atlas::build_scar_atlas;
use crate::backend::{DrawBackend, TextureHandle};
use crate::config::DecalsConfig;
use crate::geometry::{
    build_footprint, build_scar, refresh_footprint, refresh_scar, scar_fade_alpha, BuildState,
    FootprintLayout, GeometryCache,
};
use crate::pool::{DecalHandle, DecalPool, DecalRecord};
use crate::registry::{DecalTypeRegistry, TypeLookup};
use crate::scars::{ScarSpawn, ScarTable};
use crate::sim::{GhostId, ObjectDrawState, ObjectId, ObjectInfo, ObjectStateSource};
use crate::terrain::TerrainView;
use crate::world::{MapDims, WorldPos, SQUARE_SIZE, TEX_QUAD_SIZE};

/// What the local player is allowed to see.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerView {
    pub spectating_full_view: bool,
    /// Whether out-of-LOS building ghosts (and their decals) are shown.
    pub ghosted_buildings: bool,
}

/// Circular view region for culling; `None` camera draws everything.
#[derive(Debug, Clone, Copy)]
pub struct ViewCircle {
    pub x: f32,
    pub z: f32,
    pub radius: f32,
}

/// Per-frame inputs to [`GroundDecals::render_frame`].
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub sim_frame: i32,
    pub draw_frame: u32,
    /// Wall-clock time covered by this frame, in milliseconds.
    pub frame_time_ms: f32,
    /// Simulation speed multiplier; scales ownerless decal fading.
    pub speed_factor: f32,
    pub camera: Option<ViewCircle>,
    pub player: PlayerView,
}

impl FrameContext {
    pub fn visible(&self, pos: WorldPos, radius: f32) -> bool {
        match self.camera {
            None => true,
            Some(view) => {
                let dx = pos.x - view.x;
                let dz = pos.z - view.z;
                let reach = view.radius + radius;
                dx * dx + dz * dz <= reach * reach
            }
        }
    }
}

/// Opacity and draw gate derived from an owner's current draw state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OwnerVisual {
    alpha: f32,
    drawn: bool,
}

fn owner_visual(state: ObjectDrawState, player: PlayerView) -> OwnerVisual {
    match state {
        ObjectDrawState::Unit {
            build_progress,
            in_los,
            in_prev_los,
            is_icon,
        } => OwnerVisual {
            alpha: build_progress.clamp(0.0, 1.0),
            drawn: !is_icon
                && (in_los
                    || player.spectating_full_view
                    || (in_prev_los && player.ghosted_buildings)),
        },
        ObjectDrawState::Feature { draw_alpha, in_los } => OwnerVisual {
            alpha: draw_alpha.clamp(0.0, 1.0),
            drawn: in_los || player.spectating_full_view,
        },
    }
}

pub struct GroundDecals {
    config: DecalsConfig,
    enabled: bool,
    dims: MapDims,
    images: Box<dyn ImageSource>,
    pool: DecalPool,
    scars: ScarTable,
    registry: DecalTypeRegistry,
    /// Assembled at construction, consumed by the first rendered frame.
    atlas_pixels: Option<RgbaPixels>,
    scar_texture: Option<TextureHandle>,
    object_decals: HashMap<ObjectId, DecalHandle>,
    ghost_decals: HashMap<GhostId, DecalHandle>,
    last_draw_frame: u32,
    dropped_decals: u64,
    dropped_scars: u64,
    warned_pool_full: bool,
    warned_scars_full: bool,
}

impl GroundDecals {
    pub fn new(config: DecalsConfig, dims: MapDims, images: Box<dyn ImageSource>) -> Self {
        let enabled = config.decals_enabled();
        let atlas_pixels =
            enabled.then(|| build_scar_atlas(&config.scar_textures, images.as_ref()));

        info!(
            decal_level = config.decal_level,
            pool_capacity = config.decal_pool_capacity,
            scar_capacity = config.scar_capacity,
            enabled,
            "ground_decals_initialized"
        );

        let pool = DecalPool::new(config.decal_pool_capacity);
        let scars = ScarTable::new(config.scar_capacity, dims, config.max_scar_overlap());
        Self {
            config,
            enabled,
            dims,
            images,
            pool,
            scars,
            registry: DecalTypeRegistry::new(),
            atlas_pixels,
            scar_texture: None,
            object_decals: HashMap::new(),
            ghost_decals: HashMap::new(),
            last_draw_frame: 0,
            dropped_decals: 0,
            dropped_scars: 0,
            warned_pool_full: false,
            warned_scars_full: false,
        }
    }

    /// Runtime toggle; events and frames are no-ops while disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.config.decals_enabled();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn live_decal_count(&self) -> usize {
        self.pool.live_count()
    }

    pub fn live_scar_count(&self) -> usize {
        self.scars.used_count()
    }

    /// Decals skipped because the pool was full or the type unresolvable.
    pub fn dropped_decal_count(&self) -> u64 {
        self.dropped_decals
    }

    /// Scars dropped because the table was full.
    pub fn dropped_scar_count(&self) -> u64 {
        self.dropped_scars
    }

    pub fn on_object_created(&mut self, info: &ObjectInfo) {
        self.move_object(info);
    }

    pub fn on_object_moved(&mut self, info: &ObjectInfo) {
        self.move_object(info);
    }

    /// Detaches the object's decal so it starts fading, or hands it to a
    /// ghost record that keeps it alive out of LOS.
    pub fn on_object_destroyed(&mut self, id: ObjectId, ghost: Option<GhostId>) {
        let Some(handle) = self.object_decals.remove(&id) else {
            return;
        };
        let Some(record) = self.pool.get_mut(handle) else {
            return;
        };
        record.owner = None;
        if let Some(ghost_id) = ghost {
            record.ghost = Some(ghost_id);
            self.ghost_decals.insert(ghost_id, handle);
        }
    }

    /// Transport-load case: the object leaves the ground, its decal is
    /// removed immediately rather than fading out.
    pub fn force_remove_object(&mut self, id: ObjectId) {
        let Some(handle) = self.object_decals.remove(&id) else {
            return;
        };
        if let Some(record) = self.pool.get_mut(handle) {
            record.owner = None;
            record.alpha = 0.0;
        }
    }

    /// Transport-unload case: the object is back on the ground.
    pub fn on_object_unloaded(&mut self, info: &ObjectInfo) {
        self.move_object(info);
    }

    /// Detaches a dying ghost's decal. A ghost that was never actually
    /// rendered leaves no visual trace, so its decal vanishes with it.
    pub fn on_ghost_destroyed(&mut self, id: GhostId, ghost_last_draw_frame: u32) {
        let Some(handle) = self.ghost_decals.remove(&id) else {
            return;
        };
        let Some(record) = self.pool.get_mut(handle) else {
            return;
        };
        record.ghost = None;
        if ghost_last_draw_frame + 1 < self.last_draw_frame {
            record.alpha = 0.0;
        }
    }

    fn move_object(&mut self, info: &ObjectInfo) {
        if !self.enabled || !info.decal.uses_ground_decal {
            return;
        }

        // the old decal (if any) is left behind to fade out
        if let Some(old) = self.object_decals.remove(&info.id) {
            if let Some(record) = self.pool.get_mut(old) {
                record.owner = None;
            }
        }

        let type_index = match self.registry.resolve(&info.decal.type_name, self.images.as_ref())
        {
            TypeLookup::Index(index) => index,
            TypeLookup::Missing => {
                self.dropped_decals += 1;
                return;
            }
        };

        let (fx, fy) = if info.facing.swaps_axes() {
            (info.footprint_y, info.footprint_x)
        } else {
            (info.footprint_x, info.footprint_y)
        };
        let size_x = fx * 2;
        let size_y = fy * 2;
        let layout = FootprintLayout {
            pos_x: (info.pos.x / SQUARE_SIZE) as i32 - size_x / 2,
            pos_y: (info.pos.z / SQUARE_SIZE) as i32 - size_y / 2,
            size_x,
            size_y,
            facing: info.facing,
        };
        let radius = ((size_x * size_x + size_y * size_y) as f32).sqrt() * SQUARE_SIZE + 20.0;

        let record = DecalRecord {
            pos: info.pos,
            radius,
            layout,
            alpha: 0.0,
            alpha_falloff: info.decal.decay_rate,
            owner: Some(info.id),
            ghost: None,
            geometry: GeometryCache::default(),
        };

        match self.pool.allocate(record) {
            Some(handle) => {
                self.registry.attach(type_index, handle);
                self.object_decals.insert(info.id, handle);
            }
            None => {
                self.dropped_decals += 1;
                if !self.warned_pool_full {
                    warn!(
                        capacity = self.pool.capacity(),
                        "decal_pool_exhausted"
                    );
                    self.warned_pool_full = true;
                }
            }
        }
    }

    /// Registers a terrain scar for an explosion, after the altitude, radius
    /// and damage gates. Actual placement (and eviction of overdrawn older
    /// scars) happens on the next rendered frame.
    pub fn on_explosion(
        &mut self,
        pos: WorldPos,
        damage: f32,
        radius: f32,
        produces_scar: bool,
        terrain: &dyn TerrainView,
        sim_frame: i32,
    ) {
        if !self.enabled || !produces_scar {
            return;
        }

        let altitude = pos.y - terrain.height_at(pos.x, pos.z);
        if altitude <= -1.0 || altitude >= radius {
            return;
        }

        let mut pos = pos;
        pos.y -= altitude;
        let mut radius = radius - altitude;
        if radius < 5.0 {
            return;
        }

        let mut damage = damage.min(radius * 30.0);
        damage *= radius / (radius + altitude);
        radius = radius.min(damage * 0.25);
        if damage > 400.0 {
            damage = 400.0 + (damage - 399.0).sqrt();
        }

        let ttl = ((self.config.decal_level as f32 * damage * 3.0) as i32).max(1);
        let start_alpha = damage.clamp(50.0, 255.0);

        let spawn = ScarSpawn {
            pos: pos.clamped(self.dims),
            draw_radius: radius * 1.4,
            rect_radius: radius,
            creation_frame: sim_frame,
            life_end: sim_frame + ttl,
            start_alpha,
            alpha_decay: start_alpha / ttl as f32,
        };

        if self.scars.spawn(spawn).is_none() {
            self.dropped_scars += 1;
            if !self.warned_scars_full {
                warn!(capacity = self.scars.capacity(), "scar_table_exhausted");
                self.warned_scars_full = true;
            }
        }
    }

    /// Draws every visible decal and scar: uploads pending textures, commits
    /// staged scars (running the overlap-eviction pass), recomputes footprint
    /// opacity from owner state, frees fully-faded ownerless decals, sweeps
    /// expired scars, and submits one quad batch per texture.
    pub fn render_frame(
        &mut self,
        frame: &FrameContext,
        terrain: &dyn TerrainView,
        states: &dyn ObjectStateSource,
        backend: &mut dyn DrawBackend,
    ) {
        if !self.enabled {
            return;
        }
        self.last_draw_frame = frame.draw_frame;

        if self.scar_texture.is_none() {
            if let Some(pixels) = self.atlas_pixels.take() {
                self.scar_texture = Some(backend.upload_texture(&pixels));
                debug!("scar_atlas_uploaded");
            }
        }
        self.registry.upload_pending(backend);

        for type_index in 0..self.registry.type_count() {
            let texture = self.registry.texture(type_index);
            draw_type_decals(
                texture,
                self.registry.decals_mut(type_index),
                &mut self.pool,
                &mut self.object_decals,
                frame,
                terrain,
                states,
                backend,
            );
        }

        self.scars.commit_pending();
        let fade_mode = self.config.ground_scar_alpha_fade;
        let mut index = 0;
        while index < self.scars.used_count() {
            let id = self.scars.used_at(index);
            if self.scars.is_expired(id, frame.sim_frame) {
                self.scars.expire(id);
                // swap-removal moved another id into this slot
                continue;
            }

            let scar_texture = self.scar_texture;
            if let (Some(texture), Some(scar)) = (scar_texture, self.scars.scar_mut(id)) {
                if frame.visible(scar.pos, scar.radius + TEX_QUAD_SIZE) {
                    if scar.geometry.state == BuildState::Empty {
                        let (pos, radius, offset) = (scar.pos, scar.radius, scar.tex_offset);
                        build_scar(&mut scar.geometry, terrain, pos, radius, offset);
                    }
                    if fade_mode {
                        let alpha = scar_fade_alpha(
                            scar.start_alpha,
                            scar.alpha_decay,
                            scar.creation_frame,
                            frame.sim_frame,
                        );
                        refresh_scar(&mut scar.geometry, terrain, alpha);
                    }
                    if !scar.geometry.verts.is_empty() {
                        backend.draw_quads(texture, &scar.geometry.verts, [0.0, 0.0]);
                    }
                }
            }
            index += 1;
        }
    }

    /// Releases every backend texture and forgets all decal and scar state.
    pub fn teardown(&mut self, backend: &mut dyn DrawBackend) {
        self.registry.teardown(backend);
        if let Some(texture) = self.scar_texture.take() {
            backend.release_texture(texture);
        }
        self.object_decals.clear();
        self.ghost_decals.clear();
        self.pool = DecalPool::new(self.config.decal_pool_capacity);
        self.scars = ScarTable::new(
            self.config.scar_capacity,
            self.dims,
            self.config.max_scar_overlap(),
        );
    }
}

/// Per-type decal pass: opacity recompute, fade/free, geometry upkeep and
/// batched submission. Freed and stale handles are compacted out of the
/// type's list in place.
#[allow(clippy::too_many_arguments)]
fn draw_type_decals(
    texture: Option<TextureHandle>,
    list: &mut Vec<DecalHandle>,
    pool: &mut DecalPool,
    object_decals: &mut HashMap<ObjectId, DecalHandle>,
    frame: &FrameContext,
    terrain: &dyn TerrainView,
    states: &dyn ObjectStateSource,
    backend: &mut dyn DrawBackend,
) {
    let mut index = 0;
    while index < list.len() {
        let handle = list[index];
        let Some(record) = pool.get_mut(handle) else {
            list.swap_remove(index);
            continue;
        };

        let mut drawn = true;
        if let Some(owner) = record.owner {
            match states.object_state(owner) {
                Some(state) => {
                    let visual = owner_visual(state, frame.player);
                    record.alpha = visual.alpha;
                    drawn = visual.drawn;
                }
                None => {
                    // owner vanished without an event; start fading next frame
                    object_decals.remove(&owner);
                    record.owner = None;
                }
            }
        } else if let Some(ghost) = record.ghost {
            match states.ghost_state(ghost) {
                Some(_) => {
                    drawn = frame.player.ghosted_buildings || frame.player.spectating_full_view;
                }
                None => record.ghost = None,
            }
        } else {
            record.alpha -=
                record.alpha_falloff * frame.frame_time_ms * 0.001 * frame.speed_factor;
            if record.alpha <= 0.0 {
                pool.free(handle);
                list.swap_remove(index);
                continue;
            }
        }

        if drawn && frame.visible(record.pos, record.radius) {
            if let Some(texture) = texture {
                match record.geometry.state {
                    BuildState::Empty => {
                        let layout = record.layout;
                        build_footprint(&mut record.geometry, terrain, &layout, record.alpha);
                    }
                    BuildState::NeedsRefresh => {
                        refresh_footprint(&mut record.geometry, terrain, record.alpha);
                    }
                    BuildState::Built => {}
                }
                if !record.geometry.verts.is_empty() {
                    // keep the decal aligned with an owner sitting off the
                    // square grid
                    let offset = [record.pos.x % SQUARE_SIZE, record.pos.z % SQUARE_SIZE];
                    backend.draw_quads(texture, &record.geometry.verts, offset);
                    record.geometry.mark_needs_refresh();
                }
            }
        }

        index += 1;
    }
}
