//! Simulation-registry seam.
//!
//! The decal subsystem never owns or inspects simulation objects directly.
//! Lifecycle events carry an [`ObjectInfo`] snapshot, and per-frame opacity
//! recomputation pulls the current draw state of live owners through
//! [`ObjectStateSource`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GhostId(pub u64);

/// Visual decal configuration from an object's definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintDecalDef {
    /// False opts this object class out of ground decals entirely.
    pub uses_ground_decal: bool,
    /// Texture name, resolved as `unittextures/<lowercased-name>`.
    pub type_name: String,
    /// Opacity lost per second once the decal has no owner and no ghost.
    pub decay_rate: f32,
}

/// Snapshot of an object at event time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub pos: crate::world::WorldPos,
    pub facing: crate::world::Facing,
    /// Footprint size in terrain cells (pre-rotation).
    pub footprint_x: i32,
    pub footprint_y: i32,
    pub decal: FootprintDecalDef,
}

/// Current draw state of a live decal owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectDrawState {
    Unit {
        /// 0..1; a structure under construction shows a fractional decal.
        build_progress: f32,
        in_los: bool,
        in_prev_los: bool,
        /// Iconified units draw no decal.
        is_icon: bool,
    },
    Feature {
        draw_alpha: f32,
        in_los: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GhostDrawState {
    pub last_draw_frame: u32,
}

pub trait ObjectStateSource {
    fn object_state(&self, id: ObjectId) -> Option<ObjectDrawState>;

    fn ghost_state(&self, id: GhostId) -> Option<GhostDrawState>;
}
