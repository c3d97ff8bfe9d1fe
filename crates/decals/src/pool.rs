//! Fixed-capacity arena for footprint decal records.
//!
//! Handles carry a slot index plus a generation counter, so a handle held by
//! a simulation object or ghost after the decal was freed resolves to `None`
//! instead of aliasing a recycled record. Exhaustion is a soft failure:
//! `allocate` returns `None` and the caller skips the decal.

use crate::geometry::{FootprintLayout, GeometryCache};
use crate::sim::{GhostId, ObjectId};
use crate::world::WorldPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecalHandle {
    slot: u32,
    generation: u32,
}

/// A persistent footprint decal bound to (at most) one simulation object or
/// one ghost record.
#[derive(Debug, Clone)]
pub struct DecalRecord {
    pub pos: WorldPos,
    /// Conservative world-space bound used for view culling.
    pub radius: f32,
    pub layout: FootprintLayout,
    /// Current opacity, 0..1.
    pub alpha: f32,
    /// Opacity lost per millisecond while unowned.
    pub alpha_falloff: f32,
    pub owner: Option<ObjectId>,
    pub ghost: Option<GhostId>,
    pub geometry: GeometryCache,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    record: Option<DecalRecord>,
}

#[derive(Debug)]
pub struct DecalPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl DecalPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                record: None,
            })
            .collect();
        // pop from the back hands out low slots first
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Places `record` into a free slot. `None` means the pool is exhausted.
    pub fn allocate(&mut self, record: DecalRecord) -> Option<DecalHandle> {
        let slot = self.free.pop()?;
        let entry = &mut self.slots[slot as usize];
        entry.record = Some(record);
        Some(DecalHandle {
            slot,
            generation: entry.generation,
        })
    }

    /// Frees the record behind `handle`. Stale handles are ignored.
    pub fn free(&mut self, handle: DecalHandle) -> bool {
        let Some(entry) = self.slots.get_mut(handle.slot as usize) else {
            return false;
        };
        if entry.generation != handle.generation || entry.record.is_none() {
            return false;
        }
        entry.record = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.slot);
        true
    }

    pub fn get(&self, handle: DecalHandle) -> Option<&DecalRecord> {
        self.slots
            .get(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.record.as_ref())
    }

    pub fn get_mut(&mut self, handle: DecalHandle) -> Option<&mut DecalRecord> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.record.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Facing;

    fn record() -> DecalRecord {
        DecalRecord {
            pos: WorldPos::default(),
            radius: 10.0,
            layout: FootprintLayout {
                pos_x: 0,
                pos_y: 0,
                size_x: 2,
                size_y: 2,
                facing: Facing::South,
            },
            alpha: 1.0,
            alpha_falloff: 0.001,
            owner: None,
            ghost: None,
            geometry: GeometryCache::default(),
        }
    }

    #[test]
    fn allocate_until_exhausted_then_none() {
        let mut pool = DecalPool::new(3);
        let handles: Vec<_> = (0..3).map(|_| pool.allocate(record()).expect("slot")).collect();

        assert_eq!(pool.live_count(), 3);
        assert!(pool.allocate(record()).is_none());

        // all handles distinct and live
        for (i, a) in handles.iter().enumerate() {
            assert!(pool.get(*a).is_some());
            for b in &handles[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn free_returns_capacity() {
        let mut pool = DecalPool::new(1);
        let handle = pool.allocate(record()).expect("slot");

        assert!(pool.free(handle));
        assert_eq!(pool.live_count(), 0);
        assert!(pool.allocate(record()).is_some());
    }

    #[test]
    fn stale_handle_resolves_to_none_after_reuse() {
        let mut pool = DecalPool::new(1);
        let first = pool.allocate(record()).expect("slot");
        pool.free(first);
        let second = pool.allocate(record()).expect("slot");

        assert!(pool.get(first).is_none());
        assert!(pool.get_mut(first).is_none());
        assert!(pool.get(second).is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn double_free_is_ignored() {
        let mut pool = DecalPool::new(2);
        let handle = pool.allocate(record()).expect("slot");

        assert!(pool.free(handle));
        assert!(!pool.free(handle));
        assert_eq!(pool.live_count(), 0);

        // the slot is back in the free list exactly once
        let a = pool.allocate(record()).expect("slot");
        let b = pool.allocate(record()).expect("slot");
        assert_ne!(a, b);
        assert!(pool.allocate(record()).is_none());
    }

    #[test]
    fn handles_never_alias_two_live_records() {
        let mut pool = DecalPool::new(4);
        let mut live = Vec::new();
        for _ in 0..4 {
            live.push(pool.allocate(record()).expect("slot"));
        }
        let freed = live.remove(1);
        pool.free(freed);
        let replacement = pool.allocate(record()).expect("slot");

        assert!(pool.get(freed).is_none());
        for handle in live.iter().chain(std::iter::once(&replacement)) {
            assert!(pool.get(*handle).is_some());
        }
    }
}
