//! Instance table (C8): the live game-object list.
//!
//! The source keeps a raw growable array and hands out bare pointers into it
//! across mutations that can move or shift every element. Re-architected
//! here with generational indices (spec.md section 9): a handed-out
//! [`InstanceRef`] pairs a slot with the generation it was issued under, so
//! a slot reused or shifted after the caller's reference was taken is simply
//! reported absent rather than silently aliasing the wrong instance.

use log::debug;

use crate::types::{AssetIndex, InstanceId};

const START_CAPACITY: usize = 1;

/// A live object instance and its per-instance state.
///
/// Only the fields `_InitInstance` sets are modeled; anything the
/// interpreter tracks purely through fields in the field table (C5) has no
/// home here.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Stable instance id (ascending insertion order, with one exception;
    /// see [`InstanceTable::add`]).
    pub id: InstanceId,
    /// False once the instance has been logically deleted but not yet
    /// compacted out by [`InstanceTable::clear_deleted`].
    pub exists: bool,
    pub object_index: AssetIndex,
    pub solid: bool,
    pub visible: bool,
    pub persistent: bool,
    pub depth: i32,
    pub alarm: [i32; 12],
    pub sprite_index: AssetIndex,
    pub mask_index: AssetIndex,
    pub image_alpha: f64,
    pub image_blend: u32,
    pub image_index: f64,
    pub image_speed: f64,
    pub image_xscale: f64,
    pub image_yscale: f64,
    pub image_angle: f64,
    pub direction: f64,
    pub gravity_direction: f64,
    pub gravity: f64,
    pub friction: f64,
    pub hspeed: f64,
    pub vspeed: f64,
    pub speed: f64,
    pub x: f64,
    pub y: f64,
    pub xprevious: f64,
    pub yprevious: f64,
    pub xstart: f64,
    pub ystart: f64,
    pub path_index: AssetIndex,
    pub path_position: f64,
    pub path_positionprevious: f64,
    pub path_speed: f64,
    pub path_scale: f64,
    pub path_orientation: f64,
    pub path_endaction: i32,
    pub timeline_index: AssetIndex,
    pub timeline_running: bool,
    pub timeline_speed: f64,
    pub timeline_position: f64,
    pub timeline_loop: bool,
    pub bbox_left: i32,
    pub bbox_top: i32,
    pub bbox_right: i32,
    pub bbox_bottom: i32,
    pub bbox_is_stale: bool,
}

impl Instance {
    fn new(id: InstanceId, x: f64, y: f64, object_index: AssetIndex) -> Self {
        Instance {
            id,
            exists: true,
            object_index,
            solid: false,
            visible: true,
            persistent: false,
            depth: 0,
            alarm: [0; 12],
            sprite_index: -1,
            mask_index: -1,
            image_alpha: 1.0,
            image_blend: 0xFF_FFFF,
            image_index: 0.0,
            image_speed: 1.0,
            image_xscale: 1.0,
            image_yscale: 1.0,
            image_angle: 0.0,
            direction: 0.0,
            gravity_direction: 270.0,
            gravity: 0.0,
            friction: 0.0,
            hspeed: 0.0,
            vspeed: 0.0,
            speed: 0.0,
            x,
            y,
            xprevious: x,
            yprevious: y,
            xstart: x,
            ystart: y,
            path_index: -1,
            path_position: 0.0,
            path_positionprevious: 0.0,
            path_speed: 0.0,
            path_scale: 1.0,
            path_orientation: 0.0,
            path_endaction: 0,
            timeline_index: -1,
            timeline_running: false,
            timeline_speed: 1.0,
            timeline_position: 0.0,
            timeline_loop: false,
            bbox_left: 0,
            bbox_top: 0,
            bbox_right: 0,
            bbox_bottom: 0,
            bbox_is_stale: true,
        }
    }
}

/// A handed-out reference to a slot, valid only until that slot's
/// generation advances (on overwrite, shift, or compaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRef {
    slot: usize,
    generation: u32,
}

/// The live instance list (C8).
pub struct InstanceTable {
    slots: Vec<Instance>,
    generations: Vec<u32>,
    size: usize,
    highest_id_added: InstanceId,
}

impl Default for InstanceTable {
    fn default() -> Self {
        InstanceTable::new()
    }
}

impl InstanceTable {
    /// An empty table at the source's starting capacity.
    pub fn new() -> Self {
        InstanceTable {
            slots: Vec::with_capacity(START_CAPACITY),
            generations: Vec::with_capacity(START_CAPACITY),
            size: 0,
            highest_id_added: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.capacity().max(START_CAPACITY)
    }

    fn grow_if_full(&mut self) {
        if self.size >= self.capacity() {
            let new_cap = (self.capacity() * 2).max(START_CAPACITY);
            self.slots.reserve(new_cap - self.slots.len());
            self.generations.reserve(new_cap - self.generations.len());
            debug!("instance table grown to capacity {}", new_cap);
        }
    }

    /// Insert a new instance, returning a reference to it.
    ///
    /// If `id` is lower than the highest id added so far, later entries are
    /// shifted forward to keep storage order ascending by id, per the
    /// source's intended (if not literally transcribed) insertion rule;
    /// otherwise the instance is appended.
    pub fn add(&mut self, id: InstanceId, x: f64, y: f64, object_index: AssetIndex) -> InstanceRef {
        self.grow_if_full();
        let instance = Instance::new(id, x, y, object_index);

        if self.highest_id_added > id {
            if let Some(pos) = self.slots[..self.size].iter().position(|i| i.id > id) {
                self.slots.insert(pos, instance);
                self.generations.insert(pos, 0);
                self.size += 1;
                self.bump_generations_from(pos + 1);
                return InstanceRef { slot: pos, generation: self.generations[pos] };
            }
        }

        let slot = self.size;
        if slot == self.slots.len() {
            self.slots.push(instance);
            self.generations.push(0);
        } else {
            self.slots[slot] = instance;
            self.generations[slot] += 1;
        }
        self.size += 1;
        self.highest_id_added = id;
        InstanceRef { slot, generation: self.generations[slot] }
    }

    fn bump_generations_from(&mut self, from: usize) {
        for g in &mut self.generations[from..self.size] {
            *g = g.wrapping_add(1);
        }
    }

    /// Delete the instance with the given id, if present.
    ///
    /// The source matches `_list[i].id < id`, which deletes the first
    /// lower-id neighbor rather than the requested instance (spec.md
    /// section 9's documented bug). Corrected here to match `== id`.
    pub fn delete(&mut self, id: InstanceId) {
        if let Some(pos) = self.slots[..self.size].iter().position(|i| i.id == id) {
            self.slots.remove(pos);
            self.generations.remove(pos);
            self.slots.push(Instance::new(0, 0.0, 0.0, -1));
            self.generations.push(0);
            self.size -= 1;
            self.bump_generations_from(pos);
        }
    }

    /// Drop every instance unconditionally.
    pub fn clear_all(&mut self) {
        self.size = 0;
        for g in &mut self.generations {
            *g = g.wrapping_add(1);
        }
    }

    /// Keep only instances that are both `persistent` and `exists`.
    pub fn clear_non_persistent(&mut self) {
        self.retain(|i| i.persistent && i.exists);
    }

    /// Keep only instances with `exists == true`.
    pub fn clear_deleted(&mut self) {
        self.retain(|i| i.exists);
    }

    fn retain(&mut self, pred: impl Fn(&Instance) -> bool) {
        let mut placed = 0;
        for i in 0..self.size {
            if pred(&self.slots[i]) {
                if placed != i {
                    self.slots.swap(placed, i);
                    self.generations[placed] = self.generations[placed].wrapping_add(1);
                }
                placed += 1;
            }
        }
        self.size = placed;
    }

    /// Look up by instance id (`n > 100000`) or by object class (otherwise),
    /// first match, skipping deleted instances.
    pub fn get_by_number(&self, n: u32) -> Option<&Instance> {
        if n > 100_000 {
            self.slots[..self.size].iter().find(|i| i.id == n && i.exists)
        } else {
            self.slots[..self.size].iter().find(|i| i.object_index == n as AssetIndex && i.exists)
        }
    }

    /// Index access by storage position.
    pub fn get(&self, r: InstanceRef) -> Option<&Instance> {
        if r.slot >= self.size || self.generations.get(r.slot) != Some(&r.generation) {
            return None;
        }
        self.slots.get(r.slot)
    }

    /// Mutable index access by storage position.
    pub fn get_mut(&mut self, r: InstanceRef) -> Option<&mut Instance> {
        if r.slot >= self.size || self.generations.get(r.slot) != Some(&r.generation) {
            return None;
        }
        self.slots.get_mut(r.slot)
    }

    /// Number of instances currently stored (including deleted-but-not-yet-
    /// compacted ones).
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the table holds no instances.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Iterate live instances in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.slots[..self.size].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_ascending_order_on_out_of_order_insert() {
        let mut t = InstanceTable::new();
        t.add(10, 0.0, 0.0, 0);
        t.add(20, 0.0, 0.0, 0);
        t.add(15, 0.0, 0.0, 0);
        let ids: Vec<_> = t.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![10, 15, 20]);
    }

    #[test]
    fn delete_removes_the_matching_id_not_a_neighbor() {
        let mut t = InstanceTable::new();
        t.add(1, 0.0, 0.0, 0);
        t.add(2, 0.0, 0.0, 0);
        t.add(3, 0.0, 0.0, 0);
        t.delete(2);
        let ids: Vec<_> = t.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn stale_reference_is_invalidated_by_delete() {
        let mut t = InstanceTable::new();
        let r = t.add(1, 0.0, 0.0, 0);
        t.add(2, 0.0, 0.0, 0);
        t.delete(1);
        assert!(t.get(r).is_none());
    }

    #[test]
    fn init_instance_sets_source_defaults() {
        let mut t = InstanceTable::new();
        let r = t.add(1, 3.0, 4.0, 7);
        let i = t.get(r).unwrap();
        assert_eq!(i.direction, 0.0);
        assert_eq!(i.gravity_direction, 270.0);
        assert_eq!(i.image_blend, 0xFF_FFFF);
        assert_eq!(i.speed, 0.0);
        assert_eq!(i.path_index, -1);
        assert_eq!(i.timeline_index, -1);
        assert_eq!(i.alarm, [0; 12]);
        assert_eq!(i.x, 3.0);
        assert_eq!(i.xstart, 3.0);
    }

    #[test]
    fn clear_non_persistent_drops_transient_instances() {
        let mut t = InstanceTable::new();
        let r1 = t.add(1, 0.0, 0.0, 0);
        t.add(2, 0.0, 0.0, 0);
        t.get_mut(r1).unwrap().persistent = true;
        t.clear_non_persistent();
        assert_eq!(t.len(), 1);
        assert!(t.iter().next().unwrap().persistent);
    }

    #[test]
    fn clear_deleted_compacts_out_dead_instances() {
        let mut t = InstanceTable::new();
        let r1 = t.add(1, 0.0, 0.0, 0);
        t.add(2, 0.0, 0.0, 0);
        t.get_mut(r1).unwrap().exists = false;
        t.clear_deleted();
        assert_eq!(t.len(), 1);
        assert_eq!(t.iter().next().unwrap().id, 2);
    }

    #[test]
    fn get_by_number_distinguishes_instance_id_from_object_class() {
        let mut t = InstanceTable::new();
        t.add(100_001, 0.0, 0.0, 5);
        assert_eq!(t.get_by_number(100_001).unwrap().object_index, 5);
        assert_eq!(t.get_by_number(5).unwrap().id, 100_001);
        assert!(t.get_by_number(6).is_none());
    }
}
