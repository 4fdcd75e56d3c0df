//! Alarm registry (C9): per-instance named countdown timers.
//!
//! The source keeps this as a process-wide `std::map`. Re-architected per
//! spec.md section 9 as an owned component threaded explicitly into tick and
//! event-dispatch operations, rather than global mutable state.

use std::collections::BTreeMap;

use crate::types::InstanceId;

/// `instance_id -> (slot -> value)`.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: BTreeMap<InstanceId, BTreeMap<u32, i32>>,
}

impl AlarmRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        AlarmRegistry { alarms: BTreeMap::new() }
    }

    /// Set instance `i`'s alarm slot `a` to `v`.
    pub fn set(&mut self, i: InstanceId, a: u32, v: i32) {
        self.alarms.entry(i).or_default().insert(a, v);
    }

    /// Read instance `i`'s alarm slot `a`, or `0` if unset.
    pub fn get(&self, i: InstanceId, a: u32) -> i32 {
        self.alarms.get(&i).and_then(|slots| slots.get(&a)).copied().unwrap_or(0)
    }

    /// Decrement every positive alarm value across every instance by one.
    pub fn tick_all(&mut self) {
        for slots in self.alarms.values_mut() {
            for v in slots.values_mut() {
                if *v > 0 {
                    *v -= 1;
                }
            }
        }
    }

    /// Remove instance `i`'s alarm slot `a`. Drops the instance's entry
    /// entirely if this empties its slot map.
    pub fn delete(&mut self, i: InstanceId, a: u32) {
        if let Some(slots) = self.alarms.get_mut(&i) {
            slots.remove(&a);
            if slots.is_empty() {
                self.alarms.remove(&i);
            }
        }
    }

    /// Clear every instance's alarms.
    pub fn delete_all(&mut self) {
        self.alarms.clear();
    }

    /// Drop instance `i`'s whole slot map, regardless of contents.
    pub fn remove_instance(&mut self, i: InstanceId) {
        self.alarms.remove(&i);
    }

    /// A snapshot of instance `i`'s slot map, empty if `i` has no alarms set.
    pub fn snapshot(&self, i: InstanceId) -> BTreeMap<u32, i32> {
        self.alarms.get(&i).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_alarm_reads_as_zero() {
        let reg = AlarmRegistry::new();
        assert_eq!(reg.get(1, 0), 0);
    }

    #[test]
    fn tick_all_decrements_only_positive_values() {
        let mut reg = AlarmRegistry::new();
        reg.set(1, 0, 3);
        reg.set(1, 1, 0);
        reg.set(1, 2, -1);
        reg.tick_all();
        assert_eq!(reg.get(1, 0), 2);
        assert_eq!(reg.get(1, 1), 0);
        assert_eq!(reg.get(1, 2), -1);
    }

    #[test]
    fn delete_clears_the_slot_and_reads_back_as_zero() {
        let mut reg = AlarmRegistry::new();
        reg.set(1, 0, 5);
        reg.delete(1, 0);
        assert_eq!(reg.get(1, 0), 0);
        assert!(reg.snapshot(1).is_empty());
    }

    #[test]
    fn deleting_the_last_slot_drops_the_instance_entry() {
        let mut reg = AlarmRegistry::new();
        reg.set(2, 0, 1);
        reg.delete(2, 0);
        assert!(reg.snapshot(2).is_empty());
    }

    #[test]
    fn remove_instance_drops_every_slot_at_once() {
        let mut reg = AlarmRegistry::new();
        reg.set(5, 0, 1);
        reg.set(5, 1, 2);
        reg.remove_instance(5);
        assert!(reg.snapshot(5).is_empty());
    }

    #[test]
    fn delete_all_clears_every_instance() {
        let mut reg = AlarmRegistry::new();
        reg.set(1, 0, 1);
        reg.set(2, 0, 1);
        reg.delete_all();
        assert!(reg.snapshot(1).is_empty());
        assert!(reg.snapshot(2).is_empty());
    }
}
