//! Ripple table
//!
//! Fixed-capacity store of transient disturbances. Slots are reused in place:
//! a zero-amplitude or expired slot is free, and when every slot is live the
//! oldest ripple is evicted to make room for the newcomer.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_RIPPLES, RIPPLE_LIFETIME};

/// A single disturbance on the surface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RippleEvent {
    /// World-space origin, fixed at creation
    pub origin: Vec2,
    /// Wave magnitude (0 = inert slot)
    pub amplitude: f32,
    /// Spatial frequency of the wave
    pub frequency: f32,
    /// Seconds since creation
    pub age: f32,
}

impl RippleEvent {
    pub fn new(origin: Vec2, amplitude: f32, frequency: f32) -> Self {
        Self {
            origin,
            amplitude,
            frequency,
            age: 0.0,
        }
    }

    /// Contributes to the surface this frame
    #[inline]
    pub fn is_active(&self) -> bool {
        self.amplitude > 0.0 && self.age <= RIPPLE_LIFETIME
    }

    /// Slot may be overwritten without evicting anything
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.is_active()
    }
}

/// Fixed-layout export of the table, one entry per slot.
///
/// Slot order is stable between frames and inert slots are all zero, so a
/// consumer can sum every entry without branching.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RippleSnapshot {
    pub pos_x: [f32; MAX_RIPPLES],
    pub pos_y: [f32; MAX_RIPPLES],
    pub amplitude: [f32; MAX_RIPPLES],
    pub age: [f32; MAX_RIPPLES],
    pub frequency: [f32; MAX_RIPPLES],
}

impl Default for RippleSnapshot {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl RippleSnapshot {
    #[inline]
    pub fn position(&self, slot: usize) -> Vec2 {
        Vec2::new(self.pos_x[slot], self.pos_y[slot])
    }

    #[inline]
    pub fn set_position(&mut self, slot: usize, pos: Vec2) {
        self.pos_x[slot] = pos.x;
        self.pos_y[slot] = pos.y;
    }

    /// Number of slots carrying a non-zero amplitude
    pub fn active_count(&self) -> usize {
        self.amplitude.iter().filter(|&&a| a > 0.0).count()
    }
}

/// Bounded table of concurrent ripples
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RippleTable {
    slots: [RippleEvent; MAX_RIPPLES],
}

impl RippleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ripple, returning the slot it landed in.
    ///
    /// Takes the first free slot; with all slots live the one with the largest
    /// age is overwritten. A non-positive amplitude describes an inert slot, so
    /// nothing is inserted and `None` is returned; so does a non-finite one.
    pub fn add(&mut self, origin: Vec2, amplitude: f32, frequency: f32) -> Option<usize> {
        if !(amplitude.is_finite() && amplitude > 0.0) {
            return None;
        }

        let slot = match self.slots.iter().position(RippleEvent::is_free) {
            Some(free) => free,
            None => {
                let oldest = self.oldest_slot();
                log::debug!(
                    "Ripple table full, evicting slot {} (age {:.3}s)",
                    oldest,
                    self.slots[oldest].age
                );
                oldest
            }
        };

        self.slots[slot] = RippleEvent::new(origin, amplitude, frequency);
        Some(slot)
    }

    /// Slot with the strictly largest age (first one wins a tie)
    fn oldest_slot(&self) -> usize {
        let mut oldest = 0;
        for (i, slot) in self.slots.iter().enumerate().skip(1) {
            if slot.age > self.slots[oldest].age {
                oldest = i;
            }
        }
        oldest
    }

    /// Age every live ripple, zeroing the amplitude of any that outlived
    /// `RIPPLE_LIFETIME`. The slot stays allocated until overwritten.
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        for slot in self.slots.iter_mut().filter(|s| s.amplitude > 0.0) {
            slot.age += dt;
            if slot.age > RIPPLE_LIFETIME {
                slot.amplitude = 0.0;
            }
        }
    }

    /// Export every slot in order; inert slots are exported as all zeros
    pub fn snapshot(&self) -> RippleSnapshot {
        let mut snapshot = RippleSnapshot::zeroed();
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_active() {
                snapshot.set_position(i, slot.origin);
                snapshot.amplitude[i] = slot.amplitude;
                snapshot.age[i] = slot.age;
                snapshot.frequency[i] = slot.frequency;
            }
        }
        snapshot
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    pub fn active(&self) -> impl Iterator<Item = &RippleEvent> {
        self.slots.iter().filter(|s| s.is_active())
    }

    pub fn slot(&self, index: usize) -> Option<&RippleEvent> {
        self.slots.get(index)
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    pub const fn capacity(&self) -> usize {
        MAX_RIPPLES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn full_table() -> RippleTable {
        let mut table = RippleTable::new();
        for i in 0..MAX_RIPPLES {
            table.add(Vec2::new(i as f32, 0.0), 0.02, 8.0);
        }
        table
    }

    #[test]
    fn test_add_uses_first_free_slot() {
        let mut table = RippleTable::new();
        assert_eq!(table.add(Vec2::ZERO, 0.02, 8.0), Some(0));
        assert_eq!(table.add(Vec2::ONE, 0.02, 8.0), Some(1));
        assert_eq!(table.active_count(), 2);
    }

    #[test]
    fn test_zero_amplitude_is_ignored() {
        let mut table = full_table();
        let before = table.snapshot();
        assert_eq!(table.add(Vec2::ZERO, 0.0, 8.0), None);
        assert_eq!(table.add(Vec2::ZERO, -1.0, 8.0), None);
        assert_eq!(table.add(Vec2::ZERO, f32::NAN, 8.0), None);
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_infinite_amplitude_is_ignored() {
        let mut table = RippleTable::new();
        assert_eq!(table.add(Vec2::ZERO, f32::INFINITY, 8.0), None);
        assert_eq!(table.add(Vec2::ZERO, f32::NEG_INFINITY, 8.0), None);
        assert_eq!(table.active_count(), 0);
        assert!(table.snapshot().amplitude.iter().all(|a| *a == 0.0));
    }

    #[test]
    fn test_update_ages_and_expires() {
        let mut table = RippleTable::new();
        table.add(Vec2::ZERO, 0.02, 8.0);

        table.update(1.0);
        assert_eq!(table.slot(0).unwrap().age, 1.0);
        assert!(table.slot(0).unwrap().is_active());

        // Exactly at lifetime is still active
        table.update(1.0);
        assert!(table.slot(0).unwrap().is_active());

        table.update(0.01);
        let slot = table.slot(0).unwrap();
        assert_eq!(slot.amplitude, 0.0);
        assert!(slot.is_free());
        assert_eq!(table.active_count(), 0);
    }

    #[test]
    fn test_expired_slot_is_reused() {
        let mut table = full_table();
        table.update(RIPPLE_LIFETIME + 0.1);
        assert_eq!(table.active_count(), 0);

        assert_eq!(table.add(Vec2::new(5.0, 5.0), 0.03, 4.0), Some(0));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_update_ignores_bad_dt() {
        let mut table = RippleTable::new();
        table.add(Vec2::ZERO, 0.02, 8.0);
        table.update(-1.0);
        table.update(f32::NAN);
        assert_eq!(table.slot(0).unwrap().age, 0.0);
    }

    #[test]
    fn test_full_table_evicts_oldest() {
        let mut table = RippleTable::new();
        // Slot 0 is added first and ages the most
        for i in 0..MAX_RIPPLES {
            table.add(Vec2::new(i as f32, 0.0), 0.02, 8.0);
            table.update(0.1);
        }
        assert_eq!(table.active_count(), MAX_RIPPLES);

        let slot = table.add(Vec2::new(99.0, 99.0), 0.05, 2.0);
        assert_eq!(slot, Some(0));
        let fresh = table.slot(0).unwrap();
        assert_eq!(fresh.origin, Vec2::new(99.0, 99.0));
        assert_eq!(fresh.age, 0.0);
        assert!(fresh.is_active());
        assert_eq!(table.active_count(), MAX_RIPPLES);
    }

    #[test]
    fn test_snapshot_zeroes_inert_slots() {
        let mut table = RippleTable::new();
        table.add(Vec2::new(3.0, 4.0), 0.02, 8.0);
        table.update(0.5);
        table.add(Vec2::new(-1.0, 2.0), 0.01, 6.0);

        let snap = table.snapshot();
        assert_eq!(snap.position(0), Vec2::new(3.0, 4.0));
        assert_eq!(snap.age[0], 0.5);
        assert_eq!(snap.amplitude[1], 0.01);
        assert_eq!(snap.frequency[1], 6.0);
        for i in 2..MAX_RIPPLES {
            assert_eq!(snap.amplitude[i], 0.0);
            assert_eq!(snap.position(i), Vec2::ZERO);
        }
        assert_eq!(snap.active_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut table = full_table();
        table.clear();
        assert_eq!(table.active_count(), 0);
        assert_eq!(table.snapshot(), RippleSnapshot::default());
    }

    proptest! {
        #[test]
        fn prop_capacity_never_exceeded(
            ops in prop::collection::vec((any::<bool>(), 0.0f32..1.0, 0.0f32..0.6), 0..200)
        ) {
            let mut table = RippleTable::new();
            for (is_add, amplitude, dt) in ops {
                if is_add {
                    table.add(Vec2::new(amplitude, dt), amplitude, 8.0);
                } else {
                    table.update(dt);
                }
                prop_assert!(table.active_count() <= MAX_RIPPLES);
                prop_assert!(table.snapshot().active_count() <= MAX_RIPPLES);
            }
        }

        #[test]
        fn prop_eviction_takes_strictly_oldest(
            ages in prop::collection::hash_set(0u32..2000, MAX_RIPPLES)
        ) {
            let mut table = full_table();
            let ages: Vec<f32> = ages.into_iter().map(|a| a as f32 / 1000.0).collect();
            for (slot, age) in table.slots.iter_mut().zip(&ages) {
                slot.age = *age;
            }
            let expected = ages
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();

            let slot = table.add(Vec2::new(-7.0, 7.0), 0.04, 3.0).unwrap();
            prop_assert_eq!(slot, expected);
            prop_assert!(table.slot(slot).unwrap().is_active());
            prop_assert_eq!(table.slot(slot).unwrap().age, 0.0);
            prop_assert_eq!(table.active_count(), MAX_RIPPLES);
        }
    }
}
