//! Generational handle allocation.
//!
//! A host handle packs a *generation* counter in the high 32 bits and a slot
//! *index* in the low 32 bits. The generation is bumped every time a slot is
//! released, so a handle to a destroyed object never matches again, even
//! after the slot is reused.
//!
//! Slot 0 is reserved and never handed out, which keeps every live handle
//! distinct from [`Handle::NULL`].
//!
//! A slot whose generation reaches `u32::MAX` is retired instead of wrapping
//! back to 0, so no handle is ever issued twice.

use std::collections::VecDeque;

use keel_bridge::Handle;

/// Compose a handle from its slot index and generation.
#[inline]
pub fn compose(index: u32, generation: u32) -> Handle {
    Handle::from_raw((generation as u64) << 32 | index as u64)
}

/// The slot index of a handle (low 32 bits).
#[inline]
pub fn index_of(handle: Handle) -> u32 {
    handle.to_raw() as u32
}

/// The generation of a handle (high 32 bits).
#[inline]
pub fn generation_of(handle: Handle) -> u32 {
    (handle.to_raw() >> 32) as u32
}

/// Allocates and recycles [`Handle`]s with generational tracking.
///
/// Free slots are kept in a FIFO queue so generations spread over all slots
/// rather than concentrating on one hot slot.
#[derive(Debug)]
pub struct HandleAllocator {
    /// Current generation per slot.
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_slots: VecDeque<u32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            // Slot 0 is the reserved null slot.
            generations: vec![0],
            alive: vec![false],
            free_slots: VecDeque::new(),
        }
    }

    /// Allocate a fresh handle, reusing a released slot when one is free.
    pub fn allocate(&mut self) -> Handle {
        if let Some(index) = self.free_slots.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            compose(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            compose(index, 0)
        }
    }

    /// Release a live handle. Returns `false` if it was already stale.
    pub fn release(&mut self, handle: Handle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.retire_or_recycle(index_of(handle));
        true
    }

    /// Release every live handle.
    pub fn release_all(&mut self) {
        for index in 1..self.generations.len() as u32 {
            if self.alive[index as usize] {
                self.retire_or_recycle(index);
            }
        }
    }

    fn retire_or_recycle(&mut self, index: u32) {
        let slot = index as usize;
        self.alive[slot] = false;
        match self.generations[slot].checked_add(1) {
            Some(next) => {
                self.generations[slot] = next;
                self.free_slots.push_back(index);
            }
            None => tracing::debug!(index, "slot generation exhausted, retiring slot"),
        }
    }

    /// Whether `handle` names a live slot at its current generation.
    pub fn is_alive(&self, handle: Handle) -> bool {
        let slot = index_of(handle) as usize;
        slot != 0
            && slot < self.generations.len()
            && self.alive[slot]
            && self.generations[slot] == generation_of(handle)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_allocates_null() {
        let mut alloc = HandleAllocator::new();
        for _ in 0..64 {
            let h = alloc.allocate();
            assert!(!h.is_null());
            assert_ne!(index_of(h), 0);
        }
    }

    #[test]
    fn generation_increments_on_reuse() {
        let mut alloc = HandleAllocator::new();
        let h0 = alloc.allocate();
        assert_eq!(generation_of(h0), 0);
        assert!(alloc.release(h0));
        let h1 = alloc.allocate();
        assert_eq!(index_of(h1), index_of(h0));
        assert_eq!(generation_of(h1), 1);
        assert_ne!(h0, h1);
    }

    #[test]
    fn stale_handle_stays_stale_after_reuse() {
        let mut alloc = HandleAllocator::new();
        let h0 = alloc.allocate();
        alloc.release(h0);
        let _h1 = alloc.allocate();
        assert!(!alloc.is_alive(h0));
        assert!(!alloc.release(h0), "double release");
    }

    #[test]
    fn null_and_out_of_range_are_never_alive() {
        let alloc = HandleAllocator::new();
        assert!(!alloc.is_alive(Handle::NULL));
        assert!(!alloc.is_alive(compose(999, 0)));
    }

    #[test]
    fn exhausted_generation_retires_the_slot() {
        let mut alloc = HandleAllocator::new();
        let first = alloc.allocate();
        let index = index_of(first);
        alloc.generations[index as usize] = u32::MAX - 1;
        let h = compose(index, u32::MAX - 1);
        assert!(alloc.release(h));

        let last = alloc.allocate();
        assert_eq!(index_of(last), index);
        assert_eq!(generation_of(last), u32::MAX);
        assert!(alloc.release(last));

        // The slot is not reused, so generation 0 at this index never comes back.
        let next = alloc.allocate();
        assert_ne!(index_of(next), index);
        assert!(!alloc.is_alive(first));
        assert!(!alloc.is_alive(last));
        assert!(!alloc.release(last));
    }

    #[test]
    fn release_all_retires_exhausted_slots_too() {
        let mut alloc = HandleAllocator::new();
        let a = alloc.allocate();
        alloc.generations[index_of(a) as usize] = u32::MAX;
        let a = compose(index_of(a), u32::MAX);
        let b = alloc.allocate();
        alloc.release_all();

        assert!(!alloc.is_alive(a));
        let reused = alloc.allocate();
        assert_eq!(index_of(reused), index_of(b));
        assert_eq!(alloc.allocate(), compose(3, 0));
    }

    #[test]
    fn release_all_invalidates_everything() {
        let mut alloc = HandleAllocator::new();
        let handles: Vec<Handle> = (0..5).map(|_| alloc.allocate()).collect();
        alloc.release_all();
        assert_eq!(alloc.alive_count(), 0);
        assert!(handles.iter().all(|&h| !alloc.is_alive(h)));
        let fresh = alloc.allocate();
        assert!(handles.iter().all(|&h| h != fresh));
    }
}
