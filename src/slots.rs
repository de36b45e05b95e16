//! Slot Table
//!
//! Maps stable integer ids to owned coroutine records. Allocation is O(1)
//! amortized: the table doubles while below its hard ceiling, and free-slot
//! scans start just past the last assigned id so reuse spreads across the
//! table instead of always recycling the lowest free id.

use crate::coroutine::{Coroutine, CoroutineId, SpawnError};
use crate::log::{self, LogLevel};

/// Growable table of coroutine record slots.
pub(crate) struct SlotTable {
    slots: Vec<Option<Box<Coroutine>>>,
    /// Number of occupied slots. Always agrees with the table contents.
    count: usize,
    /// Last assigned index; scans start just past it.
    alloc_cursor: usize,
    /// Hard ceiling on capacity.
    max_slots: usize,
}

impl SlotTable {
    /// Create a table with `initial` empty slots and a `max_slots` ceiling.
    pub(crate) fn new(initial: usize, max_slots: usize) -> Self {
        let mut slots = Vec::with_capacity(initial);
        slots.resize_with(initial, || None);
        Self {
            slots,
            count: 0,
            // One behind slot 0, so the very first scan lands on slot 0.
            alloc_cursor: initial.saturating_sub(1),
            max_slots,
        }
    }

    /// Current capacity (number of slots, occupied or not).
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Place a record in a free slot and return its id.
    ///
    /// Doubles the table (clamped to the ceiling) when every slot is taken;
    /// the record then occupies the first newly created slot. Fails only
    /// when the table is full at the ceiling.
    pub(crate) fn insert(&mut self, record: Box<Coroutine>) -> Result<CoroutineId, SpawnError> {
        let cap = self.slots.len();

        if self.count == cap {
            if cap >= self.max_slots {
                return Err(SpawnError::AtCapacity { capacity: cap });
            }
            let new_cap = (cap * 2).min(self.max_slots);
            self.slots.resize_with(new_cap, || None);
            log::LogBuilder::new(LogLevel::Debug)
                .target("weft::slots")
                .message("slot table grown")
                .field_int("capacity", new_cap as i64)
                .emit();

            self.slots[cap] = Some(record);
            self.count += 1;
            self.alloc_cursor = cap;
            return Ok(CoroutineId::new(cap));
        }

        for step in 0..cap {
            let index = (self.alloc_cursor + 1 + step) % cap;
            if self.slots[index].is_none() {
                self.slots[index] = Some(record);
                self.count += 1;
                self.alloc_cursor = index;
                return Ok(CoroutineId::new(index));
            }
        }

        // count < capacity guarantees a free slot somewhere above.
        panic!("slot table accounting corrupt: {} of {} occupied but no free slot found", self.count, cap);
    }

    /// Take the record out of a slot, clearing it.
    ///
    /// Returns `None` if the slot was already empty.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub(crate) fn remove(&mut self, id: CoroutineId) -> Option<Box<Coroutine>> {
        let record = self.slot(id).take();
        if record.is_some() {
            self.count -= 1;
        }
        record
    }

    /// Borrow the record in a slot, `None` if empty.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub(crate) fn get(&self, id: CoroutineId) -> Option<&Coroutine> {
        let index = id.index();
        assert!(index < self.slots.len(), "coroutine id {} out of range (capacity {})", index, self.slots.len());
        self.slots[index].as_deref()
    }

    /// Mutably borrow the record in a slot, `None` if empty.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub(crate) fn get_mut(&mut self, id: CoroutineId) -> Option<&mut Coroutine> {
        self.slot(id).as_deref_mut()
    }

    /// Whether `id` names an occupied slot. Out-of-range ids are simply
    /// not occupied; this is the one bounds-tolerant read.
    pub(crate) fn is_occupied(&self, id: CoroutineId) -> bool {
        self.slots.get(id.index()).is_some_and(|slot| slot.is_some())
    }

    fn slot(&mut self, id: CoroutineId) -> &mut Option<Box<Coroutine>> {
        let index = id.index();
        assert!(index < self.slots.len(), "coroutine id {} out of range (capacity {})", index, self.slots.len());
        &mut self.slots[index]
    }
}

impl std::fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("capacity", &self.slots.len())
            .field("count", &self.count)
            .field("alloc_cursor", &self.alloc_cursor)
            .finish()
    }
}
