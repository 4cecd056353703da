// crates/bpsec-policy-core/src/core/arena.rs
// ============================================================================
// Module: Generational Arena
// Description: Slot storage addressed by opaque, generation-checked indices.
// Purpose: Replace shared-memory addresses with bounds-checked handles.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Rules and event sets live in arenas owned by one engine instance. A handle
//! is a slot index plus the slot's generation at insertion; a handle whose
//! slot has been freed (and possibly reused) resolves to `None`. Handles are
//! only meaningful to the engine instance that issued them.

// ============================================================================
// SECTION: Types
// ============================================================================

/// Opaque arena slot reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaIndex {
    /// Slot offset.
    slot: u32,
    /// Slot generation when the value was inserted.
    generation: u32,
}

/// One arena slot.
#[derive(Debug, Clone)]
struct Slot<T> {
    /// Current generation; bumped whenever the slot is vacated.
    generation: u32,
    /// Stored value.
    value: Option<T>,
}

/// Generational arena.
///
/// # Invariants
/// - `free` lists exactly the slots whose `value` is `None`.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    /// Slot storage.
    slots: Vec<Slot<T>>,
    /// Vacant slot offsets, reused LIFO.
    free: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no values are stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value, returning `None` only when the slot space is exhausted.
    pub fn insert(&mut self, value: T) -> Option<ArenaIndex> {
        if let Some(slot) = self.free.pop() {
            let entry = self.slots.get_mut(slot as usize)?;
            entry.value = Some(value);
            self.len += 1;
            return Some(ArenaIndex {
                slot,
                generation: entry.generation,
            });
        }
        let slot = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Some(ArenaIndex {
            slot,
            generation: 0,
        })
    }

    /// Resolves a handle.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        let entry = self.slots.get(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_ref()
    }

    /// Resolves a handle mutably.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_mut()
    }

    /// Removes and returns the value behind a handle.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index.slot);
        self.len -= 1;
        Some(value)
    }

    /// Drops every value and invalidates all outstanding handles.
    pub fn clear(&mut self) {
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if entry.value.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                if let Ok(slot) = u32::try_from(slot) {
                    self.free.push(slot);
                }
            }
        }
        self.len = 0;
    }
}

// ============================================================================
// SECTION: Typed Handles
// ============================================================================

/// Handle to a rule stored in an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleHandle(pub(crate) ArenaIndex);

/// Handle to an event set stored in an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSetHandle(pub(crate) ArenaIndex);

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::Arena;

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut arena = Arena::new();
        let first = arena.insert("first").unwrap();
        assert_eq!(arena.remove(first), Some("first"));
        let second = arena.insert("second").unwrap();
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"second"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn clear_invalidates_handles() {
        let mut arena = Arena::new();
        let handle = arena.insert(7_u8).unwrap();
        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(handle).is_none());
    }
}
