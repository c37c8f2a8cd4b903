//! Generation-checked handles and the slot registry backing them.
//!
//! A [`Handle`] is an opaque `(index, generation)` pair. External code never
//! dereferences it directly; it is resolved through a [`HandleRegistry`],
//! which fails resolution for any handle whose slot was freed since the
//! handle was minted. Slots are recycled LIFO, and every recycle bumps the
//! slot's generation, so reuse is always observable as invalidity: a stale
//! handle can never silently alias a newer object.

use std::hash::{Hash, Hasher};

/// An opaque, generation-checked reference to a pooled slot.
///
/// Two handles are equal if both index and generation match. A handle stays
/// `Copy`-cheap; liveness is a property of the registry, not the handle.
#[derive(Clone, Copy)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index of this handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation this handle was minted with.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}@{})", self.index, self.generation)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}@{})", self.index, self.generation)
    }
}

#[derive(Clone, Copy)]
struct Slot {
    generation: u32,
    /// Index into the owner's payload storage. Equals the slot index for
    /// stable storages; tracks relocations for compact storages.
    payload_index: u32,
    alive: bool,
}

/// Allocates, resolves, and recycles generation-checked handles.
///
/// The registry maps live handles to payload indices owned by the caller.
/// Compact storages update the payload index when elements relocate
/// (see [`set_payload_index`](HandleRegistry::set_payload_index)); stable
/// storages use [`create_self_indexed`](HandleRegistry::create_self_indexed)
/// so the payload index always equals the slot index.
pub struct HandleRegistry {
    slots: Vec<Slot>,
    /// Recyclable slot indices (LIFO).
    free: Vec<u32>,
    count: u32,
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            count: 0,
        }
    }

    /// Mints a handle whose slot maps to the given payload index.
    pub fn create(&mut self, payload_index: u32) -> Handle {
        self.count += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.payload_index = payload_index;
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                payload_index,
                alive: true,
            });
            Handle::new(index, 0)
        }
    }

    /// Mints a handle whose payload index equals its own slot index.
    ///
    /// Used by stable (tombstoning) storages where elements never relocate.
    pub fn create_self_indexed(&mut self) -> Handle {
        self.count += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.payload_index = index;
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                payload_index: index,
                alive: true,
            });
            Handle::new(index, 0)
        }
    }

    /// Resolves a handle to its payload index.
    ///
    /// Returns `None` if the slot was freed or the generation mismatches;
    /// the handle is dead and must be treated as such by the caller.
    pub fn resolve(&self, handle: Handle) -> Option<u32> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.alive && slot.generation == handle.generation() {
            Some(slot.payload_index)
        } else {
            None
        }
    }

    /// Returns whether the handle still refers to a live slot.
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.resolve(handle).is_some()
    }

    /// Redirects a live handle's slot to a new payload index.
    ///
    /// Called by compact storages after a swap-remove relocates an element.
    pub fn set_payload_index(&mut self, handle: Handle, payload_index: u32) {
        debug_assert!(self.is_alive(handle), "redirecting a dead handle");
        if let Some(slot) = self.slots.get_mut(handle.index() as usize) {
            if slot.alive && slot.generation == handle.generation() {
                slot.payload_index = payload_index;
            }
        }
    }

    /// Frees the handle's slot, returning its payload index.
    ///
    /// The generation is bumped so all outstanding copies of the handle
    /// resolve to `None` from now on, even after the slot is reused.
    /// Returns `None` if the handle was already dead.
    pub fn destroy(&mut self, handle: Handle) -> Option<u32> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if !slot.alive || slot.generation != handle.generation() {
            return None;
        }

        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.count -= 1;
        Some(slot.payload_index)
    }

    /// Reconstructs the live handle occupying the given slot index.
    pub fn handle_at(&self, slot_index: u32) -> Option<Handle> {
        let slot = self.slots.get(slot_index as usize)?;
        if slot.alive {
            Some(Handle::new(slot_index, slot.generation))
        } else {
            None
        }
    }

    /// Returns the number of live handles.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Returns whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of slots ever allocated (live or free).
    pub fn slot_capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Iterates over all live handles in slot order.
    pub fn iter_live(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Handle::new(index as u32, slot.generation))
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
