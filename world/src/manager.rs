//! Per-type component managers.
//!
//! A [`ComponentManager`] owns the block storage for one component type, the
//! handle registry over it, and the type's pending-initialization queue. The
//! world holds managers type-erased as [`AnyComponentManager`] trait objects
//! and reaches typed storage by downcast.
//!
//! Two storage disciplines exist (see [`StorageKind`]): compact storage keeps
//! live instances packed and patches the relocated element's registry entry
//! on swap-remove; stable storage tombstones freed slots and never relocates.

use std::any::Any;
use std::collections::VecDeque;
use std::time::Instant;

use crate::component::{
    Component, ComponentCtx, ComponentHandle, ComponentTypeId, StorageKind, WorldChannels,
};
use crate::handle::{Handle, HandleRegistry};
use crate::message::Message;
use crate::object::GameObjectHandle;
use crate::serialize::SnapshotError;

struct ComponentSlot<T> {
    payload: T,
    owner: GameObjectHandle,
    raw: Handle,
    active: bool,
    initialized: bool,
}

enum Storage<T> {
    Compact(Vec<ComponentSlot<T>>),
    Stable(Vec<Option<ComponentSlot<T>>>),
}

/// Owner of one component type's storage and lifecycle.
pub struct ComponentManager<T: Component> {
    ty: ComponentTypeId,
    registry: HandleRegistry,
    storage: Storage<T>,
    /// Components awaiting their `initialize` hook, drained under the
    /// per-frame budget. Stale handles (destroyed before init) are skipped.
    pending_init: VecDeque<Handle>,
}

impl<T: Component> ComponentManager<T> {
    pub(crate) fn new(ty: ComponentTypeId) -> Self {
        let storage = match T::storage() {
            StorageKind::Compact => Storage::Compact(Vec::new()),
            StorageKind::Stable => Storage::Stable(Vec::new()),
        };
        Self {
            ty,
            registry: HandleRegistry::new(),
            storage,
            pending_init: VecDeque::new(),
        }
    }

    /// Allocates a component for `owner` and queues it for initialization.
    /// Owner validity is checked by the world before calling this.
    pub(crate) fn create(&mut self, owner: GameObjectHandle, payload: T) -> ComponentHandle {
        let raw = match &mut self.storage {
            Storage::Compact(slots) => {
                let raw = self.registry.create(slots.len() as u32);
                slots.push(ComponentSlot {
                    payload,
                    owner,
                    raw,
                    active: true,
                    initialized: false,
                });
                raw
            }
            Storage::Stable(slots) => {
                let raw = self.registry.create_self_indexed();
                let idx = raw.index() as usize;
                if idx >= slots.len() {
                    slots.resize_with(idx + 1, || None);
                }
                slots[idx] = Some(ComponentSlot {
                    payload,
                    owner,
                    raw,
                    active: true,
                    initialized: false,
                });
                raw
            }
        };
        self.pending_init.push_back(raw);
        ComponentHandle { ty: self.ty, raw }
    }

    fn slot(&self, raw: Handle) -> Option<&ComponentSlot<T>> {
        let idx = self.registry.resolve(raw)? as usize;
        match &self.storage {
            Storage::Compact(slots) => slots.get(idx),
            Storage::Stable(slots) => slots.get(idx)?.as_ref(),
        }
    }

    fn slot_mut(&mut self, raw: Handle) -> Option<&mut ComponentSlot<T>> {
        let idx = self.registry.resolve(raw)? as usize;
        match &mut self.storage {
            Storage::Compact(slots) => slots.get_mut(idx),
            Storage::Stable(slots) => slots.get_mut(idx)?.as_mut(),
        }
    }

    /// Returns the payload of a live component.
    pub fn get(&self, handle: ComponentHandle) -> Option<&T> {
        if handle.ty != self.ty {
            return None;
        }
        self.slot(handle.raw).map(|s| &s.payload)
    }

    /// Returns the payload of a live component, mutably.
    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        if handle.ty != self.ty {
            return None;
        }
        self.slot_mut(handle.raw).map(|s| &mut s.payload)
    }

    /// Returns whether the component has run its `initialize` hook.
    pub fn is_initialized(&self, handle: ComponentHandle) -> bool {
        handle.ty == self.ty && self.slot(handle.raw).is_some_and(|s| s.initialized)
    }

    /// Iterates over `(handle, payload)` for all live, active components.
    pub fn for_each_active(&self, mut f: impl FnMut(ComponentHandle, &T)) {
        let ty = self.ty;
        match &self.storage {
            Storage::Compact(slots) => {
                for slot in slots {
                    if slot.active {
                        f(ComponentHandle { ty, raw: slot.raw }, &slot.payload);
                    }
                }
            }
            Storage::Stable(slots) => {
                for slot in slots.iter().flatten() {
                    if slot.active {
                        f(ComponentHandle { ty, raw: slot.raw }, &slot.payload);
                    }
                }
            }
        }
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.registry.len() as usize
    }

    /// Returns whether no components are live.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

/// Type-erased manager surface the world drives.
pub(crate) trait AnyComponentManager: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn type_name(&self) -> &'static str;
    fn parallel_update(&self) -> bool;

    fn len(&self) -> usize;
    fn pending_init_len(&self) -> usize;
    fn is_alive(&self, raw: Handle) -> bool;
    fn is_initialized(&self, raw: Handle) -> bool;
    fn owner_of(&self, raw: Handle) -> Option<GameObjectHandle>;
    fn set_active(&mut self, raw: Handle, active: bool) -> bool;

    fn handles_message(&self, message: &Message) -> bool;

    /// Dispatches a declared message to one component. Returns false if the
    /// component is dead or inactive.
    fn dispatch(&mut self, raw: Handle, channels: &WorldChannels<'_>, message: &mut Message)
        -> bool;

    /// Offers the unhandled fallback to one component. Returns whether the
    /// fallback handled the message.
    fn dispatch_unhandled(
        &mut self,
        raw: Handle,
        channels: &WorldChannels<'_>,
        message: &mut Message,
    ) -> bool;

    /// Deinitializes (if initialized) and frees one component. Returns false
    /// if the handle was already dead.
    fn destroy(&mut self, raw: Handle, channels: &WorldChannels<'_>) -> bool;

    /// Drains the pending-initialization queue until `deadline`. At least one
    /// component is initialized per call regardless of the deadline, so
    /// arbitrarily small budgets still make progress. Returns the number of
    /// components still pending.
    fn initialize_pending(&mut self, deadline: Instant, channels: &WorldChannels<'_>) -> usize;

    /// Runs the per-tick update over active, initialized components.
    fn update_all(&mut self, channels: &WorldChannels<'_>);

    fn serialize_component(&self, raw: Handle) -> Result<Vec<u8>, SnapshotError>;
    fn create_from_bytes(
        &mut self,
        owner: GameObjectHandle,
        bytes: &[u8],
    ) -> Result<ComponentHandle, SnapshotError>;
}

impl<T: Component> AnyComponentManager for ComponentManager<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn parallel_update(&self) -> bool {
        T::parallel_update()
    }

    fn len(&self) -> usize {
        ComponentManager::len(self)
    }

    fn pending_init_len(&self) -> usize {
        self.pending_init.len()
    }

    fn is_alive(&self, raw: Handle) -> bool {
        self.registry.is_alive(raw)
    }

    fn is_initialized(&self, raw: Handle) -> bool {
        self.slot(raw).is_some_and(|s| s.initialized)
    }

    fn owner_of(&self, raw: Handle) -> Option<GameObjectHandle> {
        self.slot(raw).map(|s| s.owner)
    }

    fn set_active(&mut self, raw: Handle, active: bool) -> bool {
        match self.slot_mut(raw) {
            Some(slot) => {
                slot.active = active;
                true
            }
            None => false,
        }
    }

    fn handles_message(&self, message: &Message) -> bool {
        T::handles_message(message)
    }

    fn dispatch(
        &mut self,
        raw: Handle,
        channels: &WorldChannels<'_>,
        message: &mut Message,
    ) -> bool {
        let ty = self.ty;
        let Some(slot) = self.slot_mut(raw) else {
            return false;
        };
        if !slot.active {
            return false;
        }
        let ctx = ComponentCtx::new(channels, slot.owner, ComponentHandle { ty, raw });
        slot.payload.on_message(&ctx, message);
        true
    }

    fn dispatch_unhandled(
        &mut self,
        raw: Handle,
        channels: &WorldChannels<'_>,
        message: &mut Message,
    ) -> bool {
        let ty = self.ty;
        let Some(slot) = self.slot_mut(raw) else {
            return false;
        };
        if !slot.active {
            return false;
        }
        let ctx = ComponentCtx::new(channels, slot.owner, ComponentHandle { ty, raw });
        slot.payload.on_unhandled_message(&ctx, message)
    }

    fn destroy(&mut self, raw: Handle, channels: &WorldChannels<'_>) -> bool {
        let ty = self.ty;
        // Deinitialize first, while the slot is still resolvable.
        if let Some(slot) = self.slot_mut(raw) {
            if slot.initialized {
                let ctx = ComponentCtx::new(channels, slot.owner, ComponentHandle { ty, raw });
                slot.payload.deinitialize(&ctx);
            }
        } else {
            return false;
        }

        let Some(idx) = self.registry.destroy(raw) else {
            return false;
        };
        let idx = idx as usize;
        match &mut self.storage {
            Storage::Compact(slots) => {
                slots.swap_remove(idx);
                // The former last element now lives at idx; repoint its handle.
                if idx < slots.len() {
                    let moved = slots[idx].raw;
                    self.registry.set_payload_index(moved, idx as u32);
                }
            }
            Storage::Stable(slots) => {
                slots[idx] = None;
            }
        }
        true
    }

    fn initialize_pending(&mut self, deadline: Instant, channels: &WorldChannels<'_>) -> usize {
        let ty = self.ty;
        let mut initialized_any = false;
        while let Some(raw) = self.pending_init.front().copied() {
            if initialized_any && Instant::now() >= deadline {
                break;
            }
            self.pending_init.pop_front();

            // Destroyed before initialization: nothing to do.
            let Some(idx) = self.registry.resolve(raw) else {
                continue;
            };
            let idx = idx as usize;
            let slot = match &mut self.storage {
                Storage::Compact(slots) => &mut slots[idx],
                Storage::Stable(slots) => slots[idx]
                    .as_mut()
                    .unwrap_or_else(|| unreachable!("live handle resolved to tombstone")),
            };
            if slot.initialized {
                continue;
            }
            slot.initialized = true;
            let ctx = ComponentCtx::new(channels, slot.owner, ComponentHandle { ty, raw });
            slot.payload.initialize(&ctx);
            initialized_any = true;
        }

        let remaining = self.pending_init.len();
        if remaining > 0 {
            log::debug!(
                "initialization budget exhausted for '{}': {} component(s) deferred to next tick",
                T::TYPE_NAME,
                remaining
            );
        }
        remaining
    }

    fn update_all(&mut self, channels: &WorldChannels<'_>) {
        let ty = self.ty;
        let mut run = |slot: &mut ComponentSlot<T>| {
            if slot.active && slot.initialized {
                let ctx = ComponentCtx::new(channels, slot.owner, ComponentHandle { ty, raw: slot.raw });
                slot.payload.update(&ctx);
            }
        };
        match &mut self.storage {
            Storage::Compact(slots) => slots.iter_mut().for_each(&mut run),
            Storage::Stable(slots) => slots.iter_mut().flatten().for_each(&mut run),
        }
    }

    fn serialize_component(&self, raw: Handle) -> Result<Vec<u8>, SnapshotError> {
        let slot = self.slot(raw).ok_or(SnapshotError::DeadComponent)?;
        Ok(bincode::serialize(&slot.payload)?)
    }

    fn create_from_bytes(
        &mut self,
        owner: GameObjectHandle,
        bytes: &[u8],
    ) -> Result<ComponentHandle, SnapshotError> {
        let payload: T = bincode::deserialize(bytes)?;
        Ok(self.create(owner, payload))
    }
}
