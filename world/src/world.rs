//! The world: exclusive owner of all game objects, component managers, and
//! the per-tick phase driver.
//!
//! Objects and components reference each other only by handle; the world owns
//! every storage arena. Structural mutations through `&mut World` methods
//! apply immediately and keep the hierarchy/transform invariants intact at
//! every external observation point. Contexts without world access (component
//! hooks, worker jobs) queue their work instead: deferred messages, deletion
//! requests, transform moves, and structural commands all drain at defined
//! points inside [`World::update`].
//!
//! Tick phases, in order:
//!
//! 1. component initialization (time-boxed, minimum one per manager)
//! 2. component update batches (parallel where managers declare it safe)
//! 3. sync point: structural commands
//! 4. message processing (drains the deferred queue snapshot)
//! 5. sync point: structural commands
//! 6. transform sync (deferred moves)
//! 7. bounds recompute (dirty set only)
//! 8. deletion processing

use std::any::TypeId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use fixedbitset::FixedBitSet;
use marigold_core::Transform;
use parking_lot::Mutex;

use crate::commands::CommandQueue;
use crate::component::{
    Component, ComponentHandle, ComponentTypeId, WorldChannels,
};
use crate::deletion::{DeletionOutcome, DeletionQueue, DeletionRequest};
use crate::error::WorldError;
use crate::listener::WorldListener;
use crate::manager::{AnyComponentManager, ComponentManager};
use crate::message::{
    ChildChange, ComponentChange, Message, MessageKind, MessageQueue, ParentChange,
    RenderDataCollector, RenderDataEntry, TransformQueue,
};
use crate::object::{GameObject, GameObjectHandle, ObjectDesc, ObjectFlags, ObjectStorage};
use crate::serialize::SnapshotError;
use crate::spatial::{BoundsAccumulator, SpatialCategories, SpatialEntry, SpatialIndex};
use crate::thread_pool::ThreadPool;

/// Tolerance for detecting an actual global-transform change.
const TRANSFORM_EPSILON: f32 = 1e-6;

/// Splits the world into its manager list and the channel bundle component
/// hooks run against. A macro because the borrow split must happen in the
/// caller's scope for the disjoint field borrows to work.
macro_rules! split_world {
    ($world:expr => $managers:ident, $channels:ident) => {
        let World {
            managers: $managers,
            messages,
            deletions,
            commands,
            moves,
            listener,
            tick,
            delta_time,
            ..
        } = $world;
        let $channels = WorldChannels {
            messages,
            deletions,
            commands,
            moves,
            listener,
            tick: *tick,
            delta_time: *delta_time,
        };
    };
    ($world:expr => $managers:ident, $pool:ident, $channels:ident) => {
        let World {
            managers: $managers,
            pool: $pool,
            messages,
            deletions,
            commands,
            moves,
            listener,
            tick,
            delta_time,
            ..
        } = $world;
        let $channels = WorldChannels {
            messages,
            deletions,
            commands,
            moves,
            listener,
            tick: *tick,
            delta_time: *delta_time,
        };
    };
}

/// Describes the initial state of a world.
#[derive(Debug, Clone)]
pub struct WorldDesc {
    /// Name for identification and diagnostics.
    pub name: String,
    /// Whether to log when an object marked static changes position.
    pub report_static_object_moves: bool,
    /// Maximum time spent on component initialization per frame. The default
    /// is effectively unbounded; at least one component per manager is
    /// initialized per frame regardless.
    pub max_component_init_time_per_frame: Duration,
    /// Worker thread count for parallel update batches. `None` sizes to the
    /// available CPU cores.
    pub worker_threads: Option<usize>,
}

impl WorldDesc {
    /// Creates a desc with default policies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            report_static_object_moves: true,
            max_component_init_time_per_frame: Duration::from_secs(10_000 * 3600),
            worker_threads: None,
        }
    }
}

/// The entity/component world.
pub struct World {
    name: String,
    report_static_moves: bool,
    init_budget: Duration,
    tick: u64,
    delta_time: f32,
    objects: ObjectStorage,
    managers: Vec<Box<dyn AnyComponentManager>>,
    manager_ids: HashMap<TypeId, ComponentTypeId>,
    messages: MessageQueue,
    deletions: DeletionQueue,
    commands: CommandQueue,
    moves: TransformQueue,
    listener: Mutex<Option<Box<dyn WorldListener>>>,
    categories: SpatialCategories,
    spatial: SpatialIndex,
    /// Object slots whose bounds need recomputation next bounds phase.
    bounds_dirty: FixedBitSet,
    pool: ThreadPool,
}

impl World {
    /// Creates a world from a desc.
    pub fn new(desc: WorldDesc) -> Self {
        let pool = match desc.worker_threads {
            Some(n) => ThreadPool::new(n),
            None => ThreadPool::default_threads(),
        };
        log::debug!("world '{}' created", desc.name);
        Self {
            name: desc.name,
            report_static_moves: desc.report_static_object_moves,
            init_budget: desc.max_component_init_time_per_frame,
            tick: 0,
            delta_time: 0.0,
            objects: ObjectStorage::new(),
            managers: Vec::new(),
            manager_ids: HashMap::new(),
            messages: MessageQueue::new(),
            deletions: DeletionQueue::new(),
            commands: CommandQueue::new(),
            moves: TransformQueue::new(),
            listener: Mutex::new(None),
            categories: SpatialCategories::new(),
            spatial: SpatialIndex::new(),
            bounds_dirty: FixedBitSet::new(),
            pool,
        }
    }

    /// Returns the world's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current tick count.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns the number of live objects.
    pub fn object_count(&self) -> u32 {
        self.objects.len()
    }

    /// Returns the number of live components across all managers.
    pub fn component_count(&self) -> usize {
        self.managers.iter().map(|m| m.len()).sum()
    }

    // ---- Component type registration ----

    /// Registers a component type, creating its manager. Idempotent.
    pub fn register_component<T: Component>(&mut self) -> ComponentTypeId {
        if let Some(&ty) = self.manager_ids.get(&TypeId::of::<T>()) {
            return ty;
        }
        let ty = ComponentTypeId(self.managers.len() as u16);
        self.managers.push(Box::new(ComponentManager::<T>::new(ty)));
        self.manager_ids.insert(TypeId::of::<T>(), ty);
        ty
    }

    /// Returns the typed manager for `T`, if registered.
    pub fn manager<T: Component>(&self) -> Option<&ComponentManager<T>> {
        let ty = self.manager_ids.get(&TypeId::of::<T>())?;
        self.managers[ty.0 as usize]
            .as_any()
            .downcast_ref::<ComponentManager<T>>()
    }

    /// Returns the typed manager for `T`, mutably, if registered.
    pub fn manager_mut<T: Component>(&mut self) -> Option<&mut ComponentManager<T>> {
        let ty = self.manager_ids.get(&TypeId::of::<T>())?;
        self.managers[ty.0 as usize]
            .as_any_mut()
            .downcast_mut::<ComponentManager<T>>()
    }

    fn manager_id<T: Component>(&self) -> ComponentTypeId {
        match self.manager_ids.get(&TypeId::of::<T>()) {
            Some(&ty) => ty,
            None => panic!(
                "component type '{}' is not registered in this world",
                T::TYPE_NAME
            ),
        }
    }

    // ---- Object graph ----

    /// Creates a game object.
    ///
    /// The parent, when given, must be alive; fails with
    /// [`WorldError::InvalidHandle`] otherwise. The global transform is
    /// derived from the parent immediately, and the new object is queued for
    /// its first bounds pass.
    pub fn create_object(&mut self, desc: &ObjectDesc) -> Result<GameObjectHandle, WorldError> {
        let parent_global = match desc.parent {
            Some(parent) => self
                .objects
                .get(parent)
                .ok_or(WorldError::InvalidHandle)?
                .global_transform(),
            None => Transform::IDENTITY,
        };

        let handle = self.objects.create(desc);
        if let Some(obj) = self.objects.get_mut(handle) {
            obj.global_transform = parent_global.mul(&desc.local_transform);
        }

        if let Some(parent) = desc.parent {
            if let Some(parent_obj) = self.objects.get_mut(parent) {
                parent_obj.children.push(handle);
            }
            let mut msg = Message::new(MessageKind::ChildrenChanged {
                change: ChildChange::Added,
                parent,
                child: handle,
            });
            self.send_message(parent, &mut msg);
        }

        self.mark_bounds_dirty(handle);
        Ok(handle)
    }

    /// Returns whether the object handle is still live.
    pub fn is_alive(&self, handle: GameObjectHandle) -> bool {
        self.objects.is_alive(handle)
    }

    /// Returns a read view of a live object.
    pub fn object(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        self.objects.get(handle)
    }

    /// Iterates over all live objects in slot order.
    pub fn iter_objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    /// Re-links `child` under `new_parent` (or to the root set for `None`).
    ///
    /// The protocol: unlink from the old parent (`ParentChanged::Unlinked` to
    /// the child, `ChildrenChanged::Removed` to the old parent), link into
    /// the new parent (`ParentChanged::Linked` / `ChildrenChanged::Added`),
    /// then recompute the subtree's global transforms immediately.
    ///
    /// Fails with [`WorldError::CyclicHierarchy`] — leaving the hierarchy
    /// untouched — when the child would become its own ancestor.
    pub fn set_parent(
        &mut self,
        child: GameObjectHandle,
        new_parent: Option<GameObjectHandle>,
    ) -> Result<(), WorldError> {
        if !self.objects.is_alive(child) {
            return Err(WorldError::InvalidHandle);
        }
        if let Some(parent) = new_parent {
            if !self.objects.is_alive(parent) {
                return Err(WorldError::InvalidHandle);
            }
            // Reject cycles: walk up from the new parent looking for child.
            let mut cursor = Some(parent);
            while let Some(h) = cursor {
                if h == child {
                    return Err(WorldError::CyclicHierarchy);
                }
                cursor = self.objects.get(h).and_then(|o| o.parent);
            }
        }

        let old_parent = self.objects.get(child).and_then(|o| o.parent);
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(old) = old_parent {
            if let Some(old_obj) = self.objects.get_mut(old) {
                old_obj.children.retain(|&c| c != child);
            }
            if let Some(child_obj) = self.objects.get_mut(child) {
                child_obj.parent = None;
            }
            let mut msg = Message::new(MessageKind::ParentChanged {
                change: ParentChange::Unlinked,
                parent: old,
            });
            self.send_message(child, &mut msg);
            let mut msg = Message::new(MessageKind::ChildrenChanged {
                change: ChildChange::Removed,
                parent: old,
                child,
            });
            self.send_message(old, &mut msg);
        }

        if let Some(new) = new_parent {
            if let Some(new_obj) = self.objects.get_mut(new) {
                new_obj.children.push(child);
            }
            if let Some(child_obj) = self.objects.get_mut(child) {
                child_obj.parent = Some(new);
            }
            let mut msg = Message::new(MessageKind::ParentChanged {
                change: ParentChange::Linked,
                parent: new,
            });
            self.send_message(child, &mut msg);
            let mut msg = Message::new(MessageKind::ChildrenChanged {
                change: ChildChange::Added,
                parent: new,
                child,
            });
            self.send_message(new, &mut msg);
        }

        self.propagate_transforms(child);
        Ok(())
    }

    /// Sets an object's local transform and immediately recomputes the
    /// subtree's global transforms.
    ///
    /// Moving a static object is applied anyway; the world's policy decides
    /// whether it is reported.
    pub fn set_local_transform(
        &mut self,
        handle: GameObjectHandle,
        local: Transform,
    ) -> Result<(), WorldError> {
        let obj = self.objects.get_mut(handle).ok_or(WorldError::InvalidHandle)?;
        obj.local_transform = local;
        self.propagate_transforms(handle);
        Ok(())
    }

    /// Recomputes global transforms depth-first from `root`, emitting
    /// `TransformChanged` to every object whose global actually changed and
    /// queueing their bounds for recommit.
    fn propagate_transforms(&mut self, root: GameObjectHandle) {
        let mut changes: Vec<(GameObjectHandle, Transform, Transform)> = Vec::new();
        let mut stack = vec![root];

        while let Some(handle) = stack.pop() {
            let parent_global = self
                .objects
                .get(handle)
                .and_then(|o| o.parent)
                .and_then(|p| self.objects.get(p))
                .map(|p| p.global_transform())
                .unwrap_or(Transform::IDENTITY);

            let Some(obj) = self.objects.get_mut(handle) else {
                continue;
            };
            let new_global = parent_global.mul(&obj.local_transform);
            if new_global.approx_eq(&obj.global_transform, TRANSFORM_EPSILON) {
                // Unchanged global means the whole subtree is still
                // consistent; nothing below needs a recompute.
                continue;
            }
            let old_global = obj.global_transform;
            obj.global_transform = new_global;
            changes.push((handle, old_global, new_global));
            stack.extend(obj.children.iter().copied());
        }

        for (handle, old_global, new_global) in changes {
            if self.report_static_moves {
                if let Some(obj) = self.objects.get(handle) {
                    if obj.is_static() {
                        log::warn!(
                            "static object '{}' ({handle}) moved; transform applied anyway",
                            obj.name()
                        );
                    }
                }
            }
            if self.spatial.entry(handle).is_some() {
                self.mark_bounds_dirty(handle);
            }
            let mut msg = Message::new(MessageKind::TransformChanged {
                old_global,
                new_global,
            });
            self.send_message(handle, &mut msg);
        }
    }

    // ---- Components ----

    /// Attaches a component of registered type `T` to `owner`.
    ///
    /// Fails with [`WorldError::InvalidOwner`] — allocating nothing — when
    /// the owner handle is dead.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered on this world.
    pub fn add_component<T: Component>(
        &mut self,
        owner: GameObjectHandle,
        payload: T,
    ) -> Result<ComponentHandle, WorldError> {
        if !self.objects.is_alive(owner) {
            return Err(WorldError::InvalidOwner);
        }
        let ty = self.manager_id::<T>();
        let manager = self.managers[ty.0 as usize]
            .as_any_mut()
            .downcast_mut::<ComponentManager<T>>()
            .unwrap_or_else(|| unreachable!("manager registered under wrong type"));
        let component = manager.create(owner, payload);

        if let Some(obj) = self.objects.get_mut(owner) {
            obj.components.push(component);
        }
        self.mark_bounds_dirty(owner);

        let mut msg = Message::new(MessageKind::ComponentsChanged {
            change: ComponentChange::Added,
            owner,
            component,
        });
        self.send_message(owner, &mut msg);
        Ok(component)
    }

    /// Detaches and destroys a component.
    ///
    /// Fails with [`WorldError::InvalidHandle`] for a stale handle.
    pub fn remove_component(&mut self, component: ComponentHandle) -> Result<(), WorldError> {
        let manager = self
            .managers
            .get(component.ty.0 as usize)
            .ok_or(WorldError::InvalidHandle)?;
        let owner = manager
            .owner_of(component.raw)
            .ok_or(WorldError::InvalidHandle)?;

        if let Some(obj) = self.objects.get_mut(owner) {
            obj.components.retain(|&c| c != component);
        }
        let mut msg = Message::new(MessageKind::ComponentsChanged {
            change: ComponentChange::Removed,
            owner,
            component,
        });
        self.send_message(owner, &mut msg);

        {
            split_world!(self => managers, channels);
            managers[component.ty.0 as usize].destroy(component.raw, &channels);
        }

        self.mark_bounds_dirty(owner);
        Ok(())
    }

    /// Returns a component payload by handle.
    pub fn component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.manager::<T>()?.get(handle)
    }

    /// Returns a component payload by handle, mutably.
    pub fn component_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.manager_mut::<T>()?.get_mut(handle)
    }

    /// Returns whether the component handle is still live.
    pub fn is_component_alive(&self, handle: ComponentHandle) -> bool {
        self.managers
            .get(handle.ty.0 as usize)
            .is_some_and(|m| m.is_alive(handle.raw))
    }

    /// Returns whether the component has run its `initialize` hook.
    pub fn is_component_initialized(&self, handle: ComponentHandle) -> bool {
        self.managers
            .get(handle.ty.0 as usize)
            .is_some_and(|m| m.is_initialized(handle.raw))
    }

    /// Activates or deactivates a component. Inactive components receive no
    /// messages and no updates.
    pub fn set_component_active(
        &mut self,
        handle: ComponentHandle,
        active: bool,
    ) -> Result<(), WorldError> {
        let ok = self
            .managers
            .get_mut(handle.ty.0 as usize)
            .is_some_and(|m| m.set_active(handle.raw, active));
        if !ok {
            return Err(WorldError::InvalidHandle);
        }
        if let Some(owner) = self.managers[handle.ty.0 as usize].owner_of(handle.raw) {
            self.mark_bounds_dirty(owner);
        }
        Ok(())
    }

    /// Activates or deactivates an object together with its components.
    pub fn set_object_active(
        &mut self,
        handle: GameObjectHandle,
        active: bool,
    ) -> Result<(), WorldError> {
        let components = {
            let obj = self.objects.get_mut(handle).ok_or(WorldError::InvalidHandle)?;
            if active {
                obj.flags |= ObjectFlags::ACTIVE;
            } else {
                obj.flags -= ObjectFlags::ACTIVE;
            }
            obj.components.clone()
        };
        for ch in components {
            if let Some(manager) = self.managers.get_mut(ch.ty.0 as usize) {
                manager.set_active(ch.raw, active);
            }
        }
        self.mark_bounds_dirty(handle);
        Ok(())
    }

    /// Sum of components still waiting for initialization across managers.
    pub fn pending_initializations(&self) -> usize {
        self.managers.iter().map(|m| m.pending_init_len()).sum()
    }

    // ---- Messages ----

    /// Delivers a message synchronously on the caller's stack.
    ///
    /// Dispatch order: each component on the target, in component-list order,
    /// that declares the message kind. If none handled it, the unhandled
    /// fallback is offered in the same order until one claims it. Returns
    /// whether anything handled the message.
    ///
    /// Messages restricted via `only_apply_to` skip dispatch when the target
    /// does not match. Dead targets are a silent no-op: deferred messages may
    /// legitimately outlive their target.
    pub fn send_message(&mut self, target: GameObjectHandle, message: &mut Message) -> bool {
        if let Some(only) = message.only_apply_to {
            if only != target {
                return false;
            }
        }
        let Some(obj) = self.objects.get(target) else {
            return false;
        };
        let components = obj.components.clone();

        split_world!(self => managers, channels);

        let mut handled = false;
        for &ch in &components {
            let manager = &mut managers[ch.ty.0 as usize];
            if manager.handles_message(message) {
                handled |= manager.dispatch(ch.raw, &channels, message);
            }
        }
        if !handled {
            for &ch in &components {
                let manager = &mut managers[ch.ty.0 as usize];
                if manager.dispatch_unhandled(ch.raw, &channels, message) {
                    handled = true;
                    break;
                }
            }
        }
        handled
    }

    /// Enqueues a message for delivery during the next message-processing
    /// phase. Safe to call from worker jobs.
    pub fn post_message(&self, target: GameObjectHandle, message: Message) {
        self.messages.post(target, message);
    }

    /// Installs the world-external listener that forwarding components route
    /// unhandled messages to.
    pub fn set_listener(&self, listener: impl WorldListener + 'static) {
        *self.listener.lock() = Some(Box::new(listener));
    }

    /// Removes the installed listener.
    pub fn clear_listener(&self) {
        *self.listener.lock() = None;
    }

    // ---- Bounds & spatial ----

    /// Queues an object for bounds recomputation in the next bounds phase.
    pub fn invalidate_object_bounds(
        &mut self,
        handle: GameObjectHandle,
    ) -> Result<(), WorldError> {
        if !self.objects.is_alive(handle) {
            return Err(WorldError::InvalidHandle);
        }
        self.mark_bounds_dirty(handle);
        Ok(())
    }

    /// Returns the spatial index.
    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Returns the spatial category table.
    pub fn categories(&self) -> &SpatialCategories {
        &self.categories
    }

    /// Returns the spatial category table, mutably.
    pub fn categories_mut(&mut self) -> &mut SpatialCategories {
        &mut self.categories
    }

    fn mark_bounds_dirty(&mut self, handle: GameObjectHandle) {
        let idx = handle.index() as usize;
        if self.bounds_dirty.len() <= idx {
            self.bounds_dirty.grow(idx + 1);
        }
        self.bounds_dirty.set(idx, true);
    }

    /// Runs one bounds-aggregation pass for an object and commits the result
    /// to the spatial index.
    fn update_object_bounds(&mut self, handle: GameObjectHandle) {
        let Some(obj) = self.objects.get(handle) else {
            self.spatial.remove(handle);
            return;
        };
        if !obj.is_active() {
            self.spatial.remove(handle);
            return;
        }

        let mut msg = Message::new(MessageKind::UpdateLocalBounds(BoundsAccumulator::new()));
        self.send_message(handle, &mut msg);
        let MessageKind::UpdateLocalBounds(acc) = msg.kind else {
            unreachable!("bounds message kind replaced during dispatch")
        };

        let Some(obj) = self.objects.get_mut(handle) else {
            return;
        };
        obj.local_bounds = acc.bounds();
        obj.category_mask = acc.category_mask();
        obj.always_visible = acc.is_always_visible();

        if acc.has_content() {
            let entry = SpatialEntry {
                world_bounds: obj.local_bounds.transformed(&obj.global_transform),
                category_mask: obj.category_mask,
                always_visible: obj.always_visible,
            };
            self.spatial.commit(handle, entry);
        } else {
            self.spatial.remove(handle);
        }
    }

    /// Gathers render data from every object committed to the spatial index,
    /// via the pull-based `ExtractRenderData` message.
    pub fn gather_render_data(&mut self) -> Vec<RenderDataEntry> {
        let targets: Vec<GameObjectHandle> = self.spatial.iter().map(|(h, _)| h).collect();
        let mut entries = Vec::new();
        for handle in targets {
            let Some(obj) = self.objects.get(handle) else {
                continue;
            };
            if !obj.is_active() {
                continue;
            }
            let collector = RenderDataCollector::new(handle, obj.global_transform());
            let mut msg = Message::new(MessageKind::ExtractRenderData(collector));
            self.send_message(handle, &mut msg);
            let MessageKind::ExtractRenderData(collector) = msg.kind else {
                unreachable!("render gather message kind replaced during dispatch")
            };
            entries.extend(collector.into_entries());
        }
        entries
    }

    // ---- Deletion ----

    /// Requests deferred deletion, processed during the next deletion phase.
    /// Components on the target may cancel it then. Safe from worker jobs.
    pub fn request_deletion(&self, target: GameObjectHandle, delete_empty_parents: bool) {
        self.deletions.request(target, delete_empty_parents);
    }

    /// Runs the full deletion protocol for one object immediately: cancel
    /// dispatch first, then (if uncancelled) subtree destruction and optional
    /// empty-ancestor cleanup.
    pub fn delete_object_now(
        &mut self,
        target: GameObjectHandle,
        delete_empty_parents: bool,
    ) -> DeletionOutcome {
        self.process_deletion_request(DeletionRequest {
            target,
            delete_empty_parents,
        })
    }

    fn process_deletion_request(&mut self, request: DeletionRequest) -> DeletionOutcome {
        if !self.objects.is_alive(request.target) {
            return DeletionOutcome::TargetGone;
        }

        let mut msg = Message::new(MessageKind::DeleteObject {
            delete_empty_parents: request.delete_empty_parents,
            cancel: false,
        });
        self.send_message(request.target, &mut msg);
        let MessageKind::DeleteObject { cancel, .. } = msg.kind else {
            unreachable!("deletion message kind replaced during dispatch")
        };
        if cancel {
            log::debug!("deletion of {} cancelled by a component", request.target);
            return DeletionOutcome::Cancelled;
        }

        let parent = self.objects.get(request.target).and_then(|o| o.parent);
        self.destroy_subtree(request.target);
        if request.delete_empty_parents {
            self.delete_empty_ancestors(parent);
        }
        DeletionOutcome::Committed
    }

    /// Destroys `target` and all descendants, children before parents.
    fn destroy_subtree(&mut self, target: GameObjectHandle) {
        let mut order = Vec::new();
        let mut stack = vec![target];
        while let Some(handle) = stack.pop() {
            order.push(handle);
            if let Some(obj) = self.objects.get(handle) {
                stack.extend(obj.children.iter().copied());
            }
        }
        for handle in order.into_iter().rev() {
            self.destroy_object_single(handle);
        }
    }

    /// Destroys one object: components (managers notified), spatial entry,
    /// parent unlink, slot free.
    fn destroy_object_single(&mut self, handle: GameObjectHandle) {
        let Some(components) = self.objects.get(handle).map(|o| o.components.clone()) else {
            return;
        };

        {
            split_world!(self => managers, channels);
            for ch in components {
                managers[ch.ty.0 as usize].destroy(ch.raw, &channels);
            }
        }

        self.spatial.remove(handle);

        let parent = self.objects.get(handle).and_then(|o| o.parent);
        if let Some(parent) = parent {
            if let Some(parent_obj) = self.objects.get_mut(parent) {
                parent_obj.children.retain(|&c| c != handle);
            }
        }
        self.objects.destroy(handle);
    }

    /// Walks up from `start`, deleting each ancestor left with zero children
    /// and zero components, stopping at the first one that still has content.
    fn delete_empty_ancestors(&mut self, start: Option<GameObjectHandle>) {
        let mut cursor = start;
        while let Some(handle) = cursor {
            let Some(obj) = self.objects.get(handle) else {
                break;
            };
            if !obj.children.is_empty() || !obj.components.is_empty() {
                break;
            }
            cursor = obj.parent;
            self.destroy_object_single(handle);
        }
    }

    // ---- Tick driver ----

    /// Advances the world by one tick. Runs every phase to completion; a
    /// started tick is never cancelled.
    pub fn update(&mut self, delta_time: f32) {
        self.tick += 1;
        self.delta_time = delta_time;

        // Phase 1: time-boxed component initialization.
        let deadline = Instant::now() + self.init_budget;
        {
            split_world!(self => managers, channels);
            for manager in managers.iter_mut() {
                manager.initialize_pending(deadline, &channels);
            }
        }

        // Phase 2: per-type update batches, parallel where declared safe.
        self.run_update_batches();

        // Sync point: structural mutations queued by update jobs.
        self.apply_commands();

        // Phase 3: drain the deferred message queue. Messages posted during
        // this phase deliver next tick.
        for (target, mut message) in self.messages.drain() {
            self.send_message(target, &mut message);
        }

        // Sync point: structural mutations queued by message handlers.
        self.apply_commands();

        // Phase 4: transform sync. Deferred moves apply here; dead targets
        // are silently skipped.
        for (target, local) in self.moves.drain() {
            let _ = self.set_local_transform(target, local);
        }

        // Phase 5: bounds recompute, dirty set only.
        let dirty: Vec<usize> = self.bounds_dirty.ones().collect();
        self.bounds_dirty.clear();
        for idx in dirty {
            if let Some(handle) = self.objects.handle_at(idx as u32) {
                self.update_object_bounds(handle);
            }
        }

        // Phase 6: deletion processing.
        for request in self.deletions.drain() {
            self.process_deletion_request(request);
        }
    }

    fn run_update_batches(&mut self) {
        split_world!(self => managers, pool, channels);

        let mut parallel: Vec<&mut Box<dyn AnyComponentManager>> = Vec::new();
        let mut serial: Vec<&mut Box<dyn AnyComponentManager>> = Vec::new();
        for manager in managers.iter_mut() {
            if manager.parallel_update() {
                parallel.push(manager);
            } else {
                serial.push(manager);
            }
        }

        let channels_ref = &channels;
        pool.scope(|scope| {
            for manager in parallel {
                scope.spawn(move || manager.update_all(channels_ref));
            }
        });
        // Managers with declared data dependencies run serialized.
        for manager in serial {
            manager.update_all(channels_ref);
        }
    }

    fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            command(self);
        }
    }

    // ---- Persistence hooks ----

    pub(crate) fn serialize_component_bytes(
        &self,
        component: ComponentHandle,
    ) -> Result<(String, Vec<u8>), SnapshotError> {
        let manager = self
            .managers
            .get(component.ty.0 as usize)
            .ok_or(SnapshotError::DeadComponent)?;
        Ok((
            manager.type_name().to_string(),
            manager.serialize_component(component.raw)?,
        ))
    }

    pub(crate) fn attach_component_bytes(
        &mut self,
        owner: GameObjectHandle,
        type_name: &str,
        bytes: &[u8],
    ) -> Result<ComponentHandle, SnapshotError> {
        if !self.objects.is_alive(owner) {
            return Err(SnapshotError::Structural(WorldError::InvalidOwner));
        }
        let index = self
            .managers
            .iter()
            .position(|m| m.type_name() == type_name)
            .ok_or_else(|| SnapshotError::UnknownComponentType(type_name.to_string()))?;
        let component = self.managers[index].create_from_bytes(owner, bytes)?;
        if let Some(obj) = self.objects.get_mut(owner) {
            obj.components.push(component);
        }
        self.mark_bounds_dirty(owner);
        Ok(component)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldDesc::new("World"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentCtx;
    use glam::Vec3;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct PingCounter {
        pings: u32,
    }

    impl Component for PingCounter {
        const TYPE_NAME: &'static str = "PingCounter";

        fn handles_message(message: &Message) -> bool {
            matches!(&message.kind, MessageKind::Custom(c) if c.name == "Ping")
        }

        fn on_message(&mut self, _ctx: &ComponentCtx<'_>, message: &mut Message) {
            if let MessageKind::Custom(custom) = &mut message.kind {
                self.pings += 1;
                if let Some(order) = custom.payload_mut::<Vec<&'static str>>() {
                    order.push("PingCounter");
                }
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct PingEcho;

    impl Component for PingEcho {
        const TYPE_NAME: &'static str = "PingEcho";

        fn handles_message(message: &Message) -> bool {
            matches!(&message.kind, MessageKind::Custom(c) if c.name == "Ping")
        }

        fn on_message(&mut self, _ctx: &ComponentCtx<'_>, message: &mut Message) {
            if let MessageKind::Custom(custom) = &mut message.kind {
                if let Some(order) = custom.payload_mut::<Vec<&'static str>>() {
                    order.push("PingEcho");
                }
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct TransformTracker {
        moves: u32,
        last_delta: Vec3,
    }

    impl Component for TransformTracker {
        const TYPE_NAME: &'static str = "TransformTracker";

        fn handles_message(message: &Message) -> bool {
            matches!(message.kind, MessageKind::TransformChanged { .. })
        }

        fn on_message(&mut self, _ctx: &ComponentCtx<'_>, message: &mut Message) {
            if let MessageKind::TransformChanged {
                old_global,
                new_global,
            } = &message.kind
            {
                self.moves += 1;
                self.last_delta = new_global.translation - old_global.translation;
            }
        }
    }

    fn world() -> World {
        World::new(WorldDesc::new("test"))
    }

    #[test]
    fn create_object_with_dead_parent_fails() {
        let mut w = world();
        let parent = w.create_object(&ObjectDesc::new("p")).unwrap();
        w.delete_object_now(parent, false);

        let err = w
            .create_object(&ObjectDesc::new("c").with_parent(parent))
            .unwrap_err();
        assert_eq!(err, WorldError::InvalidHandle);
        assert_eq!(w.object_count(), 0);
    }

    #[test]
    fn add_component_to_dead_owner_fails() {
        let mut w = world();
        w.register_component::<PingCounter>();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        assert_eq!(w.delete_object_now(obj, false), DeletionOutcome::Committed);

        let err = w.add_component(obj, PingCounter::default()).unwrap_err();
        assert_eq!(err, WorldError::InvalidOwner);
        assert_eq!(w.component_count(), 0);
    }

    #[test]
    #[should_panic(expected = "is not registered in this world")]
    fn add_unregistered_component_panics() {
        let mut w = world();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        let _ = w.add_component(obj, PingCounter::default());
    }

    #[test]
    fn set_parent_maintains_child_lists() {
        let mut w = world();
        let a = w.create_object(&ObjectDesc::new("a")).unwrap();
        let b = w.create_object(&ObjectDesc::new("b")).unwrap();
        let c = w.create_object(&ObjectDesc::new("c")).unwrap();

        w.set_parent(c, Some(a)).unwrap();
        assert_eq!(w.object(a).unwrap().children(), &[c]);
        assert_eq!(w.object(c).unwrap().parent(), Some(a));

        w.set_parent(c, Some(b)).unwrap();
        assert!(w.object(a).unwrap().children().is_empty());
        assert_eq!(w.object(b).unwrap().children(), &[c]);
        assert_eq!(w.object(c).unwrap().parent(), Some(b));

        w.set_parent(c, None).unwrap();
        assert!(w.object(b).unwrap().children().is_empty());
        assert_eq!(w.object(c).unwrap().parent(), None);
    }

    #[test]
    fn cycle_rejected_and_hierarchy_unchanged() {
        let mut w = world();
        let a = w.create_object(&ObjectDesc::new("a")).unwrap();
        let b = w
            .create_object(&ObjectDesc::new("b").with_parent(a))
            .unwrap();
        let c = w
            .create_object(&ObjectDesc::new("c").with_parent(b))
            .unwrap();

        assert_eq!(w.set_parent(a, Some(c)), Err(WorldError::CyclicHierarchy));
        assert_eq!(w.set_parent(a, Some(a)), Err(WorldError::CyclicHierarchy));

        // Structure untouched.
        assert_eq!(w.object(a).unwrap().parent(), None);
        assert_eq!(w.object(b).unwrap().parent(), Some(a));
        assert_eq!(w.object(c).unwrap().parent(), Some(b));
        assert_eq!(w.object(a).unwrap().children(), &[b]);
    }

    #[test]
    fn global_transform_tracks_hierarchy_immediately() {
        let mut w = world();
        let parent = w
            .create_object(&ObjectDesc::new("p").with_transform(Transform::from_xyz(1.0, 0.0, 0.0)))
            .unwrap();
        let child = w
            .create_object(
                &ObjectDesc::new("c")
                    .with_parent(parent)
                    .with_transform(Transform::from_xyz(0.0, 2.0, 0.0)),
            )
            .unwrap();

        assert_eq!(
            w.object(child).unwrap().global_transform().translation,
            Vec3::new(1.0, 2.0, 0.0)
        );

        // Moving the parent propagates to the child in the same call.
        w.set_local_transform(parent, Transform::from_xyz(5.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(
            w.object(child).unwrap().global_transform().translation,
            Vec3::new(5.0, 2.0, 0.0)
        );

        // Unlinking re-derives the global from the root.
        w.set_parent(child, None).unwrap();
        assert_eq!(
            w.object(child).unwrap().global_transform().translation,
            Vec3::new(0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn transform_changed_carries_delta() {
        let mut w = world();
        w.register_component::<TransformTracker>();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        let ch = w.add_component(obj, TransformTracker::default()).unwrap();

        w.set_local_transform(obj, Transform::from_xyz(3.0, 0.0, 0.0))
            .unwrap();

        let tracker = w.component::<TransformTracker>(ch).unwrap();
        assert_eq!(tracker.moves, 1);
        assert_eq!(tracker.last_delta, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn static_object_move_is_applied() {
        let mut w = world();
        let obj = w
            .create_object(&ObjectDesc::new("rock").static_object())
            .unwrap();

        // Policy is warn-only: the move must still land.
        w.set_local_transform(obj, Transform::from_xyz(9.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(
            w.object(obj).unwrap().global_transform().translation,
            Vec3::new(9.0, 0.0, 0.0)
        );
    }

    #[test]
    fn dispatch_follows_component_list_order() {
        let mut w = world();
        w.register_component::<PingCounter>();
        w.register_component::<PingEcho>();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        w.add_component(obj, PingEcho).unwrap();
        w.add_component(obj, PingCounter::default()).unwrap();

        let mut msg = Message::custom_with("Ping", Vec::<&'static str>::new());
        assert!(w.send_message(obj, &mut msg));

        let MessageKind::Custom(custom) = &msg.kind else {
            unreachable!()
        };
        assert_eq!(
            custom.payload::<Vec<&'static str>>().unwrap().as_slice(),
            &["PingEcho", "PingCounter"]
        );
    }

    #[test]
    fn restricted_message_skips_mismatched_target() {
        let mut w = world();
        w.register_component::<PingCounter>();
        let a = w.create_object(&ObjectDesc::new("a")).unwrap();
        let b = w.create_object(&ObjectDesc::new("b")).unwrap();
        let ch = w.add_component(a, PingCounter::default()).unwrap();

        let mut msg = Message::custom("Ping").only_apply_to(b);
        assert!(!w.send_message(a, &mut msg));
        assert_eq!(w.component::<PingCounter>(ch).unwrap().pings, 0);

        let mut msg = Message::custom("Ping").only_apply_to(a);
        assert!(w.send_message(a, &mut msg));
        assert_eq!(w.component::<PingCounter>(ch).unwrap().pings, 1);
    }

    #[test]
    fn posted_message_delivered_next_update() {
        let mut w = world();
        w.register_component::<PingCounter>();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        let ch = w.add_component(obj, PingCounter::default()).unwrap();

        w.post_message(obj, Message::custom("Ping"));
        assert_eq!(w.component::<PingCounter>(ch).unwrap().pings, 0);

        w.update(0.016);
        assert_eq!(w.component::<PingCounter>(ch).unwrap().pings, 1);
    }

    #[test]
    fn message_to_dead_target_is_noop() {
        let mut w = world();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        w.delete_object_now(obj, false);

        let mut msg = Message::custom("Ping");
        assert!(!w.send_message(obj, &mut msg));

        // Deferred messages may outlive their target across a deletion.
        w.post_message(obj, Message::custom("Ping"));
        w.update(0.016); // must not panic
    }

    #[test]
    fn deletion_removes_subtree() {
        let mut w = world();
        let root = w.create_object(&ObjectDesc::new("root")).unwrap();
        let child = w
            .create_object(&ObjectDesc::new("child").with_parent(root))
            .unwrap();
        let grandchild = w
            .create_object(&ObjectDesc::new("grandchild").with_parent(child))
            .unwrap();

        w.request_deletion(child, false);
        w.update(0.016);

        assert!(w.is_alive(root));
        assert!(!w.is_alive(child));
        assert!(!w.is_alive(grandchild));
        assert!(w.object(root).unwrap().children().is_empty());
    }

    #[test]
    fn empty_ancestor_chain_cleaned_up() {
        let mut w = world();
        w.register_component::<PingCounter>();

        // root -> mid -> leaf, all empty except the leaf request target.
        let root = w.create_object(&ObjectDesc::new("root")).unwrap();
        let mid = w
            .create_object(&ObjectDesc::new("mid").with_parent(root))
            .unwrap();
        let leaf = w
            .create_object(&ObjectDesc::new("leaf").with_parent(mid))
            .unwrap();

        assert_eq!(w.delete_object_now(leaf, true), DeletionOutcome::Committed);
        assert!(!w.is_alive(leaf));
        assert!(!w.is_alive(mid));
        assert!(!w.is_alive(root));

        // An ancestor with content stops the walk.
        let root = w.create_object(&ObjectDesc::new("root")).unwrap();
        w.add_component(root, PingCounter::default()).unwrap();
        let mid = w
            .create_object(&ObjectDesc::new("mid").with_parent(root))
            .unwrap();
        let leaf = w
            .create_object(&ObjectDesc::new("leaf").with_parent(mid))
            .unwrap();

        w.delete_object_now(leaf, true);
        assert!(!w.is_alive(mid));
        assert!(w.is_alive(root));
    }

    #[test]
    fn delete_object_now_on_dead_target() {
        let mut w = world();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        w.delete_object_now(obj, false);
        assert_eq!(w.delete_object_now(obj, false), DeletionOutcome::TargetGone);
    }

    #[test]
    fn inactive_object_dropped_from_spatial() {
        let mut w = world();
        w.register_component::<crate::components::ShapeComponent>();
        let obj = w.create_object(&ObjectDesc::new("o")).unwrap();
        w.add_component(
            obj,
            crate::components::ShapeComponent::new(
                crate::components::Shape::Sphere { radius: 1.0 },
                SpatialCategories::RENDER_DYNAMIC,
            ),
        )
        .unwrap();
        w.update(0.016);
        assert!(w.spatial().entry(obj).is_some());

        w.set_object_active(obj, false).unwrap();
        w.update(0.016);
        assert!(w.spatial().entry(obj).is_none());
    }
}
