//! The component capability model.
//!
//! Component types are plain data plus a small set of behavior hooks, with
//! no inheritance chain. Each type declares which messages it handles, how it
//! reacts to dispatch, and its per-tick update; the world talks to all types
//! uniformly through the type-erased manager layer (see
//! [`manager`](crate::manager)).
//!
//! Hooks run with a [`ComponentCtx`]: a narrow view of the world that can
//! enqueue deferred work (messages, deletions, transform moves, structural
//! commands) and reach the installed [`WorldListener`], but cannot touch
//! storages mid-iteration.

use marigold_core::Transform;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::commands::CommandQueue;
use crate::deletion::DeletionQueue;
use crate::handle::Handle;
use crate::listener::WorldListener;
use crate::message::{Message, MessageQueue, TransformQueue};
use crate::object::GameObjectHandle;
use crate::world::World;

/// Index of a registered component type within its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    /// Returns the registration index.
    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Generation-checked reference to a component instance.
///
/// Identifies both the component type (its manager) and the instance slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    pub(crate) ty: ComponentTypeId,
    pub(crate) raw: Handle,
}

impl ComponentHandle {
    /// Returns the component type this handle belongs to.
    pub fn component_type(&self) -> ComponentTypeId {
        self.ty
    }

    /// Returns the slot index of this handle.
    pub fn index(&self) -> u32 {
        self.raw.index()
    }

    /// Returns the generation this handle was minted with.
    pub fn generation(&self) -> u32 {
        self.raw.generation()
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Component(ty{}:{}@{})",
            self.ty.0,
            self.raw.index(),
            self.raw.generation()
        )
    }
}

/// Storage discipline for a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Live instances stay densely packed; deleting moves the last element
    /// into the freed slot. Iteration is cache-friendly, but raw indices are
    /// not stable across deletions — never cache them across frames.
    Compact,
    /// Deleted slots become tombstones skipped during iteration. Indices stay
    /// stable for the component's lifetime.
    Stable,
}

/// A component type: data plus capability hooks.
///
/// All hooks have no-op defaults; a minimal component is just a serializable
/// struct with a `TYPE_NAME`. The serde bounds feed the world's persistence
/// layer.
pub trait Component: Sized + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable name used for persistence and diagnostics.
    const TYPE_NAME: &'static str;

    /// Storage discipline for this type.
    fn storage() -> StorageKind {
        StorageKind::Compact
    }

    /// Whether this type's update batch may run on a worker thread
    /// concurrently with other parallel-safe types. Types with data
    /// dependencies on other managers must return false to be serialized.
    fn parallel_update() -> bool {
        true
    }

    /// Declares which message kinds this type wants dispatched.
    fn handles_message(message: &Message) -> bool {
        let _ = message;
        false
    }

    /// Reacts to a message declared via [`handles_message`](Self::handles_message).
    fn on_message(&mut self, ctx: &ComponentCtx<'_>, message: &mut Message) {
        let _ = (ctx, message);
    }

    /// Fallback offered when no component on the target handled the message.
    /// Returns whether this fallback handled it.
    fn on_unhandled_message(&mut self, ctx: &ComponentCtx<'_>, message: &mut Message) -> bool {
        let _ = (ctx, message);
        false
    }

    /// Runs once before the first update, inside the time-boxed
    /// initialization phase.
    fn initialize(&mut self, ctx: &ComponentCtx<'_>) {
        let _ = ctx;
    }

    /// Runs when the component is destroyed (explicit removal or owner
    /// deletion).
    fn deinitialize(&mut self, ctx: &ComponentCtx<'_>) {
        let _ = ctx;
    }

    /// Per-tick update, called for active, initialized instances.
    fn update(&mut self, ctx: &ComponentCtx<'_>) {
        let _ = ctx;
    }
}

/// Shared world channels reachable from component hooks.
///
/// Built by the world via field splitting so hooks can run while manager
/// storage is mutably borrowed.
pub(crate) struct WorldChannels<'a> {
    pub messages: &'a MessageQueue,
    pub deletions: &'a DeletionQueue,
    pub commands: &'a CommandQueue,
    pub moves: &'a TransformQueue,
    pub listener: &'a Mutex<Option<Box<dyn WorldListener>>>,
    pub tick: u64,
    pub delta_time: f32,
}

/// Narrow world view passed to component hooks.
///
/// Everything here is deferred or externally synchronized: safe to call while
/// the world iterates storages, including from parallel update batches.
pub struct ComponentCtx<'a> {
    channels: &'a WorldChannels<'a>,
    owner: GameObjectHandle,
    component: ComponentHandle,
}

impl<'a> ComponentCtx<'a> {
    pub(crate) fn new(
        channels: &'a WorldChannels<'a>,
        owner: GameObjectHandle,
        component: ComponentHandle,
    ) -> Self {
        Self {
            channels,
            owner,
            component,
        }
    }

    /// Handle of the object owning this component.
    pub fn owner(&self) -> GameObjectHandle {
        self.owner
    }

    /// Handle of this component instance.
    pub fn component(&self) -> ComponentHandle {
        self.component
    }

    /// Current world tick.
    pub fn tick(&self) -> u64 {
        self.channels.tick
    }

    /// Delta time of the current tick, in seconds.
    pub fn delta_time(&self) -> f32 {
        self.channels.delta_time
    }

    /// Posts a deferred message, delivered during the next
    /// message-processing phase. Safe from any hook, including parallel
    /// update batches.
    pub fn post_message(&self, target: GameObjectHandle, message: Message) {
        self.channels.messages.post(target, message);
    }

    /// Requests deferred deletion of an object, processed during the
    /// deletion phase (components on the target may still cancel it).
    pub fn request_deletion(&self, target: GameObjectHandle, delete_empty_parents: bool) {
        self.channels.deletions.request(target, delete_empty_parents);
    }

    /// Queues a deferred local-transform set, applied (and propagated)
    /// during the transform-sync phase.
    pub fn post_transform(&self, target: GameObjectHandle, local_transform: Transform) {
        self.channels.moves.post(target, local_transform);
    }

    /// Queues a structural mutation to run with `&mut World` at the next
    /// sync point.
    pub fn defer(&self, command: impl FnOnce(&mut World) + Send + 'static) {
        self.channels.commands.push(command);
    }

    /// Forwards a message to the installed world listener, if any.
    /// Returns whether a listener existed and handled the message.
    pub fn forward_to_listener(&self, message: &mut Message) -> bool {
        let mut guard = self.channels.listener.lock();
        match guard.as_mut() {
            Some(listener) => listener.on_message(self.owner, message),
            None => false,
        }
    }
}
