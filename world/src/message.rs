//! Typed messages routed to the components of a target object.
//!
//! A [`Message`] is a [`MessageKind`] plus an optional "only apply to"
//! restriction handle. Dispatch offers the message to each component on the
//! target (in component-list order) that declares the kind via
//! `Component::handles_message`; when none does, the per-component
//! unhandled fallback runs instead. That path is how otherwise-unhandled
//! messages reach a world-external listener through a forwarding component.
//!
//! [`World::send_message`](crate::World::send_message) delivers immediately
//! on the caller's stack; [`World::post_message`](crate::World::post_message)
//! enqueues into the lock-protected [`MessageQueue`], drained single-threaded
//! during the tick's message-processing phase.

use std::any::Any;

use marigold_core::{BoundingVolume, Transform};
use parking_lot::Mutex;

use crate::component::ComponentHandle;
use crate::object::GameObjectHandle;
use crate::spatial::BoundsAccumulator;

/// Direction of a parent-link change, delivered to the affected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentChange {
    /// The object was linked under the carried parent.
    Linked,
    /// The object was unlinked from the carried parent.
    Unlinked,
}

/// Direction of a child-list change, delivered to the parent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildChange {
    Added,
    Removed,
}

/// Direction of a component-list change, delivered to the owning object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentChange {
    Added,
    Removed,
}

/// A user-defined message identified by name, with an optional payload.
pub struct CustomMessage {
    /// Message name components match on.
    pub name: &'static str,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

impl CustomMessage {
    /// Creates a payload-less custom message.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            payload: None,
        }
    }

    /// Creates a custom message carrying a typed payload.
    pub fn with_payload<T: Any + Send + Sync>(name: &'static str, payload: T) -> Self {
        Self {
            name,
            payload: Some(Box::new(payload)),
        }
    }

    /// Returns the payload downcast to `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Returns the payload downcast to `T`, mutably.
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.downcast_mut::<T>()
    }
}

impl std::fmt::Debug for CustomMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomMessage")
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// One render-data record gathered from a component.
#[derive(Debug, Clone, Copy)]
pub struct RenderDataEntry {
    /// Object the data belongs to.
    pub object: GameObjectHandle,
    /// Global transform at gather time.
    pub global_transform: Transform,
    /// World-space bounds of the rendered data.
    pub world_bounds: BoundingVolume,
    /// Spatial category bitmask the data belongs to.
    pub category_mask: u32,
}

/// Pull-based render-data gathering payload.
///
/// The world primes the collector with the target object's handle and global
/// transform; components push their entries. Renderer backends consume the
/// collected entries as opaque records.
#[derive(Debug)]
pub struct RenderDataCollector {
    object: GameObjectHandle,
    object_global: Transform,
    entries: Vec<RenderDataEntry>,
}

impl RenderDataCollector {
    pub(crate) fn new(object: GameObjectHandle, object_global: Transform) -> Self {
        Self {
            object,
            object_global,
            entries: Vec::new(),
        }
    }

    /// Returns the target object's handle.
    pub fn object(&self) -> GameObjectHandle {
        self.object
    }

    /// Returns the target object's global transform at gather time.
    pub fn object_global(&self) -> Transform {
        self.object_global
    }

    /// Pushes one entry. `local_bounds` is transformed into world space by
    /// the object's global transform.
    pub fn push(&mut self, local_bounds: BoundingVolume, category_mask: u32) {
        self.entries.push(RenderDataEntry {
            object: self.object,
            global_transform: self.object_global,
            world_bounds: local_bounds.transformed(&self.object_global),
            category_mask,
        });
    }

    pub(crate) fn into_entries(self) -> Vec<RenderDataEntry> {
        self.entries
    }

    /// Returns the entries pushed so far.
    pub fn entries(&self) -> &[RenderDataEntry] {
        &self.entries
    }
}

/// The set of messages the world routes.
///
/// Engine messages carry their payload inline; mutable payloads
/// (bounds accumulation, deletion cancel) are written back through the
/// `&mut Message` passed to handlers.
#[derive(Debug)]
pub enum MessageKind {
    /// The object's parent link changed. Carries the previous parent for
    /// `Unlinked`, the new parent for `Linked`.
    ParentChanged {
        change: ParentChange,
        parent: GameObjectHandle,
    },
    /// A child was added to or removed from the object's child list.
    ChildrenChanged {
        change: ChildChange,
        parent: GameObjectHandle,
        child: GameObjectHandle,
    },
    /// A component was added to or removed from the object.
    ComponentsChanged {
        change: ComponentChange,
        owner: GameObjectHandle,
        component: ComponentHandle,
    },
    /// The object's global transform changed. Carries old and new values so
    /// components can react to deltas (velocity estimation and the like).
    TransformChanged {
        old_global: Transform,
        new_global: Transform,
    },
    /// Bounds-aggregation pass: components contribute local bounds.
    UpdateLocalBounds(BoundsAccumulator),
    /// Pull-based render-data gather: components push entries.
    ExtractRenderData(RenderDataCollector),
    /// Deletion protocol: components may set `cancel` to veto this tick's
    /// deletion. A cancelled deletion must be re-requested explicitly.
    DeleteObject {
        delete_empty_parents: bool,
        cancel: bool,
    },
    /// User-defined message.
    Custom(CustomMessage),
}

/// A routable message: kind plus optional object restriction.
#[derive(Debug)]
pub struct Message {
    /// The typed payload.
    pub kind: MessageKind,
    /// When set, dispatch only happens if the target matches this handle;
    /// other targets skip dispatch entirely.
    pub only_apply_to: Option<GameObjectHandle>,
}

impl Message {
    /// Creates a message of the given kind with no restriction.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            only_apply_to: None,
        }
    }

    /// Creates a payload-less custom message.
    pub fn custom(name: &'static str) -> Self {
        Self::new(MessageKind::Custom(CustomMessage::new(name)))
    }

    /// Creates a custom message with a typed payload.
    pub fn custom_with<T: Any + Send + Sync>(name: &'static str, payload: T) -> Self {
        Self::new(MessageKind::Custom(CustomMessage::with_payload(
            name, payload,
        )))
    }

    /// Returns this message restricted to a single target object.
    #[must_use]
    pub fn only_apply_to(mut self, object: GameObjectHandle) -> Self {
        self.only_apply_to = Some(object);
        self
    }
}

/// Lock-protected deferred message queue.
///
/// Posting is safe from worker jobs; draining happens single-threaded in the
/// message-processing phase. Messages posted while the phase drains are
/// delivered next tick, keeping per-phase work bounded.
pub(crate) struct MessageQueue {
    inner: Mutex<Vec<(GameObjectHandle, Message)>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn post(&self, target: GameObjectHandle, message: Message) {
        self.inner.lock().push((target, message));
    }

    pub fn drain(&self) -> Vec<(GameObjectHandle, Message)> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Lock-protected queue of deferred local-transform sets.
///
/// Worker jobs may not mutate the object graph directly; they post moves
/// here, and the transform-sync phase applies and propagates them.
pub(crate) struct TransformQueue {
    inner: Mutex<Vec<(GameObjectHandle, Transform)>>,
}

impl TransformQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn post(&self, target: GameObjectHandle, local_transform: Transform) {
        self.inner.lock().push((target, local_transform));
    }

    pub fn drain(&self) -> Vec<(GameObjectHandle, Transform)> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    fn object(index: u32) -> GameObjectHandle {
        GameObjectHandle(Handle::new(index, 0))
    }

    #[test]
    fn custom_payload_downcast() {
        let mut msg = Message::custom_with("Damage", 42u32);
        let MessageKind::Custom(custom) = &mut msg.kind else {
            panic!("expected custom message");
        };
        assert_eq!(custom.name, "Damage");
        assert_eq!(custom.payload::<u32>(), Some(&42));
        assert_eq!(custom.payload::<i64>(), None);

        *custom.payload_mut::<u32>().unwrap() = 7;
        assert_eq!(custom.payload::<u32>(), Some(&7));
    }

    #[test]
    fn custom_without_payload() {
        let msg = Message::custom("Ping");
        let MessageKind::Custom(custom) = &msg.kind else {
            panic!("expected custom message");
        };
        assert_eq!(custom.payload::<u32>(), None);
    }

    #[test]
    fn restriction_builder() {
        let msg = Message::custom("Ping").only_apply_to(object(3));
        assert_eq!(msg.only_apply_to, Some(object(3)));
    }

    #[test]
    fn queue_post_and_drain() {
        let queue = MessageQueue::new();
        queue.post(object(0), Message::custom("A"));
        queue.post(object(1), Message::custom("B"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, object(0));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn collector_transforms_bounds() {
        let global = Transform::from_xyz(10.0, 0.0, 0.0);
        let mut collector = RenderDataCollector::new(object(0), global);
        collector.push(BoundingVolume::from_sphere(glam::Vec3::ZERO, 1.0), 1);

        let entry = collector.entries()[0];
        assert_eq!(entry.object, object(0));
        assert_eq!(entry.world_bounds.center, glam::Vec3::new(10.0, 0.0, 0.0));
    }
}
