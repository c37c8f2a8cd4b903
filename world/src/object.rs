//! Game objects: the nodes of the world's parent/child graph.
//!
//! A [`GameObject`] owns its place in the hierarchy (parent handle, ordered
//! children), an ordered list of heterogeneous component handles, its local
//! and cached global transform, and the spatial data committed by the bounds
//! aggregator. Objects are stored in stable slots owned by the world and are
//! only ever referenced by [`GameObjectHandle`].

use bitflags::bitflags;
use marigold_core::{BoundingVolume, Transform};

use crate::component::ComponentHandle;
use crate::handle::{Handle, HandleRegistry};

/// Generation-checked reference to a game object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameObjectHandle(pub(crate) Handle);

impl GameObjectHandle {
    /// Returns the slot index of this handle.
    pub fn index(&self) -> u32 {
        self.0.index()
    }

    /// Returns the generation this handle was minted with.
    pub fn generation(&self) -> u32 {
        self.0.generation()
    }
}

impl std::fmt::Debug for GameObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GameObject({}@{})", self.0.index(), self.0.generation())
    }
}

impl std::fmt::Display for GameObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GameObject({}@{})", self.0.index(), self.0.generation())
    }
}

bitflags! {
    /// Per-object state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u32 {
        /// The object participates in updates and message dispatch.
        const ACTIVE = 1 << 0;
        /// The object is expected never to move. Moving it anyway is applied
        /// but reported, depending on the world's policy.
        const STATIC = 1 << 1;
    }
}

/// Initial state for [`World::create_object`](crate::World::create_object).
///
/// # Example
///
/// ```
/// use marigold_world::ObjectDesc;
/// use marigold_core::Transform;
///
/// let desc = ObjectDesc::new("turret")
///     .with_transform(Transform::from_xyz(0.0, 1.0, 0.0))
///     .static_object();
/// ```
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    /// Display name, kept for diagnostics and persistence.
    pub name: String,
    /// Optional parent to link under at creation.
    pub parent: Option<GameObjectHandle>,
    /// Local transform relative to the parent (or world origin).
    pub local_transform: Transform,
    /// Whether the object starts active.
    pub active: bool,
    /// Whether the object is marked static.
    pub is_static: bool,
}

impl ObjectDesc {
    /// Creates a desc for an active, non-static root object.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            local_transform: Transform::IDENTITY,
            active: true,
            is_static: false,
        }
    }

    /// Returns this desc with a parent to link under.
    #[must_use]
    pub fn with_parent(mut self, parent: GameObjectHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Returns this desc with a local transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.local_transform = transform;
        self
    }

    /// Returns this desc marked static.
    #[must_use]
    pub fn static_object(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Returns this desc starting inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Default for ObjectDesc {
    fn default() -> Self {
        Self::new("")
    }
}

/// A node of the world's object graph.
///
/// Read access is public; all mutation goes through [`World`](crate::World)
/// methods so the hierarchy, transform, and spatial invariants hold at every
/// external observation point.
pub struct GameObject {
    pub(crate) handle: GameObjectHandle,
    pub(crate) name: String,
    pub(crate) parent: Option<GameObjectHandle>,
    pub(crate) children: Vec<GameObjectHandle>,
    pub(crate) components: Vec<ComponentHandle>,
    pub(crate) local_transform: Transform,
    pub(crate) global_transform: Transform,
    pub(crate) flags: ObjectFlags,
    /// Accumulated local bounds from the last aggregation pass.
    pub(crate) local_bounds: BoundingVolume,
    /// Spatial category bitmask from the last aggregation pass.
    pub(crate) category_mask: u32,
    /// Always-visible latch from the last aggregation pass.
    pub(crate) always_visible: bool,
}

impl GameObject {
    pub(crate) fn new(handle: GameObjectHandle, desc: &ObjectDesc) -> Self {
        let mut flags = ObjectFlags::empty();
        if desc.active {
            flags |= ObjectFlags::ACTIVE;
        }
        if desc.is_static {
            flags |= ObjectFlags::STATIC;
        }
        Self {
            handle,
            name: desc.name.clone(),
            parent: desc.parent,
            children: Vec::new(),
            components: Vec::new(),
            local_transform: desc.local_transform,
            global_transform: desc.local_transform,
            flags,
            local_bounds: BoundingVolume::invalid(),
            category_mask: 0,
            always_visible: false,
        }
    }

    /// Returns this object's own handle.
    pub fn handle(&self) -> GameObjectHandle {
        self.handle
    }

    /// Returns the object's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent handle, if linked.
    pub fn parent(&self) -> Option<GameObjectHandle> {
        self.parent
    }

    /// Returns the ordered child handles.
    pub fn children(&self) -> &[GameObjectHandle] {
        &self.children
    }

    /// Returns the ordered component handles.
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// Returns the local transform relative to the parent.
    pub fn local_transform(&self) -> Transform {
        self.local_transform
    }

    /// Returns the cached global transform.
    ///
    /// Always equals the parent's global transform composed with this
    /// object's local transform.
    pub fn global_transform(&self) -> Transform {
        self.global_transform
    }

    /// Returns whether the object is active.
    pub fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE)
    }

    /// Returns whether the object is marked static.
    pub fn is_static(&self) -> bool {
        self.flags.contains(ObjectFlags::STATIC)
    }

    /// Returns the accumulated local bounds from the last bounds pass.
    pub fn local_bounds(&self) -> BoundingVolume {
        self.local_bounds
    }

    /// Returns the spatial category bitmask from the last bounds pass.
    pub fn spatial_category_mask(&self) -> u32 {
        self.category_mask
    }

    /// Returns whether the always-visible latch was set in the last bounds pass.
    pub fn is_always_visible(&self) -> bool {
        self.always_visible
    }
}

/// Stable slot storage for game objects, indexed by handle.
pub(crate) struct ObjectStorage {
    registry: HandleRegistry,
    slots: Vec<Option<GameObject>>,
}

impl ObjectStorage {
    pub fn new() -> Self {
        Self {
            registry: HandleRegistry::new(),
            slots: Vec::new(),
        }
    }

    /// Creates an object from a desc. Parent validity is the caller's
    /// responsibility; the new object is not yet linked into the parent's
    /// child list.
    pub fn create(&mut self, desc: &ObjectDesc) -> GameObjectHandle {
        let handle = GameObjectHandle(self.registry.create_self_indexed());
        let idx = handle.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(GameObject::new(handle, desc));
        handle
    }

    pub fn get(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        let idx = self.registry.resolve(handle.0)?;
        self.slots[idx as usize].as_ref()
    }

    pub fn get_mut(&mut self, handle: GameObjectHandle) -> Option<&mut GameObject> {
        let idx = self.registry.resolve(handle.0)?;
        self.slots[idx as usize].as_mut()
    }

    pub fn is_alive(&self, handle: GameObjectHandle) -> bool {
        self.registry.is_alive(handle.0)
    }

    /// Frees the object's slot and returns its final state.
    pub fn destroy(&mut self, handle: GameObjectHandle) -> Option<GameObject> {
        let idx = self.registry.destroy(handle.0)?;
        self.slots[idx as usize].take()
    }

    /// Reconstructs the live handle occupying a slot index.
    pub fn handle_at(&self, slot_index: u32) -> Option<GameObjectHandle> {
        self.registry.handle_at(slot_index).map(GameObjectHandle)
    }

    pub fn len(&self) -> u32 {
        self.registry.len()
    }

    /// Iterates over live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }
}
