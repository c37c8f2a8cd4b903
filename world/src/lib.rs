//! # marigold-world
//!
//! The entity/component world core of the marigold engine: a live object
//! graph with component composition, typed message dispatch, hierarchical
//! transform propagation, spatial bounds aggregation, and deferred cancelable
//! deletion, driven by a phased per-frame tick.
//!
//! ## Core types
//!
//! - [`World`] — exclusive owner of all objects, managers, and queues
//! - [`GameObjectHandle`] / [`ComponentHandle`] — generation-checked
//!   references; stale handles are always detectably invalid
//! - [`Component`] — capability-hook trait component types implement
//! - [`ComponentManager`] — per-type block storage (compact or stable)
//! - [`Message`] / [`MessageKind`] — typed dispatch with an
//!   unhandled-fallback path and optional per-object restriction
//! - [`SpatialIndex`] / [`SpatialCategories`] — committed bounds for culling
//!   and queries
//! - [`WorldListener`] — world-external message sink reached through the
//!   built-in forwarding component
//!
//! ## Tick
//!
//! [`World::update`] runs the phases in a fixed order: time-boxed component
//! initialization, per-type update batches (parallel where safe), deferred
//! message processing, transform sync, dirty-set bounds recompute, and
//! deletion processing. Structural mutations from component hooks are queued
//! and applied at sync points between phases.
//!
//! ## Persistence
//!
//! [`save_world`] / [`load_world`] round-trip the object graph and component
//! payloads through a stream; handles are re-minted on load.

pub mod components;

mod commands;
mod component;
mod deletion;
mod error;
mod handle;
mod listener;
mod manager;
mod message;
mod object;
mod resource;
mod serialize;
mod spatial;
mod thread_pool;
mod world;

pub use component::{Component, ComponentCtx, ComponentHandle, ComponentTypeId, StorageKind};
pub use deletion::{DeletionOutcome, DeletionRequest};
pub use error::WorldError;
pub use handle::{Handle, HandleRegistry};
pub use listener::WorldListener;
pub use manager::ComponentManager;
pub use message::{
    ChildChange, ComponentChange, CustomMessage, Message, MessageKind, ParentChange,
    RenderDataCollector, RenderDataEntry,
};
pub use object::{GameObject, GameObjectHandle, ObjectDesc, ObjectFlags};
pub use resource::WorldResource;
pub use serialize::{SnapshotError, load_world, save_world};
pub use spatial::{
    BoundsAccumulator, SpatialCategories, SpatialCategory, SpatialEntry, SpatialIndex,
};
pub use thread_pool::ThreadPool;
pub use world::{World, WorldDesc};

pub use marigold_core::{BoundingVolume, Transform};
