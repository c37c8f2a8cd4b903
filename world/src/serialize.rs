//! World persistence: snapshot records and stream save/load.
//!
//! The on-stream layout is a [`WorldSnapshot`]: the category table (by name,
//! in registration order), then one record per object in parents-before-
//! children order. Parent links are stored as indices into the record list;
//! component payloads are stored as `(type name, bytes)` pairs encoded by
//! each manager.
//!
//! Handles are never persisted. Loading re-mints fresh handles, so a loaded
//! graph is structurally equivalent to the saved one while all raw handle
//! values differ, the same contract callers already live with across
//! sessions.

use std::collections::HashMap;
use std::io::{Read, Write};

use marigold_core::Transform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::WorldError;
use crate::object::{GameObjectHandle, ObjectDesc};
use crate::world::World;

/// Errors produced by snapshot save/load.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Underlying bincode encode/decode failure.
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    /// A component handle pointed at a dead component during save.
    #[error("cannot serialize a dead component")]
    DeadComponent,

    /// A stored component type is not registered in the loading world.
    #[error("component type '{0}' is not registered in the loading world")]
    UnknownComponentType(String),

    /// A stored parent index does not precede the object referencing it.
    #[error("object record {child} references invalid parent index {parent}")]
    InvalidParentIndex { child: usize, parent: u32 },

    /// The loading world's category table conflicts with the stored one.
    #[error("spatial category '{name}' maps to index {found}, snapshot expects {expected}")]
    CategoryMismatch {
        name: String,
        expected: u16,
        found: u16,
    },

    /// A structural operation failed while rebuilding the graph.
    #[error("structural error while loading: {0}")]
    Structural(#[from] WorldError),
}

#[derive(Serialize, Deserialize)]
struct ComponentRecord {
    type_name: String,
    payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct ObjectRecord {
    name: String,
    /// Index of the parent's record; records are ordered parents-first.
    parent: Option<u32>,
    local_transform: Transform,
    active: bool,
    is_static: bool,
    components: Vec<ComponentRecord>,
}

#[derive(Serialize, Deserialize)]
struct WorldSnapshot {
    /// Category names in registration order.
    categories: Vec<String>,
    objects: Vec<ObjectRecord>,
}

/// Serializes the world's object graph and component payloads into `writer`.
pub fn save_world<W: Write>(world: &World, writer: W) -> Result<(), SnapshotError> {
    let mut records = Vec::new();
    let mut record_index: HashMap<GameObjectHandle, u32> = HashMap::new();

    // Depth-first from roots so every parent precedes its children.
    let roots: Vec<GameObjectHandle> = world
        .iter_objects()
        .filter(|o| o.parent().is_none())
        .map(|o| o.handle())
        .collect();

    let mut stack: Vec<GameObjectHandle> = roots.into_iter().rev().collect();
    while let Some(handle) = stack.pop() {
        let obj = match world.object(handle) {
            Some(obj) => obj,
            None => continue,
        };

        let mut components = Vec::with_capacity(obj.components().len());
        for &ch in obj.components() {
            let (type_name, payload) = world.serialize_component_bytes(ch)?;
            components.push(ComponentRecord { type_name, payload });
        }

        record_index.insert(handle, records.len() as u32);
        records.push(ObjectRecord {
            name: obj.name().to_string(),
            parent: obj.parent().and_then(|p| record_index.get(&p).copied()),
            local_transform: obj.local_transform(),
            active: obj.is_active(),
            is_static: obj.is_static(),
            components,
        });

        for &child in obj.children().iter().rev() {
            stack.push(child);
        }
    }

    let snapshot = WorldSnapshot {
        categories: world.categories().names().to_vec(),
        objects: records,
    };
    bincode::serialize_into(writer, &snapshot)?;
    Ok(())
}

/// Rebuilds a saved object graph inside `world`, which must have all stored
/// component types registered.
///
/// Handles are re-minted; the returned vector holds the new handles in
/// record order. Freshly created components initialize during the next
/// tick's initialization phase, and bounds recompute from the dirty set.
pub fn load_world<R: Read>(
    world: &mut World,
    reader: R,
) -> Result<Vec<GameObjectHandle>, SnapshotError> {
    let snapshot: WorldSnapshot = bincode::deserialize_from(reader)?;

    for (expected, name) in snapshot.categories.iter().enumerate() {
        let category = world.categories_mut().register(name);
        if category.value() as usize != expected {
            return Err(SnapshotError::CategoryMismatch {
                name: name.clone(),
                expected: expected as u16,
                found: category.value(),
            });
        }
    }

    let mut created: Vec<GameObjectHandle> = Vec::with_capacity(snapshot.objects.len());
    for (i, record) in snapshot.objects.iter().enumerate() {
        let parent = match record.parent {
            Some(p) => Some(*created.get(p as usize).ok_or(
                SnapshotError::InvalidParentIndex {
                    child: i,
                    parent: p,
                },
            )?),
            None => None,
        };

        let mut desc = ObjectDesc::new(record.name.clone())
            .with_transform(record.local_transform);
        desc.parent = parent;
        desc.active = record.active;
        desc.is_static = record.is_static;

        let handle = world.create_object(&desc)?;
        for comp in &record.components {
            world.attach_component_bytes(handle, &comp.type_name, &comp.payload)?;
        }
        created.push(handle);
    }

    Ok(created)
}
