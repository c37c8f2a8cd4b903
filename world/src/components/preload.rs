//! Resource-collection preloading.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentCtx};
use crate::resource::WorldResource;

/// Triggers preloading of a set of resources when initialized.
///
/// The world never inspects the resources; it only calls `load` on
/// initialization and exposes validity. Resource handles are runtime wiring
/// and are not persisted — a loaded world starts with an empty collection
/// that gameplay code re-fills.
#[derive(Default, Serialize, Deserialize)]
pub struct PreloadCollectionComponent {
    #[serde(skip)]
    resources: Vec<Arc<dyn WorldResource>>,
}

impl PreloadCollectionComponent {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource to preload.
    pub fn push(&mut self, resource: Arc<dyn WorldResource>) {
        self.resources.push(resource);
    }

    /// Returns the number of collected resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns whether every collected resource reports valid.
    pub fn all_valid(&self) -> bool {
        self.resources.iter().all(|r| r.is_valid())
    }
}

impl std::fmt::Debug for PreloadCollectionComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadCollectionComponent")
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl Component for PreloadCollectionComponent {
    const TYPE_NAME: &'static str = "PreloadCollection";

    fn initialize(&mut self, _ctx: &ComponentCtx<'_>) {
        for resource in &self.resources {
            resource.load();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectDesc;
    use crate::world::{World, WorldDesc};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeResource {
        loaded: AtomicBool,
    }

    impl WorldResource for FakeResource {
        fn load(&self) {
            self.loaded.store(true, Ordering::SeqCst);
        }

        fn is_valid(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn evaluate(&self, t: f32) -> f32 {
            t * 2.0
        }
    }

    #[test]
    fn resources_load_on_initialization() {
        let mut world = World::new(WorldDesc::new("test"));
        world.register_component::<PreloadCollectionComponent>();

        let resource = Arc::new(FakeResource::default());
        let mut collection = PreloadCollectionComponent::new();
        collection.push(resource.clone());
        assert!(!collection.all_valid());

        let obj = world.create_object(&ObjectDesc::new("loader")).unwrap();
        let ch = world.add_component(obj, collection).unwrap();

        // Not loaded until the initialization phase runs.
        assert!(!resource.is_valid());
        world.update(0.016);
        assert!(resource.is_valid());
        assert!(world
            .component::<PreloadCollectionComponent>(ch)
            .unwrap()
            .all_valid());
    }

    #[test]
    fn evaluate_reads_through_handle() {
        let resource = FakeResource::default();
        resource.load();
        assert_eq!(resource.evaluate(2.0), 4.0);
    }
}
