//! Spatial data: categories, bounds aggregation, and the spatial index.
//!
//! Components contribute bounding volumes to their owning object through a
//! [`BoundsAccumulator`] carried by the `UpdateLocalBounds` message. The
//! committed result (world-space bounds + category bitmask + always-visible
//! latch) lands in the [`SpatialIndex`], which culling and query collaborators
//! consume.
//!
//! Categories are registered on a per-world [`SpatialCategories`] table
//! rather than a process-wide singleton, so worlds (and tests) stay
//! independent.

use std::collections::HashMap;

use glam::Vec3;
use marigold_core::BoundingVolume;
use serde::{Deserialize, Serialize};

use crate::object::GameObjectHandle;

/// A registered spatial data category.
///
/// Categories partition spatial entries for queries (render, occlusion, ...).
/// At most 32 categories can exist per world so a full set fits a `u32`
/// bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialCategory(u16);

impl SpatialCategory {
    /// Returns the category's registration index.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Returns the single-bit mask for this category.
    pub fn bitmask(&self) -> u32 {
        1 << self.0
    }
}

/// Per-world registry of spatial data categories.
///
/// Two categories commonly used by render collaborators are registered up
/// front: [`SpatialCategories::RENDER_STATIC`] and
/// [`SpatialCategories::RENDER_DYNAMIC`].
pub struct SpatialCategories {
    names: Vec<String>,
}

impl SpatialCategories {
    /// Objects that rarely move; render culling input.
    pub const RENDER_STATIC: SpatialCategory = SpatialCategory(0);
    /// Objects expected to move often; render culling input.
    pub const RENDER_DYNAMIC: SpatialCategory = SpatialCategory(1);

    /// Maximum number of categories per world (bitmask width).
    pub const MAX_CATEGORIES: usize = 32;

    pub(crate) fn new() -> Self {
        let mut categories = Self { names: Vec::new() };
        categories.register("RenderStatic");
        categories.register("RenderDynamic");
        categories
    }

    /// Registers a category under the given name, or returns the existing
    /// category if the name was registered before.
    ///
    /// # Panics
    ///
    /// Panics when a new name would exceed [`Self::MAX_CATEGORIES`].
    pub fn register(&mut self, name: &str) -> SpatialCategory {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        assert!(
            self.names.len() < Self::MAX_CATEGORIES,
            "too many spatial categories (max {})",
            Self::MAX_CATEGORIES
        );
        self.names.push(name.to_string());
        SpatialCategory((self.names.len() - 1) as u16)
    }

    /// Returns the category registered under `name`, if any.
    pub fn find(&self, name: &str) -> Option<SpatialCategory> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| SpatialCategory(i as u16))
    }

    /// Returns the name of a registered category.
    pub fn name_of(&self, category: SpatialCategory) -> Option<&str> {
        self.names.get(category.0 as usize).map(|s| s.as_str())
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Accumulates per-component bounds contributions for one object.
///
/// Carried by the `UpdateLocalBounds` message during a bounds-aggregation
/// pass. Contributions union into a running total; the always-visible flag is
/// a one-way latch for the remainder of the pass.
#[derive(Debug)]
pub struct BoundsAccumulator {
    bounds: BoundingVolume,
    category_mask: u32,
    always_visible: bool,
}

impl BoundsAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            bounds: BoundingVolume::invalid(),
            category_mask: 0,
            always_visible: false,
        }
    }

    /// Unions a local bounding volume into the accumulated total and ORs the
    /// category into the bitmask.
    pub fn add_bounds(&mut self, volume: &BoundingVolume, category: SpatialCategory) {
        self.bounds.expand_to_include(volume);
        self.category_mask |= category.bitmask();
    }

    /// Marks the object as always visible for the given category.
    ///
    /// Latches true: nothing within the same aggregation pass can unset it,
    /// since the accumulator gathers contributions from multiple components.
    pub fn set_always_visible(&mut self, category: SpatialCategory) {
        self.always_visible = true;
        self.category_mask |= category.bitmask();
    }

    /// Returns the accumulated local bounds so far.
    pub fn bounds(&self) -> BoundingVolume {
        self.bounds
    }

    /// Returns the accumulated category bitmask so far.
    pub fn category_mask(&self) -> u32 {
        self.category_mask
    }

    /// Returns whether the always-visible latch has been set.
    pub fn is_always_visible(&self) -> bool {
        self.always_visible
    }

    /// Returns whether any component contributed anything.
    pub fn has_content(&self) -> bool {
        self.bounds.is_valid() || self.always_visible || self.category_mask != 0
    }
}

/// One committed spatial entry.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    /// World-space bounds of the object.
    pub world_bounds: BoundingVolume,
    /// Bitmask of the categories this entry belongs to.
    pub category_mask: u32,
    /// Entries with this flag match every overlap query of their categories.
    pub always_visible: bool,
}

/// The world's spatial index: committed bounds per object, queryable by
/// category and by sphere overlap.
///
/// The index only ever holds the latest committed pass per object; the tick
/// driver recomputes entries from the dirty set, not every tick.
pub struct SpatialIndex {
    entries: HashMap<GameObjectHandle, SpatialEntry>,
}

impl SpatialIndex {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn commit(&mut self, object: GameObjectHandle, entry: SpatialEntry) {
        self.entries.insert(object, entry);
    }

    pub(crate) fn remove(&mut self, object: GameObjectHandle) {
        self.entries.remove(&object);
    }

    /// Returns the committed entry for an object, if any.
    pub fn entry(&self, object: GameObjectHandle) -> Option<&SpatialEntry> {
        self.entries.get(&object)
    }

    /// Returns the number of committed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all committed entries.
    pub fn iter(&self) -> impl Iterator<Item = (GameObjectHandle, &SpatialEntry)> {
        self.entries.iter().map(|(h, e)| (*h, e))
    }

    /// Iterates over objects whose category bitmask intersects `mask`.
    pub fn query_category(
        &self,
        mask: u32,
    ) -> impl Iterator<Item = (GameObjectHandle, &SpatialEntry)> {
        self.entries
            .iter()
            .filter(move |(_, e)| e.category_mask & mask != 0)
            .map(|(h, e)| (*h, e))
    }

    /// Collects objects of the given categories overlapping a sphere.
    ///
    /// Always-visible entries of a matching category are returned regardless
    /// of the overlap test.
    pub fn query_sphere(&self, center: Vec3, radius: f32, mask: u32) -> Vec<GameObjectHandle> {
        self.entries
            .iter()
            .filter(|(_, e)| e.category_mask & mask != 0)
            .filter(|(_, e)| e.always_visible || e.world_bounds.overlaps_sphere(center, radius))
            .map(|(h, _)| *h)
            .collect()
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
    fn default_categories_registered() {
        let cats = SpatialCategories::new();
        assert_eq!(cats.find("RenderStatic"), Some(SpatialCategories::RENDER_STATIC));
        assert_eq!(cats.find("RenderDynamic"), Some(SpatialCategories::RENDER_DYNAMIC));
    }

    #[test]
    fn register_is_idempotent() {
        let mut cats = SpatialCategories::new();
        let a = cats.register("Occlusion");
        let b = cats.register("Occlusion");
        assert_eq!(a, b);
        assert_eq!(cats.name_of(a), Some("Occlusion"));
    }

    #[test]
    fn category_bitmask_is_single_bit() {
        let mut cats = SpatialCategories::new();
        let c = cats.register("Audio");
        assert_eq!(c.bitmask().count_ones(), 1);
        assert_eq!(c.bitmask(), 1 << c.value());
    }

    #[test]
    fn accumulator_unions_bounds() {
        let mut acc = BoundsAccumulator::new();
        assert!(!acc.has_content());

        acc.add_bounds(
            &BoundingVolume::from_sphere(Vec3::ZERO, 1.0),
            SpatialCategories::RENDER_STATIC,
        );
        acc.add_bounds(
            &BoundingVolume::from_sphere(Vec3::new(4.0, 0.0, 0.0), 1.0),
            SpatialCategories::RENDER_DYNAMIC,
        );

        assert!(acc.bounds().contains_point(Vec3::new(-0.9, 0.0, 0.0)));
        assert!(acc.bounds().contains_point(Vec3::new(4.9, 0.0, 0.0)));
        assert_eq!(
            acc.category_mask(),
            SpatialCategories::RENDER_STATIC.bitmask()
                | SpatialCategories::RENDER_DYNAMIC.bitmask()
        );
    }

    #[test]
    fn always_visible_latches() {
        let mut acc = BoundsAccumulator::new();
        acc.set_always_visible(SpatialCategories::RENDER_DYNAMIC);
        assert!(acc.is_always_visible());

        // Later contributions in the same pass must not unset the latch.
        acc.add_bounds(
            &BoundingVolume::from_sphere(Vec3::ZERO, 1.0),
            SpatialCategories::RENDER_STATIC,
        );
        assert!(acc.is_always_visible());
    }

    #[test]
    fn index_query_by_category() {
        let mut index = SpatialIndex::new();
        index.commit(
            object(0),
            SpatialEntry {
                world_bounds: BoundingVolume::from_sphere(Vec3::ZERO, 1.0),
                category_mask: SpatialCategories::RENDER_STATIC.bitmask(),
                always_visible: false,
            },
        );
        index.commit(
            object(1),
            SpatialEntry {
                world_bounds: BoundingVolume::from_sphere(Vec3::ZERO, 1.0),
                category_mask: SpatialCategories::RENDER_DYNAMIC.bitmask(),
                always_visible: false,
            },
        );

        let hits: Vec<_> = index
            .query_category(SpatialCategories::RENDER_DYNAMIC.bitmask())
            .map(|(h, _)| h)
            .collect();
        assert_eq!(hits, vec![object(1)]);
    }

    #[test]
    fn sphere_query_respects_bounds() {
        let mut index = SpatialIndex::new();
        index.commit(
            object(0),
            SpatialEntry {
                world_bounds: BoundingVolume::from_sphere(Vec3::new(10.0, 0.0, 0.0), 1.0),
                category_mask: SpatialCategories::RENDER_STATIC.bitmask(),
                always_visible: false,
            },
        );

        let mask = SpatialCategories::RENDER_STATIC.bitmask();
        assert!(index.query_sphere(Vec3::ZERO, 1.0, mask).is_empty());
        assert_eq!(
            index.query_sphere(Vec3::new(9.0, 0.0, 0.0), 1.0, mask),
            vec![object(0)]
        );
    }

    #[test]
    fn sphere_query_includes_always_visible() {
        let mut index = SpatialIndex::new();
        index.commit(
            object(0),
            SpatialEntry {
                world_bounds: BoundingVolume::from_sphere(Vec3::new(1000.0, 0.0, 0.0), 1.0),
                category_mask: SpatialCategories::RENDER_DYNAMIC.bitmask(),
                always_visible: true,
            },
        );

        let hits = index.query_sphere(
            Vec3::ZERO,
            1.0,
            SpatialCategories::RENDER_DYNAMIC.bitmask(),
        );
        assert_eq!(hits, vec![object(0)]);

        // Category still filters, even for always-visible entries.
        assert!(index
            .query_sphere(Vec3::ZERO, 1.0, SpatialCategories::RENDER_STATIC.bitmask())
            .is_empty());
    }

    #[test]
    fn remove_drops_entry() {
        let mut index = SpatialIndex::new();
        index.commit(
            object(3),
            SpatialEntry {
                world_bounds: BoundingVolume::from_point(Vec3::ZERO),
                category_mask: 1,
                always_visible: false,
            },
        );
        index.remove(object(3));
        assert!(index.entry(object(3)).is_none());
        assert!(index.is_empty());
    }
}
