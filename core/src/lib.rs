//! # marigold-core
//!
//! Math foundation shared by the marigold engine crates.
//!
//! - [`math::Transform`] — translation/rotation/scale transform with
//!   hierarchical composition
//! - [`bounds::BoundingVolume`] — combined box + sphere bounding volume used
//!   for spatial data aggregation

pub mod bounds;
pub mod math;

pub use bounds::BoundingVolume;
pub use math::Transform;
