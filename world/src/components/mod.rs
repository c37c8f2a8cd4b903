//! Built-in components.
//!
//! - [`EventForwarderComponent`] — routes otherwise-unhandled messages to the
//!   world's installed listener
//! - [`ShapeComponent`] — contributes a primitive shape to bounds aggregation
//!   and render-data gathering
//! - [`DeletionDelayComponent`] — cancels deletion of its object until a
//!   countdown elapses, then re-requests it
//! - [`PreloadCollectionComponent`] — triggers preloading of a resource
//!   collection on initialization

mod deletion_delay;
mod forwarder;
mod preload;
mod shape;

pub use deletion_delay::DeletionDelayComponent;
pub use forwarder::EventForwarderComponent;
pub use preload::PreloadCollectionComponent;
pub use shape::{Shape, ShapeComponent};
