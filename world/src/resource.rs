//! Narrow interface to resource collaborators.
//!
//! Resources (curves, gradients, collections of assets) are owned and
//! implemented outside the world core. The core only ever (a) triggers
//! preloading and (b) reads evaluated values by handle; it never inspects
//! resource internals.

/// A loadable, evaluable resource handle.
pub trait WorldResource: Send + Sync {
    /// Begins loading the resource. Idempotent.
    fn load(&self);

    /// Returns whether the resource is loaded and usable.
    fn is_valid(&self) -> bool;

    /// Samples the resource at `t` (curve/gradient-style evaluation).
    /// Implementations define the domain of `t`.
    fn evaluate(&self, t: f32) -> f32;
}
