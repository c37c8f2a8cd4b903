//! Error taxonomy for structural world operations.
//!
//! Structural API calls return `Result<_, WorldError>`. Message dispatch
//! failures are not errors: sending to a dead target is a silent no-op, and
//! "no component handled it" is normal control flow. Budget exhaustion during
//! component initialization and moves of static objects are logged
//! diagnostics, not errors.

use thiserror::Error;

/// Errors returned by structural world operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The referenced object or component no longer exists (stale generation
    /// or freed slot). Callers must treat the handle as dead.
    #[error("stale or destroyed handle")]
    InvalidHandle,

    /// A structural precondition on the owning object was violated. The
    /// operation was rejected without partial mutation.
    #[error("invalid owner object")]
    InvalidOwner,

    /// The requested reparent would make an object its own ancestor. The
    /// hierarchy is left unchanged.
    #[error("reparent would create a cycle")]
    CyclicHierarchy,
}
