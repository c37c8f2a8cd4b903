//! Deferred, cancelable object deletion.
//!
//! Deletion is a two-step protocol: a request is queued (from any context),
//! then processed during the tick's deletion phase. Processing sends a
//! `DeleteObject` message synchronously to the target so any component can
//! set the cancel flag (an in-progress animation finishing, for instance).
//! An uncancelled request commits: the subtree is destroyed, and with
//! `delete_empty_parents` the now-empty ancestor chain is cleaned up too.
//!
//! State machine per request: `Requested -> {Cancelled | Committed}`. Both
//! outcomes are terminal; a cancelled deletion must be re-requested.

use parking_lot::Mutex;

use crate::object::GameObjectHandle;

/// A queued deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionRequest {
    /// Object to delete (with its subtree).
    pub target: GameObjectHandle,
    /// Also delete ancestors left with zero children and zero components,
    /// stopping at the first ancestor that still has content.
    pub delete_empty_parents: bool,
}

/// Terminal outcome of one processed deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The object (and subtree) was destroyed.
    Committed,
    /// A component vetoed the deletion this tick.
    Cancelled,
    /// The target was already dead when the request was processed.
    TargetGone,
}

/// Lock-protected queue of pending deletion requests.
///
/// Requests are safe to enqueue from worker jobs and are drained
/// single-threaded during the deletion-processing phase.
pub(crate) struct DeletionQueue {
    inner: Mutex<Vec<DeletionRequest>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn request(&self, target: GameObjectHandle, delete_empty_parents: bool) {
        self.inner.lock().push(DeletionRequest {
            target,
            delete_empty_parents,
        });
    }

    pub fn drain(&self) -> Vec<DeletionRequest> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
