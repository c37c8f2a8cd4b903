//! Deferred structural mutations applied at sync points.
//!
//! Structural changes (create/destroy objects, add/remove components,
//! reparent) are not safe while storages are being iterated, and component
//! hooks only see a narrow context rather than `&mut World`. Such contexts queue
//! closures into the [`CommandQueue`] instead; the tick driver applies them
//! at defined sync points between phases, where exclusive world access is
//! available.

use parking_lot::Mutex;

use crate::world::World;

type Command = Box<dyn FnOnce(&mut World) + Send>;

/// A thread-safe buffer of deferred world mutations.
pub(crate) struct CommandQueue {
    inner: Mutex<Vec<Command>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Queues a closure to run with `&mut World` at the next sync point.
    pub fn push(&self, command: impl FnOnce(&mut World) + Send + 'static) {
        self.inner.lock().push(Box::new(command));
    }

    /// Drains all queued commands.
    pub fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_queue() {
        let queue = CommandQueue::new();
        queue.push(|_world| {});
        queue.push(|_world| {});
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert_eq!(queue.len(), 0);
    }
}
