//! Scoped worker pool for per-manager update batches.
//!
//! Component-type update batches that declare no overlapping data
//! dependencies run concurrently inside a scope; everything spawned is
//! guaranteed to finish before the scope returns, so borrowed manager
//! storage never outlives the batch.

/// A scoped worker pool.
///
/// # Example
///
/// ```
/// use marigold_world::ThreadPool;
///
/// let pool = ThreadPool::new(4);
/// let mut results = vec![0u32; 4];
/// pool.scope(|s| {
///     for (i, slot) in results.iter_mut().enumerate() {
///         s.spawn(move || *slot = (i as u32) * 10);
///     }
/// });
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
pub struct ThreadPool {
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a pool with the given worker count (minimum 1).
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Creates a pool sized to the available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// Returns the configured worker count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Runs tasks within a scope; all spawned tasks complete before this
    /// returns. Tasks may borrow from the enclosing environment.
    pub fn scope<'env, F>(&self, f: F)
    where
        F: for<'scope> FnOnce(&Scope<'scope, 'env>),
    {
        std::thread::scope(|s| {
            let scope = Scope { inner: s };
            f(&scope);
        });
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

/// Spawn surface handed to the [`ThreadPool::scope`] closure.
pub struct Scope<'scope, 'env: 'scope> {
    inner: &'scope std::thread::Scope<'scope, 'env>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Spawns a task within this scope.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.inner.spawn(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn all_tasks_complete_before_return() {
        let pool = ThreadPool::new(4);
        let counter = AtomicU32::new(0);
        pool.scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn tasks_borrow_environment() {
        let pool = ThreadPool::new(2);
        let mut value = 0u32;
        pool.scope(|s| {
            s.spawn(|| value = 42);
        });
        assert_eq!(value, 42);
    }

    #[test]
    fn worker_count_clamped() {
        assert_eq!(ThreadPool::new(0).num_threads(), 1);
        assert!(ThreadPool::default_threads().num_threads() >= 1);
    }
}
