//! LIFO teardown-hook registry (§4.8).
//!
//! Every step that provisions a resource registers a closure here; on any
//! terminal path the workflow drains the list in reverse registration
//! order. A hook failure is logged and does not stop the remaining hooks
//! from running — cleanup always makes a best effort across every
//! registered resource.

use std::sync::Mutex;

use anyhow::Result;
use tracing::warn;

pub(crate) type Hook = Box<dyn FnOnce() -> Result<()> + Send>;

#[derive(Default)]
pub struct CleanupManager {
    hooks: Mutex<Vec<Hook>>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a teardown callback. The hooks list is append-only during a
    /// run (§5); the mutex only guards concurrent appends from sibling
    /// step tasks.
    pub fn push<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.hooks.lock().expect("cleanup hooks mutex poisoned").push(Box::new(hook));
    }

    /// Appends an already-boxed hook, e.g. one collected before populate by
    /// `Workflow::add_cleanup_hook`.
    pub(crate) fn push_boxed(&self, hook: Hook) {
        self.hooks.lock().expect("cleanup hooks mutex poisoned").push(hook);
    }

    /// Runs every registered hook in reverse order, logging (never
    /// propagating) failures. Returns the number of hooks that failed.
    pub fn drain(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock().expect("cleanup hooks mutex poisoned"));
        let mut failures = 0;
        for hook in hooks.into_iter().rev() {
            if let Err(error) = hook() {
                failures += 1;
                warn!(%error, "cleanup hook failed");
            }
        }
        failures
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.hooks.lock().expect("cleanup hooks mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drains_hooks_in_reverse_order() {
        let manager = CleanupManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            manager.push(move || {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }

        let failures = manager.drain();
        assert_eq!(failures, 0);
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn a_failing_hook_does_not_block_the_rest() {
        let manager = CleanupManager::new();
        let ran = Arc::new(AtomicUsize::new(0));

        manager.push(|| anyhow::bail!("boom"));
        let ran2 = ran.clone();
        manager.push(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let failures = manager.drain();
        assert_eq!(failures, 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_runs_each_hook_exactly_once() {
        let manager = CleanupManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        manager.push(move || {
            count2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        manager.drain();
        manager.drain();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
