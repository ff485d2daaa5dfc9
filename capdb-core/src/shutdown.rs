//! Process-wide shutdown hooks
//!
//! The store registers a hook here so the header survives orderly process
//! termination. Embedders call [`run_hooks`] from their exit path (main
//! teardown or a signal handler); hooks are removed again on explicit close.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Callback invoked at process termination
pub type ShutdownHook = Box<dyn Fn() + Send + Sync>;

/// Handle returned by [`register`], used to deregister the hook later
pub struct HookHandle {
    id: u64,
}

#[derive(Default)]
struct Hooks {
    next_id: u64,
    hooks: BTreeMap<u64, ShutdownHook>,
}

/// A registry of shutdown hooks
///
/// Most callers use the process-wide registry through the module-level
/// functions; separate instances exist so tests stay isolated.
#[derive(Default)]
pub struct ShutdownRegistry {
    inner: Mutex<Hooks>,
}

impl ShutdownRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, returning a handle for deregistration
    pub fn register(&self, hook: ShutdownHook) -> HookHandle {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.hooks.insert(id, hook);
        HookHandle { id }
    }

    /// Remove a hook; safe to call for a hook that was already removed
    pub fn deregister(&self, handle: &HookHandle) {
        self.inner.lock().hooks.remove(&handle.id);
    }

    /// Run and drain every registered hook, in registration order
    pub fn run_hooks(&self) {
        let hooks: Vec<ShutdownHook> = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.hooks).into_values().collect()
        };
        for hook in hooks {
            hook();
        }
    }

    /// Number of currently registered hooks
    pub fn len(&self) -> usize {
        self.inner.lock().hooks.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: OnceLock<ShutdownRegistry> = OnceLock::new();

/// The process-wide registry
pub fn global() -> &'static ShutdownRegistry {
    GLOBAL.get_or_init(ShutdownRegistry::new)
}

/// Register a hook with the process-wide registry
pub fn register(hook: ShutdownHook) -> HookHandle {
    global().register(hook)
}

/// Deregister a hook from the process-wide registry
pub fn deregister(handle: &HookHandle) {
    global().deregister(handle)
}

/// Run all process-wide hooks; called by the embedder at termination
pub fn run_hooks() {
    global().run_hooks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_register_and_run() {
        let registry = ShutdownRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let hook_count = Arc::clone(&count);
        registry.register(Box::new(move || {
            hook_count.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(registry.len(), 1);

        registry.run_hooks();
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(registry.is_empty());

        // hooks run once; a second pass has nothing left
        registry.run_hooks();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = ShutdownRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let hook_count = Arc::clone(&count);
        let handle = registry.register(Box::new(move || {
            hook_count.fetch_add(1, Ordering::Relaxed);
        }));

        registry.deregister(&handle);
        registry.deregister(&handle);
        assert!(registry.is_empty());

        registry.run_hooks();
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
