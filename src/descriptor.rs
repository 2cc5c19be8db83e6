use std::collections::HashMap;
use std::sync::Mutex;

/// Allocates opaque integer handles for an open resource keyed by `K`,
/// tracks a reference count per handle, and reports when a release drops
/// the count to zero.
///
/// Two independent instances back the FUSE surface: one keyed by blob
/// object id, one keyed by an open passthrough file. A single mutex guards
/// the handle source and the map together, matching the spec's single-lock
/// discipline per manager.
pub struct DescriptorManager<K> {
    state: Mutex<State<K>>,
}

struct State<K> {
    next: u64,
    entries: HashMap<u64, (K, u32)>,
}

impl<K: Clone> DescriptorManager<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next: 1,
                entries: HashMap::new(),
            }),
        }
    }

    /// Allocate a new handle bound to `key` with refcount 1.
    pub fn allocate(&self, key: K) -> u64 {
        let mut state = self.state.lock().expect("descriptor manager poisoned");
        let handle = state.next;
        state.next += 1;
        state.entries.insert(handle, (key, 1));
        handle
    }

    /// The resource key bound to `handle`, if it is still open.
    pub fn lookup(&self, handle: u64) -> Option<K> {
        let state = self.state.lock().expect("descriptor manager poisoned");
        state.entries.get(&handle).map(|(key, _)| key.clone())
    }

    /// Decrement `handle`'s refcount (floored at 0). Returns the bound key
    /// and whether this release was the final one (refcount reached 0, the
    /// mapping was removed). Returns `None` if `handle` is unknown.
    pub fn release(&self, handle: u64) -> Option<(K, bool)> {
        let mut state = self.state.lock().expect("descriptor manager poisoned");
        let reached_zero = match state.entries.get_mut(&handle) {
            Some((_, count)) => {
                if *count > 0 {
                    *count -= 1;
                }
                *count == 0
            }
            None => return None,
        };
        if reached_zero {
            state.entries.remove(&handle).map(|(key, _)| (key, true))
        } else {
            state.entries.get(&handle).map(|(key, _)| (key.clone(), false))
        }
    }
}

impl<K: Clone> Default for DescriptorManager<K> {
    fn default() -> Self {
        Self::new()
    }
}
