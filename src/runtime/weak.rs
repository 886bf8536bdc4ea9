//! Weak associative store
//!
//! Private per-object state lives here, outside the property table, keyed
//! by object identity. Entries hold only a `WeakObjectRef`, so the store is
//! never the reason an object stays alive, and nothing in it shows up
//! through `own_keys`, `enumerate_all` or name lookup.
//!
//! Reclamation is lazy: an entry whose owner has died is unreachable
//! through `get`, and is physically removed by the next sweep. Sweeps run
//! automatically every `sweep_threshold` insertions, or on demand.

use ahash::AHashMap;
use tracing::trace;

use crate::runtime::object::{ObjectRef, WeakObjectRef};

/// Default number of insertions between automatic sweeps
pub const DEFAULT_SWEEP_THRESHOLD: usize = 64;

struct Entry<T> {
    /// Keeps the identity from being reused while the entry exists
    owner: WeakObjectRef,
    payload: T,
}

/// Identity-keyed side table with non-owning keys
pub struct WeakStore<T> {
    entries: AHashMap<usize, Entry<T>>,
    /// Insertions since the last sweep
    pending: usize,
    sweep_threshold: usize,
}

impl<T> Default for WeakStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WeakStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    /// Create an empty store that sweeps every `threshold` insertions
    pub fn with_sweep_threshold(threshold: usize) -> Self {
        WeakStore {
            entries: AHashMap::new(),
            pending: 0,
            sweep_threshold: threshold.max(1),
        }
    }

    /// Associate `payload` with `owner`, replacing any previous payload
    ///
    /// Returns the previous payload.
    pub fn set(&mut self, owner: &ObjectRef, payload: T) -> Option<T> {
        self.pending += 1;
        if self.pending >= self.sweep_threshold {
            self.sweep();
        }
        let previous = self.entries.insert(
            owner.id(),
            Entry {
                owner: owner.downgrade(),
                payload,
            },
        );
        previous.map(|e| e.payload)
    }

    /// Payload for a live owner
    pub fn get(&self, owner: &ObjectRef) -> Option<&T> {
        self.entries.get(&owner.id()).map(|e| &e.payload)
    }

    /// Mutable payload for a live owner
    pub fn get_mut(&mut self, owner: &ObjectRef) -> Option<&mut T> {
        self.entries.get_mut(&owner.id()).map(|e| &mut e.payload)
    }

    /// Payload looked up through a possibly stale handle
    ///
    /// Always absent once the owner has been destroyed.
    pub fn get_weak(&self, owner: &WeakObjectRef) -> Option<&T> {
        if !owner.is_alive() {
            return None;
        }
        let entry = self.entries.get(&owner.id())?;
        entry.owner.is_alive().then_some(&entry.payload)
    }

    /// Check for a live association
    pub fn contains(&self, owner: &ObjectRef) -> bool {
        self.entries.contains_key(&owner.id())
    }

    /// Remove the association for `owner`
    pub fn remove(&mut self, owner: &ObjectRef) -> Option<T> {
        self.entries.remove(&owner.id()).map(|e| e.payload)
    }

    /// Physically drop entries whose owners are gone
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner.is_alive());
        self.pending = 0;
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, "swept dead weak store entries");
        }
        removed
    }

    /// Number of entries with a live owner
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.owner.is_alive()).count()
    }

    /// Check if no live owner has an entry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of physical entries, dead ones included
    pub fn capacity_used(&self) -> usize {
        self.entries.len()
    }
}
