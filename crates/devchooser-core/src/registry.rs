//! Per-object dispatch table storage.
//!
//! Every dispatchable Vulkan object carries a pointer to the loader's dispatch
//! table in its first word. Objects created through the same chain position
//! share that pointer, which makes it a stable key for finding the next layer's
//! function table from inside any intercepted call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Identity of a dispatchable object: the first pointer-sized word it holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey(usize);

impl DispatchKey {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Read the key out of a dispatchable handle.
    ///
    /// Returns `None` for a null handle.
    ///
    /// # Safety
    /// A non-null `handle` must point to a live dispatchable object.
    pub unsafe fn from_dispatchable(handle: *const usize) -> Option<Self> {
        if handle.is_null() {
            return None;
        }
        // SAFETY: the caller guarantees `handle` points at a dispatchable object.
        Some(Self(unsafe { *handle }))
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DispatchKey({:#x})", self.0)
    }
}

/// One registration: the table plus the epoch it was stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered<T> {
    pub epoch: u64,
    pub table: T,
}

/// Thread-safe map from [`DispatchKey`] to an owned dispatch table.
///
/// Lookups hand out copies; the registry is the only owner of the stored value.
pub struct DispatchRegistry<T> {
    tables: DashMap<DispatchKey, Registered<T>>,
    next_epoch: AtomicU64,
}

impl<T: Copy> DispatchRegistry<T> {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Store `table` for `key`, replacing any previous registration.
    /// Returns the epoch of the new registration.
    pub fn register(&self, key: DispatchKey, table: T) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.tables.insert(key, Registered { epoch, table });
        epoch
    }

    pub fn lookup(&self, key: DispatchKey) -> Option<T> {
        self.tables.get(&key).map(|entry| entry.table)
    }

    pub fn lookup_entry(&self, key: DispatchKey) -> Option<Registered<T>> {
        self.tables.get(&key).map(|entry| *entry)
    }

    pub fn erase(&self, key: DispatchKey) -> Option<T> {
        self.tables.remove(&key).map(|(_, entry)| entry.table)
    }

    /// Remove the registration for `key` only if it is still the one stored
    /// under `epoch`. A newer registration that reused the key is left alone.
    pub fn erase_epoch(&self, key: DispatchKey, epoch: u64) -> bool {
        self.tables
            .remove_if(&key, |_, entry| entry.epoch == epoch)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<T: Copy> Default for DispatchRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
