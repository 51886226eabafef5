//! Handle registry for routing native callbacks to managed wrappers.
//!
//! Maps a native handle to a weak reference to the Rust object wrapping it,
//! so every callback raised for the same native object resolves to the same
//! wrapper. Entries never keep a wrapper alive: once the wrapper is dropped,
//! `resolve` reports `None` and drops the stale entry.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::{BindError, Result};
use crate::handle::NativeHandle;

pub struct HandleRegistry<T> {
    entries: HashMap<NativeHandle, Weak<T>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        HandleRegistry {
            entries: HashMap::new(),
        }
    }

    /// Map `handle` to `wrapper`.
    ///
    /// Fails with `DuplicateHandle` if the handle already belongs to a
    /// different live wrapper. Registering the same wrapper twice is a no-op
    /// and a stale entry is simply replaced.
    pub fn register(&mut self, handle: NativeHandle, wrapper: &Rc<T>) -> Result<()> {
        if handle.is_null() {
            return Err(BindError::InvalidHandle(handle));
        }
        if let Some(existing) = self.entries.get(&handle).and_then(Weak::upgrade) {
            if Rc::ptr_eq(&existing, wrapper) {
                return Ok(());
            }
            return Err(BindError::DuplicateHandle(handle));
        }
        self.entries.insert(handle, Rc::downgrade(wrapper));
        Ok(())
    }

    /// Look up the live wrapper for `handle`.
    pub fn resolve(&mut self, handle: NativeHandle) -> Option<Rc<T>> {
        let live = self.entries.get(&handle)?.upgrade();
        if live.is_none() {
            log::debug!("dropping stale registry entry {}", handle);
            self.entries.remove(&handle);
        }
        live
    }

    pub fn unregister(&mut self, handle: NativeHandle) {
        self.entries.remove(&handle);
    }

    /// Remove the entry for `handle` only if its wrapper is gone. Used by a
    /// wrapper's destructor so it never evicts a newer live registration.
    pub fn unregister_stale(&mut self, handle: NativeHandle) {
        if self.entries.get(&handle).is_some_and(|weak| weak.strong_count() == 0) {
            self.entries.remove(&handle);
        }
    }

    /// Remove every entry whose wrapper is gone. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    /// Live wrappers, in no particular order.
    pub fn live(&self) -> Vec<Rc<T>> {
        self.entries.values().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
