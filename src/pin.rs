// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Reference-counted row retention.
//!
//! A pinned row stays reachable by key even after it leaves the cached
//! range, e.g. a selected row scrolled far out of view. The registry holds
//! one authoritative [`RowHandle`] per key; handles share their row through
//! an `Rc<RefCell<_>>` so a fresh fetch can update every outstanding clone
//! in place.

use std::cell::Ref;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// A shared reference to a row, identified by its stable key.
///
/// Two handles are equal when their keys are equal, regardless of whether
/// they share the same backing cell.
pub struct RowHandle<K, T> {
    key: K,
    row: Rc<RefCell<T>>,
}

impl<K, T> RowHandle<K, T> {
    pub(crate) fn new(key: K, row: T) -> RowHandle<K, T> {
        return RowHandle {
            key,
            row: Rc::new(RefCell::new(row)),
        };
    }

    pub fn key(&self) -> &K {
        return &self.key;
    }

    /// Borrow the last known value of the row.
    pub fn row(&self) -> Ref<'_, T> {
        return self.row.borrow();
    }

    /// Replace the row value seen by every clone of this handle.
    pub(crate) fn replace(&self, row: T) {
        *self.row.borrow_mut() = row;
    }

    /// Check whether two handles share the same backing cell.
    pub fn shares_row_with(&self, other: &RowHandle<K, T>) -> bool {
        return Rc::ptr_eq(&self.row, &other.row);
    }
}

impl<K: Clone, T> Clone for RowHandle<K, T> {
    fn clone(&self) -> RowHandle<K, T> {
        return RowHandle {
            key: self.key.clone(),
            row: Rc::clone(&self.row),
        };
    }
}

impl<K: PartialEq, T> PartialEq for RowHandle<K, T> {
    fn eq(&self, other: &RowHandle<K, T>) -> bool {
        return self.key == other.key;
    }
}

impl<K: Eq, T> Eq for RowHandle<K, T> {}

impl<K: Debug, T: Debug> Debug for RowHandle<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "RowHandle({:?}, {:?})", self.key, self.row.borrow());
    }
}

struct PinEntry<K, T> {
    count: usize,
    handle: RowHandle<K, T>,
}

/// Pin counts and retained handles, keyed by row key.
pub struct PinningRegistry<K, T> {
    pins: FxHashMap<K, PinEntry<K, T>>,
}

impl<K: Clone + Eq + Hash + Debug, T> PinningRegistry<K, T> {
    pub fn new() -> PinningRegistry<K, T> {
        return PinningRegistry {
            pins: FxHashMap::default(),
        };
    }

    /// Pin a handle and return the new pin count.
    ///
    /// The first pin for a key makes `handle` the authoritative handle for
    /// that key. Later pins only bump the count, including pins of a
    /// distinct handle that carries the same key.
    pub fn pin(&mut self, handle: &RowHandle<K, T>) -> usize {
        let pin = self.pins.entry(handle.key.clone()).or_insert_with(|| PinEntry {
            count: 0,
            handle: handle.clone(),
        });
        if pin.count > 0 && !pin.handle.shares_row_with(handle) {
            tracing::trace!(key = ?handle.key, "key already pinned through another handle");
        }
        pin.count += 1;
        return pin.count;
    }

    /// Drop one pin for `key` and return the remaining count.
    pub fn unpin(&mut self, key: &K) -> Result<usize, CacheError> {
        let Some(pin) = self.pins.get_mut(key) else {
            return Err(CacheError::NotPinned {
                key: format!("{:?}", key),
            });
        };
        pin.count -= 1;
        let remaining = pin.count;
        if remaining == 0 {
            self.pins.remove(key);
        }
        return Ok(remaining);
    }

    pub fn is_pinned(&self, key: &K) -> bool {
        return self.pins.contains_key(key);
    }

    pub fn pin_count(&self, key: &K) -> usize {
        return self.pins.get(key).map_or(0, |pin| pin.count);
    }

    /// The authoritative handle for a pinned key.
    pub fn get(&self, key: &K) -> Option<&RowHandle<K, T>> {
        return self.pins.get(key).map(|pin| &pin.handle);
    }

    /// Store a freshly fetched value for `key` if it is pinned.
    pub fn refresh(&self, key: &K, row: T) -> bool {
        let Some(pin) = self.pins.get(key) else {
            return false;
        };
        pin.handle.replace(row);
        return true;
    }

    /// Number of distinct pinned keys.
    pub fn len(&self) -> usize {
        return self.pins.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.pins.is_empty();
    }
}

impl<K: Clone + Eq + Hash + Debug, T> Default for PinningRegistry<K, T> {
    fn default() -> PinningRegistry<K, T> {
        return PinningRegistry::new();
    }
}
