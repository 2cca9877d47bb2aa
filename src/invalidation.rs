// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Short-lived holding area for rows displaced by a mid-cache insert.
//!
//! When rows are inserted inside the cached range, the cache cannot keep the
//! tail past the insertion point without leaving a hole. The tail is parked
//! here under its post-insert indices instead. If the very next response
//! fills the hole, the parked rows are put back without a round trip.
//!
//! The buffer is strictly one-shot: any reconciliation pass, insert or
//! remove empties it.

use rustc_hash::FxHashMap;

use crate::range::Range;

pub struct InvalidationBuffer<T> {
    rows: FxHashMap<usize, T>,
}

impl<T> InvalidationBuffer<T> {
    pub fn new() -> InvalidationBuffer<T> {
        return InvalidationBuffer {
            rows: FxHashMap::default(),
        };
    }

    /// Whether a previous insert left rows waiting to be restored.
    pub fn is_active(&self) -> bool {
        return !self.rows.is_empty();
    }

    pub fn len(&self) -> usize {
        return self.rows.len();
    }

    pub fn contains(&self, index: usize) -> bool {
        return self.rows.contains_key(&index);
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        return self.rows.get(&index);
    }

    /// Park `row` under its post-insert index.
    pub fn capture(&mut self, index: usize, row: T) {
        self.rows.insert(index, row);
    }

    /// Take the run of parked rows starting exactly at `window.start`.
    ///
    /// Stops at the first missing index or at the end of the window. If a
    /// row is parked just before the window the parked indices do not line
    /// up with the cache edge, and nothing is taken.
    pub fn take_run(&mut self, window: Range) -> (Range, Vec<T>) {
        let start = window.start();
        let mut taken = Vec::new();
        if window.is_empty() || (start > 0 && self.rows.contains_key(&(start - 1))) {
            return (Range::empty_at(start), taken);
        }
        for index in window.indices() {
            match self.rows.remove(&index) {
                Some(row) => taken.push(row),
                None => break,
            }
        }
        return (Range::with_length(start, taken.len()), taken);
    }

    /// Empty the buffer, returning the parked rows in index order.
    pub fn drain(&mut self) -> Vec<(usize, T)> {
        let mut rows: Vec<(usize, T)> = self.rows.drain().collect();
        rows.sort_unstable_by_key(|(index, _)| *index);
        return rows;
    }
}

impl<T> Default for InvalidationBuffer<T> {
    fn default() -> InvalidationBuffer<T> {
        return InvalidationBuffer::new();
    }
}
