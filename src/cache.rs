// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! The windowed row cache.
//!
//! `RangeCache` keeps one contiguous block of rows resident around whatever
//! window a consumer currently needs, fetches the missing parts from a
//! [`Fetcher`], and reports every change to a [`ChangeNotifier`].
//!
//! Key design decisions:
//!
//! 1. **One block**: the cached rows always form a single `Range`. Anything
//!    that would open a hole (an insert in the middle, a response that does
//!    not touch the current block) shrinks or replaces the block instead.
//!
//! 2. **Two maps in lock-step**: rows are looked up by index and by key.
//!    Every path that writes one map writes the other; see
//!    [`RangeCache::check_invariants`].
//!
//! 3. **Single flight**: at most one fetch is outstanding. Reconciliation
//!    is a no-op while it is, and the response re-schedules it.
//!
//! 4. **Deferred reconciliation**: requests and structural changes only
//!    raise a flag. The host runs [`RangeCache::run_pending`] at the end of
//!    its turn, so a burst of scroll updates costs one pass.
//!
//! 5. **Remapped responses**: inserts and removes made while a fetch is in
//!    flight are recorded on it. The response is moved through them into
//!    current indices before it is stored; only rows that were removed, or
//!    that no longer line up with the rest, are dropped. A reset drops the
//!    whole response.

use std::fmt;
use std::time::Instant;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::CacheError;
use crate::error::InvariantViolation;
use crate::fetch::FetchRequest;
use crate::fetch::FetchTicket;
use crate::fetch::Fetcher;
use crate::invalidation::InvalidationBuffer;
use crate::key::KeyOf;
use crate::notify::ChangeNotifier;
use crate::pin::PinningRegistry;
use crate::pin::RowHandle;
use crate::range::Range;
use crate::strategy::CacheStrategy;
use crate::strategy::DefaultCacheStrategy;

/// A structural change applied while a fetch was in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StructuralEdit {
    Inserted { first: usize, count: usize },
    Removed { first: usize, count: usize },
    Reset,
}

impl StructuralEdit {
    /// Where a row that was at `index` before this edit is now, if it
    /// still exists.
    fn remap(&self, index: usize) -> Option<usize> {
        return match *self {
            StructuralEdit::Inserted { first, count } if index >= first => Some(index + count),
            StructuralEdit::Inserted { .. } => Some(index),
            StructuralEdit::Removed { first, .. } if index < first => Some(index),
            StructuralEdit::Removed { first, count } if index < first + count => None,
            StructuralEdit::Removed { count, .. } => Some(index - count),
            StructuralEdit::Reset => None,
        };
    }
}

/// The fetch currently in flight.
#[derive(Clone, Debug)]
struct PendingFetch {
    ticket: FetchTicket,
    range: Range,
    issued_at: Instant,
    /// Edits made since the fetch was issued, oldest first.
    edits: SmallVec<[StructuralEdit; 4]>,
}

/// A client-side cache over rows that live on a remote end.
pub struct RangeCache<T, K, F, N>
where
    K: KeyOf<T>,
{
    keys: K,
    fetcher: F,
    notifier: N,
    strategy: Box<dyn CacheStrategy>,
    /// Total row count, `None` until the remote end has reported it.
    size: Option<usize>,
    cached: Range,
    requested: Range,
    index_to_row: FxHashMap<usize, T>,
    key_to_index: FxHashMap<K::Key, usize>,
    pending: Option<PendingFetch>,
    coverage_check_pending: bool,
    invalidated: InvalidationBuffer<T>,
    pins: PinningRegistry<K::Key, T>,
    /// Index of the latest write that evicted its key from another index.
    collision: Option<usize>,
    next_ticket: u64,
}

impl<T, K, F, N> RangeCache<T, K, F, N>
where
    T: Clone,
    K: KeyOf<T>,
    F: Fetcher,
    N: ChangeNotifier<T>,
{
    /// Create an empty cache using [`DefaultCacheStrategy`].
    pub fn new(keys: K, fetcher: F, notifier: N) -> RangeCache<T, K, F, N> {
        return RangeCache::with_strategy(
            keys,
            fetcher,
            notifier,
            Box::new(DefaultCacheStrategy::default()),
        );
    }

    /// Create an empty cache using the given strategy.
    pub fn with_strategy(
        keys: K,
        fetcher: F,
        notifier: N,
        strategy: Box<dyn CacheStrategy>,
    ) -> RangeCache<T, K, F, N> {
        return RangeCache {
            keys,
            fetcher,
            notifier,
            strategy,
            size: None,
            cached: Range::EMPTY,
            requested: Range::EMPTY,
            index_to_row: FxHashMap::default(),
            key_to_index: FxHashMap::default(),
            pending: None,
            coverage_check_pending: false,
            invalidated: InvalidationBuffer::new(),
            pins: PinningRegistry::new(),
            collision: None,
            next_ticket: 0,
        };
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Total row count, if known.
    pub fn size(&self) -> Option<usize> {
        return self.size;
    }

    /// The block of indices currently backed by row data.
    pub fn cached_range(&self) -> Range {
        return self.cached;
    }

    /// The window passed to the last `ensure_availability`.
    pub fn requested_availability(&self) -> Range {
        return self.requested;
    }

    /// Whether a fetch is in flight.
    pub fn is_waiting_for_data(&self) -> bool {
        return self.pending.is_some();
    }

    /// Whether a coverage check is scheduled and not yet run.
    pub fn has_pending_check(&self) -> bool {
        return self.coverage_check_pending;
    }

    pub fn fetcher(&self) -> &F {
        return &self.fetcher;
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        return &mut self.fetcher;
    }

    pub fn notifier(&self) -> &N {
        return &self.notifier;
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        return &mut self.notifier;
    }

    /// Install a new notifier and return the old one.
    ///
    /// If rows are cached, the new notifier is immediately told they were
    /// updated and are available.
    pub fn replace_notifier(&mut self, notifier: N) -> N {
        let old = std::mem::replace(&mut self.notifier, notifier);
        if !self.cached.is_empty() {
            self.notifier.data_updated(self.cached.start(), self.cached.len());
            self.notifier.data_available(self.cached.start(), self.cached.len());
        }
        return old;
    }

    /// Install a new strategy and reconcile against it right away.
    pub fn set_cache_strategy(&mut self, strategy: Box<dyn CacheStrategy>) {
        self.strategy = strategy;
        self.check_cache_coverage();
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// The row at `index`.
    ///
    /// Rows parked by a mid-cache insert stay readable here, under their
    /// shifted index, until the next reconciliation pass drops them.
    pub fn get_row(&self, index: usize) -> Option<&T> {
        return self
            .index_to_row
            .get(&index)
            .or_else(|| self.invalidated.get(index));
    }

    /// Index of a row, matched by key. `None` if the key is not cached.
    pub fn index_of(&self, row: &T) -> Option<usize> {
        return self.index_of_key(&self.keys.key_of(row));
    }

    pub fn index_of_key(&self, key: &K::Key) -> Option<usize> {
        return self.key_to_index.get(key).copied();
    }

    /// Iterate over the cached rows in index order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        return self
            .cached
            .indices()
            .filter_map(|index| self.index_to_row.get(&index).map(|row| (index, row)));
    }

    // -------------------------------------------------------------------------
    // Pinning
    // -------------------------------------------------------------------------

    /// Get a handle for `row`.
    ///
    /// A pinned key always yields its retained handle. Otherwise the row
    /// must be cached, since a handle has to point at retrievable data.
    pub fn get_handle(&self, row: &T) -> Result<RowHandle<K::Key, T>, CacheError> {
        let key = self.keys.key_of(row);
        if let Some(handle) = self.pins.get(&key) {
            return Ok(handle.clone());
        }
        if self.key_to_index.contains_key(&key) {
            return Ok(RowHandle::new(key, row.clone()));
        }
        return Err(CacheError::RowNotCached {
            key: format!("{:?}", key),
        });
    }

    /// Get a handle by key, from the pinned set or the cache.
    pub fn handle_for_key(&self, key: &K::Key) -> Option<RowHandle<K::Key, T>> {
        if let Some(handle) = self.pins.get(key) {
            return Some(handle.clone());
        }
        let index = self.key_to_index.get(key)?;
        let row = self.index_to_row.get(index)?;
        return Some(RowHandle::new(key.clone(), row.clone()));
    }

    /// Pin a handle so its row survives eviction. Returns the pin count.
    pub fn pin(&mut self, handle: &RowHandle<K::Key, T>) -> usize {
        return self.pins.pin(handle);
    }

    /// Release one pin. Fails if the key was never pinned.
    pub fn unpin(&mut self, handle: &RowHandle<K::Key, T>) -> Result<usize, CacheError> {
        return self.pins.unpin(handle.key());
    }

    pub fn is_pinned(&self, row: &T) -> bool {
        return self.pins.is_pinned(&self.keys.key_of(row));
    }

    pub fn is_key_pinned(&self, key: &K::Key) -> bool {
        return self.pins.is_pinned(key);
    }

    /// Tell the consumer that the handle's row changed, if it is cached.
    pub fn update_row(&mut self, handle: &RowHandle<K::Key, T>) {
        if let Some(index) = self.index_of_key(handle.key()) {
            self.notifier.data_updated(index, 1);
        }
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Ask for `[first, first + count)` to become available.
    ///
    /// Nothing is fetched right away: the rows may already be on their way
    /// in a message that has not been processed yet. Repeated calls before
    /// the next [`run_pending`](Self::run_pending) collapse into one check.
    pub fn ensure_availability(&mut self, first: usize, count: usize) {
        self.requested = Range::with_length(first, count);
        self.schedule_coverage_check();
    }

    /// Run the scheduled coverage check, if any. Returns whether it ran.
    pub fn run_pending(&mut self) -> bool {
        if !self.coverage_check_pending {
            return false;
        }
        self.coverage_check_pending = false;
        self.check_cache_coverage();
        return true;
    }

    fn schedule_coverage_check(&mut self) {
        self.coverage_check_pending = true;
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    fn available_range(&self) -> Range {
        let upper = self.size.unwrap_or(self.requested.end());
        return Range::with_length(0, upper);
    }

    fn min_cache_range(&self) -> Range {
        let available = self.available_range();
        let min = self.strategy.min_cache_range(self.requested, self.cached, available);
        debug_assert!(min.is_subset_of(&available), "min cache range {} outside {}", min, available);
        return min.restrict_to(&available);
    }

    fn max_cache_range(&self) -> Range {
        let available = self.available_range();
        let max = self.strategy.max_cache_range(self.requested, self.cached, available);
        debug_assert!(max.is_subset_of(&available), "max cache range {} outside {}", max, available);
        return max.restrict_to(&available);
    }

    fn check_cache_coverage(&mut self) {
        if self.pending.is_some() {
            // The response handler schedules another pass.
            tracing::trace!("coverage check skipped, fetch in flight");
            return;
        }

        self.clear_invalidated();

        let min = self.min_cache_range();
        let max = self.max_cache_range();
        tracing::trace!(%min, %max, cached = %self.cached, "checking cache coverage");

        if self.cached.is_empty() || !min.intersects(&self.cached) {
            self.replace_cache(max);
            return;
        }

        self.discard_stale_entries(max);
        if self.cached.is_empty() {
            self.replace_cache(max);
            return;
        }

        if min.is_subset_of(&self.cached) {
            self.notifier.data_available(self.cached.start(), self.cached.len());
            return;
        }

        let (leading, _, trailing) = max.partition_with(&self.cached);
        let gaps: SmallVec<[Range; 2]> = [leading, trailing]
            .into_iter()
            .filter(|gap| !gap.is_empty())
            .collect();
        let gap = gaps
            .iter()
            .find(|gap| gap.intersects(&min))
            .or(gaps.first())
            .copied();
        if let Some(gap) = gap {
            self.request_rows(gap);
        }
    }

    /// Throw away the whole block and fetch `max` from scratch.
    fn replace_cache(&mut self, max: Range) {
        let old = self.cached;
        if !old.is_empty() {
            tracing::debug!(%old, %max, "replacing cache");
        }
        self.drop_from_cache(old);
        self.cached = Range::EMPTY;

        if !max.is_empty() {
            self.request_rows(max);
        } else if self.size.is_some() {
            self.notifier.data_available(self.cached.start(), 0);
        }
    }

    /// Trim the cached block to `max`, evicting both overhangs.
    fn discard_stale_entries(&mut self, max: Range) {
        let (before, inside, after) = self.cached.partition_with(&max);
        self.drop_from_cache(before);
        self.drop_from_cache(after);
        self.cached = inside;
    }

    fn request_rows(&mut self, range: Range) {
        if range.is_empty() {
            return;
        }
        if !self.fetcher.can_fetch() {
            tracing::trace!(%range, "fetching disabled, skipping");
            return;
        }
        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending = Some(PendingFetch {
            ticket,
            range,
            issued_at: Instant::now(),
            edits: SmallVec::new(),
        });
        tracing::debug!(ticket = ticket.0, %range, "requesting rows");
        self.fetcher.request_rows(FetchRequest { ticket, range });
    }

    // -------------------------------------------------------------------------
    // Fetch results
    // -------------------------------------------------------------------------

    /// Deliver the rows for `request`, with the total row count the remote
    /// end reported alongside them.
    ///
    /// Rows are moved past any insert or remove made while the fetch was in
    /// flight. A total that differs from the known size resets the cache
    /// first. A response that is not for the fetch in flight is dropped and
    /// the window re-checked.
    pub fn on_response(
        &mut self,
        request: FetchRequest,
        rows: Vec<T>,
        total_size: usize,
    ) -> Result<(), CacheError> {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == request.ticket);

        if current && let Some(pending) = self.pending.take() {
            self.strategy.on_data_arrive(pending.issued_at.elapsed(), rows.len());
            tracing::debug!(
                ticket = request.ticket.0,
                range = %pending.range,
                rows = rows.len(),
                total_size,
                "fetch resolved"
            );
            let (first, rows) = self.remap_response(&pending, rows);
            if self.size != Some(total_size) {
                self.reset_data_and_size(total_size);
            }
            return self.set_row_data(first, rows);
        }

        tracing::debug!(ticket = request.ticket.0, range = %request.range, "dropping stale response");
        for (offset, row) in rows.iter().enumerate() {
            self.notifier.row_dropped(request.range.start() + offset, row);
        }
        self.schedule_coverage_check();
        return Ok(());
    }

    /// Move the rows of a response through the edits made while it was in
    /// flight. Returns the first contiguous run in current indices; rows
    /// that were removed, or that an insert split off from that run, go to
    /// the eviction hook.
    fn remap_response(&mut self, pending: &PendingFetch, rows: Vec<T>) -> (usize, Vec<T>) {
        let fetched = pending.range.start();
        if pending.edits.is_empty() {
            return (fetched, rows);
        }

        let mut start = None;
        let mut kept = Vec::with_capacity(rows.len());
        for (offset, row) in rows.into_iter().enumerate() {
            let index = fetched + offset;
            let moved = pending.edits.iter().try_fold(index, |index, edit| edit.remap(index));
            match (moved, start) {
                (Some(current), None) => {
                    start = Some(current);
                    kept.push(row);
                }
                (Some(current), Some(first)) if current == first + kept.len() => kept.push(row),
                _ => self.notifier.row_dropped(index, &row),
            }
        }

        let first = start.unwrap_or(fetched);
        tracing::debug!(
            fetched = %pending.range,
            remapped = %Range::with_length(first, kept.len()),
            edits = pending.edits.len(),
            "remapped response"
        );
        return (first, kept);
    }

    /// Report that the fetch for `request` failed. The cache does not retry;
    /// the next trigger re-evaluates coverage.
    pub fn on_fetch_failed(&mut self, request: FetchRequest) {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == request.ticket);
        if current {
            self.pending = None;
        }
        tracing::warn!(ticket = request.ticket.0, range = %request.range, current, "fetch failed");
    }

    /// Store rows starting at `first`, as sent by the remote end.
    ///
    /// Only the part of the rows inside the current max cache range is
    /// kept; the rest goes straight to the eviction hook.
    pub fn set_row_data(&mut self, first: usize, rows: Vec<T>) -> Result<(), CacheError> {
        let received = Range::with_length(first, rows.len());
        if let Some(size) = self.size
            && !received.is_empty()
            && received.end() > size
        {
            tracing::warn!(%received, size, "row data past the known size");
            return Err(CacheError::ResponseOutOfBounds {
                first,
                count: rows.len(),
                size,
            });
        }

        for row in &rows {
            let key = self.keys.key_of(row);
            if self.pins.is_pinned(&key) {
                self.pins.refresh(&key, row.clone());
            }
        }

        let max = self.max_cache_range();
        let (_, useful, _) = received.partition_with(&max);

        if !useful.is_empty() && !self.cached.is_empty() {
            self.discard_stale_entries(max);
        }

        let mut unused = Vec::new();
        for (offset, row) in rows.into_iter().enumerate() {
            let index = first + offset;
            if useful.contains(index) {
                self.write_row(index, row);
            } else {
                unused.push((index, row));
            }
        }

        if !useful.is_empty() {
            self.notifier.data_updated(useful.start(), useful.len());

            self.cached = match self.cached.combine_with(&useful) {
                Some(combined) => combined,
                None => {
                    let old = self.cached;
                    tracing::debug!(%old, %useful, "response not adjacent to cache, replacing");
                    self.drop_from_cache(old);
                    useful
                }
            };

            self.restore_invalidated(max);
            if let Some(anchor) = self.collision.take() {
                self.close_holes(anchor);
            }
            self.notifier.data_available(self.cached.start(), self.cached.len());
        }

        for (index, row) in unused {
            self.notifier.row_dropped(index, &row);
        }

        self.schedule_coverage_check();
        return Ok(());
    }

    /// Put back rows parked by a mid-cache insert if they line up with the
    /// end of the cached block. Whatever is not restored is dropped.
    fn restore_invalidated(&mut self, max: Range) {
        if !self.invalidated.is_active() {
            return;
        }
        let (_, _, window) = max.partition_with(&self.cached);
        let (restored, rows) = self.invalidated.take_run(window);
        if !restored.is_empty() {
            for (offset, row) in rows.into_iter().enumerate() {
                self.write_row(restored.start() + offset, row);
            }
            if let Some(combined) = self.cached.combine_with(&restored) {
                self.cached = combined;
            }
            tracing::debug!(%restored, "restored invalidated rows");
            self.notifier.data_updated(restored.start(), restored.len());
        }
        self.clear_invalidated();
    }

    // -------------------------------------------------------------------------
    // Structural changes
    // -------------------------------------------------------------------------

    /// `count` rows were inserted at `first` on the remote end.
    pub fn insert_row_data(&mut self, first: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.record_edit(StructuralEdit::Inserted { first, count });
        if let Some(size) = self.size {
            self.size = Some(size + count);
        }

        let buffer_was_active = self.invalidated.is_active();
        self.clear_invalidated();

        if first <= self.cached.start() {
            let old = self.cached;
            self.cached = old.offset_by(count as isize);
            // Walk down so no row overwrites one that has not moved yet.
            for index in old.indices().rev() {
                self.move_row(index, index + count);
            }
        } else if self.cached.contains(first) {
            // No holes: everything from the insertion point on leaves the
            // block, and is parked in case the next response fills the gap.
            let (kept, tail) = self.cached.split_at(first);
            self.cached = kept;
            for index in tail.indices() {
                let Some(row) = self.take_row(index) else {
                    continue;
                };
                if buffer_was_active {
                    self.notifier.row_dropped(index, &row);
                } else {
                    self.invalidated.capture(index + count, row);
                }
            }
            tracing::debug!(%tail, parked = !buffer_was_active, "insert split the cache");
        }

        self.notifier.data_added(first, count);
        self.schedule_coverage_check();
    }

    /// `count` rows starting at `first` were removed on the remote end.
    pub fn remove_row_data(&mut self, first: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.record_edit(StructuralEdit::Removed { first, count });
        self.size = self.size.map(|size| size.saturating_sub(count));
        self.clear_invalidated();

        let removed = Range::with_length(first, count);
        self.drop_from_cache(removed);

        let first_moved = removed.end().max(self.cached.start());
        for index in first_moved..self.cached.end() {
            self.move_row(index, index - count);
        }

        let shift = -(count as isize);
        if self.cached.is_subset_of(&removed) {
            self.cached = Range::EMPTY;
        } else if removed.intersects(&self.cached) {
            let (before, _, after) = self.cached.partition_with(&removed);
            let after = after.offset_by(shift);
            self.cached = before.combine_with(&after).unwrap_or(before);
        } else if removed.end() <= self.cached.start() {
            self.cached = self.cached.offset_by(shift);
        }

        self.notifier.data_removed(first, count);
        self.schedule_coverage_check();
    }

    /// Forget every cached row and set a new total size.
    ///
    /// For changes without structural information. Prefer
    /// [`insert_row_data`](Self::insert_row_data) and
    /// [`remove_row_data`](Self::remove_row_data) when the shape is known.
    pub fn reset_data_and_size(&mut self, new_size: usize) {
        self.record_edit(StructuralEdit::Reset);
        self.size = Some(new_size);
        self.clear_invalidated();
        let old = self.cached;
        self.drop_from_cache(old);
        self.cached = Range::EMPTY;
        self.notifier.reset_data_and_size(new_size);
    }

    fn record_edit(&mut self, edit: StructuralEdit) {
        if let Some(pending) = self.pending.as_mut() {
            pending.edits.push(edit);
        }
    }

    // -------------------------------------------------------------------------
    // Map maintenance
    // -------------------------------------------------------------------------

    /// Store `row` at `index`, keeping the key map in step.
    fn write_row(&mut self, index: usize, row: T) {
        let key = self.keys.key_of(&row);
        if let Some(old) = self.index_to_row.remove(&index) {
            let old_key = self.keys.key_of(&old);
            if old_key != key && self.key_to_index.get(&old_key) == Some(&index) {
                self.key_to_index.remove(&old_key);
            }
        }
        if let Some(previous) = self.key_to_index.insert(key, index)
            && previous != index
            && let Some(moved) = self.index_to_row.remove(&previous)
        {
            tracing::trace!(previous, index, "row key moved within the cache");
            self.notifier.row_dropped(previous, &moved);
            self.collision = Some(index);
        }
        self.index_to_row.insert(index, row);
    }

    /// Remove the row at `index` from both maps, without notifying.
    fn take_row(&mut self, index: usize) -> Option<T> {
        let row = self.index_to_row.remove(&index)?;
        let key = self.keys.key_of(&row);
        if self.key_to_index.get(&key) == Some(&index) {
            self.key_to_index.remove(&key);
        }
        return Some(row);
    }

    fn move_row(&mut self, from: usize, to: usize) {
        let row = self.index_to_row.remove(&from);
        // Moves walk away from their destinations, so `to` is always vacated.
        debug_assert!(!self.index_to_row.contains_key(&to), "row {} moved onto occupied index {}", from, to);
        if let Some(overwritten) = self.take_row(to) {
            self.notifier.row_dropped(to, &overwritten);
        }
        if let Some(row) = row {
            self.key_to_index.insert(self.keys.key_of(&row), to);
            self.index_to_row.insert(to, row);
        }
    }

    /// Shrink the cached block to the populated run around `anchor`,
    /// evicting everything past the first hole on either side.
    fn close_holes(&mut self, anchor: usize) {
        let cached = self.cached;
        let populated = |index: &usize| self.index_to_row.contains_key(index);
        let Some(seed) = (anchor..cached.end())
            .chain((cached.start()..anchor).rev())
            .find(populated)
        else {
            self.cached = Range::empty_at(cached.start());
            return;
        };
        let mut start = seed;
        while start > cached.start() && self.index_to_row.contains_key(&(start - 1)) {
            start -= 1;
        }
        let mut end = seed + 1;
        while end < cached.end() && self.index_to_row.contains_key(&end) {
            end += 1;
        }

        let kept = Range::between(start, end);
        tracing::debug!(%cached, %kept, "duplicate key left a hole, shrinking cache");
        let (before, _, after) = cached.partition_with(&kept);
        self.drop_from_cache(before);
        self.drop_from_cache(after);
        self.cached = kept;
    }

    fn drop_from_cache(&mut self, range: Range) {
        for index in range.indices() {
            if let Some(row) = self.take_row(index) {
                self.notifier.row_dropped(index, &row);
            }
        }
    }

    fn clear_invalidated(&mut self) {
        if !self.invalidated.is_active() {
            return;
        }
        for (index, row) in self.invalidated.drain() {
            self.notifier.row_dropped(index, &row);
        }
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Verify the structural invariants: the cached range has no holes,
    /// every row lies in it, both maps agree, and the block fits the known
    /// size.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.key_to_index.len() != self.index_to_row.len() {
            return Err(InvariantViolation::MapSizeMismatch {
                keys: self.key_to_index.len(),
                rows: self.index_to_row.len(),
            });
        }
        for index in self.cached.indices() {
            if !self.index_to_row.contains_key(&index) {
                return Err(InvariantViolation::MissingRow {
                    index,
                    cached: self.cached.to_string(),
                });
            }
        }
        for (&index, row) in &self.index_to_row {
            if !self.cached.contains(index) {
                return Err(InvariantViolation::RowOutsideCache {
                    index,
                    cached: self.cached.to_string(),
                });
            }
            let key = self.keys.key_of(row);
            let mapped = self.key_to_index.get(&key).copied();
            if mapped != Some(index) {
                return Err(InvariantViolation::KeyMismatch {
                    index,
                    key: format!("{:?}", key),
                    mapped,
                });
            }
        }
        if let Some(size) = self.size
            && self.cached.end() > size
        {
            return Err(InvariantViolation::CacheBeyondSize {
                cached: self.cached.to_string(),
                size,
            });
        }
        return Ok(());
    }
}

impl<T, K, F, N> fmt::Debug for RangeCache<T, K, F, N>
where
    K: KeyOf<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("RangeCache")
            .field("size", &self.size)
            .field("cached", &self.cached)
            .field("requested", &self.requested)
            .field("rows", &self.index_to_row.len())
            .field("pending", &self.pending.as_ref().map(|pending| pending.range))
            .field("invalidated", &self.invalidated.len())
            .field("pinned", &self.pins.len())
            .finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchQueue;
    use crate::key::KeyFn;
    use crate::key::key_fn;
    use crate::notify::ChangeLog;
    use crate::strategy::StrategyConfig;

    type Row = (u32, &'static str);
    type Cache = RangeCache<Row, KeyFn<fn(&Row) -> u32, u32>, FetchQueue, ChangeLog>;

    fn id(row: &Row) -> u32 {
        return row.0;
    }

    fn cache_with(config: StrategyConfig) -> Cache {
        let strategy = DefaultCacheStrategy::new(config).unwrap();
        let keys = key_fn::<Row, u32, fn(&Row) -> u32>(id);
        return RangeCache::with_strategy(keys, FetchQueue::new(), ChangeLog::new(), Box::new(strategy));
    }

    fn exact() -> Cache {
        return cache_with(StrategyConfig { min_ratio: 0.0, max_ratio: 0.0 });
    }

    fn rows(range: std::ops::Range<u32>) -> Vec<Row> {
        return range.map(|i| (i, "row")).collect();
    }

    fn answer(cache: &mut Cache, total: usize) {
        let request = cache.fetcher_mut().pop().unwrap();
        let rows = rows(request.range.start() as u32..request.range.end() as u32);
        cache.on_response(request, rows, total).unwrap();
    }

    #[test]
    fn leading_gap_is_fetched_first() {
        let mut cache = exact();
        cache.ensure_availability(40, 10);
        cache.run_pending();
        answer(&mut cache, 100);
        assert_eq!(cache.cached_range(), Range::between(40, 50));

        cache.set_cache_strategy(Box::new(DefaultCacheStrategy::default()));
        let pending = cache.pending.as_ref().unwrap();
        assert_eq!(pending.range, Range::between(0, 40));
    }

    #[test]
    fn gap_touching_min_wins() {
        let mut cache = exact();
        cache.ensure_availability(40, 10);
        cache.run_pending();
        answer(&mut cache, 100);

        // min stays [40, 50), max grows on both sides.
        cache.set_cache_strategy(Box::new(
            DefaultCacheStrategy::new(StrategyConfig { min_ratio: 0.0, max_ratio: 1.0 }).unwrap(),
        ));
        assert_eq!(cache.cached_range(), Range::between(40, 50));
        assert!(cache.pending.is_none(), "min is covered, nothing to fetch");

        cache.ensure_availability(45, 10);
        cache.run_pending();
        assert_eq!(cache.pending.as_ref().unwrap().range, Range::between(50, 65));
    }

    #[test]
    fn edits_are_recorded_on_the_fetch_in_flight() {
        let mut cache = exact();
        cache.insert_row_data(0, 3);
        assert!(cache.pending.is_none());

        cache.ensure_availability(0, 10);
        cache.run_pending();
        cache.insert_row_data(0, 0);
        cache.insert_row_data(4, 3);
        cache.remove_row_data(0, 1);
        cache.reset_data_and_size(5);
        let edits = &cache.pending.as_ref().unwrap().edits;
        assert_eq!(
            edits.as_slice(),
            &[
                StructuralEdit::Inserted { first: 4, count: 3 },
                StructuralEdit::Removed { first: 0, count: 1 },
                StructuralEdit::Reset,
            ],
        );
    }

    #[test]
    fn edit_remapping() {
        let inserted = StructuralEdit::Inserted { first: 10, count: 3 };
        assert_eq!(inserted.remap(9), Some(9));
        assert_eq!(inserted.remap(10), Some(13));

        let removed = StructuralEdit::Removed { first: 10, count: 3 };
        assert_eq!(removed.remap(9), Some(9));
        assert_eq!(removed.remap(10), None);
        assert_eq!(removed.remap(12), None);
        assert_eq!(removed.remap(13), Some(10));

        assert_eq!(StructuralEdit::Reset.remap(0), None);
    }

    #[test]
    fn insert_inside_fetched_range_keeps_the_leading_run() {
        let mut cache = exact();
        cache.ensure_availability(0, 10);
        cache.run_pending();
        let request = cache.fetcher_mut().pop().unwrap();

        cache.insert_row_data(4, 2);
        cache.on_response(request, rows(0..10), 12).unwrap();
        assert_eq!(cache.cached_range(), Range::between(0, 4));
        assert_eq!(cache.get_row(3), Some(&(3, "row")));
        // Rows 4..10 now sit at 6..12 and do not touch the kept run.
        assert_eq!(cache.notifier().dropped(), &[4, 5, 6, 7, 8, 9]);
        cache.check_invariants().unwrap();

        cache.run_pending();
        assert_eq!(cache.pending.as_ref().unwrap().range, Range::between(4, 10));
    }

    #[test]
    fn reset_in_flight_drops_the_response() {
        let mut cache = exact();
        cache.ensure_availability(0, 10);
        cache.run_pending();
        let request = cache.fetcher_mut().pop().unwrap();

        cache.reset_data_and_size(50);
        cache.on_response(request, rows(0..10), 50).unwrap();
        assert!(cache.cached_range().is_empty());
        assert_eq!(cache.notifier().dropped().len(), 10);
        assert!(cache.has_pending_check());
    }

    #[test]
    fn moves_never_overwrite_rows() {
        let mut cache = exact();
        cache.ensure_availability(10, 10);
        cache.run_pending();
        answer(&mut cache, 40);

        cache.insert_row_data(5, 3);
        cache.remove_row_data(0, 4);
        cache.remove_row_data(8, 2);
        assert_eq!(cache.cached_range(), Range::between(8, 17));
        assert_eq!(cache.get_row(8), Some(&(11, "row")));
        assert_eq!(cache.get_row(16), Some(&(19, "row")));
        // Only the removed row is dropped; no move lands on an occupied index.
        assert_eq!(cache.notifier().dropped(), &[9]);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn insert_parks_tail_under_shifted_indices() {
        let mut cache = exact();
        cache.ensure_availability(0, 10);
        cache.run_pending();
        answer(&mut cache, 20);

        cache.insert_row_data(4, 2);
        assert_eq!(cache.cached_range(), Range::between(0, 4));
        assert_eq!(cache.invalidated.len(), 6);
        assert!(cache.invalidated.contains(6));
        assert!(cache.invalidated.contains(11));
        assert_eq!(cache.index_to_row.len(), 4);
        cache.check_invariants().unwrap();

        cache.run_pending();
        assert!(!cache.invalidated.is_active());
        assert_eq!(cache.notifier().dropped().len(), 6);
    }

    #[test]
    fn duplicate_key_keeps_newest_index() {
        let mut cache = exact();
        cache.ensure_availability(0, 10);
        cache.run_pending();
        answer(&mut cache, 10);

        // Row 2 shows up again at index 5.
        cache.set_row_data(5, vec![(2, "moved")]).unwrap();
        assert_eq!(cache.index_of_key(&2), Some(5));
        assert_eq!(cache.index_to_row.get(&2), None);

        // Index 2 is empty now, so everything before it leaves the block.
        assert_eq!(cache.cached_range(), Range::between(3, 10));
        assert_eq!(cache.notifier().dropped(), &[2, 0, 1]);
        assert_eq!(cache.notifier().events().last(), Some(&crate::notify::ChangeEvent::Available { first: 3, count: 7 }));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn unknown_ticket_is_ignored() {
        let mut cache = exact();
        cache.ensure_availability(0, 10);
        cache.run_pending();
        let real = cache.fetcher_mut().pop().unwrap();
        let bogus = FetchRequest { ticket: FetchTicket(99), range: real.range };

        cache.on_fetch_failed(bogus);
        assert!(cache.is_waiting_for_data());
        cache.on_response(bogus, rows(0..10), 10).unwrap();
        assert!(cache.is_waiting_for_data());
        assert!(cache.cached_range().is_empty());

        cache.on_response(real, rows(0..10), 10).unwrap();
        assert_eq!(cache.cached_range(), Range::between(0, 10));
    }
}
