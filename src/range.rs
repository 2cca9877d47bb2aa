// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Half-open row index intervals.
//!
//! Every window the cache reasons about (the requested rows, the cached
//! rows, the rows a strategy allows) is a `Range`. The set algebra here is
//! small: the cache only ever needs to split one range around
//! another and glue two touching ranges back together.

use std::fmt;

/// A half-open interval `[start, end)` of row indices.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    start: usize,
    end: usize,
}

impl Range {
    /// The empty range at index zero.
    pub const EMPTY: Range = Range { start: 0, end: 0 };

    /// Create the range `[start, end)`.
    pub fn between(start: usize, end: usize) -> Range {
        assert!(start <= end, "range start {} is after end {}", start, end);
        return Range { start, end };
    }

    /// Create the range `[start, start + length)`.
    pub fn with_length(start: usize, length: usize) -> Range {
        return Range { start, end: start + length };
    }

    /// An empty range positioned at `index`.
    pub fn empty_at(index: usize) -> Range {
        return Range { start: index, end: index };
    }

    pub fn start(&self) -> usize {
        return self.start;
    }

    pub fn end(&self) -> usize {
        return self.end;
    }

    pub fn len(&self) -> usize {
        return self.end - self.start;
    }

    pub fn is_empty(&self) -> bool {
        return self.start == self.end;
    }

    /// Check whether `index` lies inside this range.
    pub fn contains(&self, index: usize) -> bool {
        return self.start <= index && index < self.end;
    }

    /// Check whether the two ranges share at least one index.
    /// Empty ranges never intersect anything.
    pub fn intersects(&self, other: &Range) -> bool {
        return self.start < other.end && other.start < self.end;
    }

    /// Check whether every index of this range is also in `other`.
    /// The empty range is a subset of every range.
    pub fn is_subset_of(&self, other: &Range) -> bool {
        if self.is_empty() {
            return true;
        }
        return other.start <= self.start && self.end <= other.end;
    }

    /// Union of two ranges that overlap or touch.
    ///
    /// Returns `None` when a gap separates them, since the union would not
    /// be a single range. An empty operand is treated as the identity.
    pub fn combine_with(&self, other: &Range) -> Option<Range> {
        if self.is_empty() {
            return Some(*other);
        }
        if other.is_empty() {
            return Some(*self);
        }
        if self.start > other.end || other.start > self.end {
            return None;
        }
        return Some(Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        });
    }

    /// Split this range at `index`.
    ///
    /// Returns `(before, after)`. If `index` lies outside the range one of
    /// the halves is empty and positioned at the nearest edge.
    pub fn split_at(&self, index: usize) -> (Range, Range) {
        if index <= self.start {
            return (Range::empty_at(self.start), *self);
        }
        if index >= self.end {
            return (*self, Range::empty_at(self.end));
        }
        return (
            Range { start: self.start, end: index },
            Range { start: index, end: self.end },
        );
    }

    /// Split this range into the part before `other`, the part inside
    /// `other`, and the part after `other`, in that order.
    pub fn partition_with(&self, other: &Range) -> (Range, Range, Range) {
        let (before, rest) = self.split_at(other.start);
        let (inside, after) = rest.split_at(other.end);
        return (before, inside, after);
    }

    /// Move the range by `delta` indices, saturating at zero.
    pub fn offset_by(&self, delta: isize) -> Range {
        return Range {
            start: self.start.saturating_add_signed(delta),
            end: self.end.saturating_add_signed(delta),
        };
    }

    /// Grow the range by `before` indices at the start and `after` at the
    /// end. The start saturates at zero.
    pub fn expand(&self, before: usize, after: usize) -> Range {
        return Range {
            start: self.start.saturating_sub(before),
            end: self.end.saturating_add(after),
        };
    }

    /// Clamp this range to `bounds`.
    ///
    /// A range entirely outside `bounds` becomes an empty range at the
    /// nearest edge of `bounds`.
    pub fn restrict_to(&self, bounds: &Range) -> Range {
        let start = self.start.clamp(bounds.start, bounds.end);
        let end = self.end.clamp(bounds.start, bounds.end);
        return Range { start, end: end.max(start) };
    }

    /// Iterate over the indices in this range.
    pub fn indices(&self) -> std::ops::Range<usize> {
        return self.start..self.end;
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(range: std::ops::Range<usize>) -> Range {
        return Range::between(range.start, range.end);
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "[{}..{})", self.start, self.end);
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "[{}..{})", self.start, self.end);
    }
}
