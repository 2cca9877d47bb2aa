// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Change notifications produced by the cache.
//!
//! Events are delivered synchronously, in the order the cache state
//! changed. A consumer (typically a virtual-scrolling list) must treat
//! e.g. "added" followed by "available" as two steps of the same pass.

/// Receives cache change events.
pub trait ChangeNotifier<T> {
    /// Rows in `[first, first + count)` have new values.
    fn data_updated(&mut self, first: usize, count: usize);

    /// Rows in `[first, first + count)` are all resident.
    fn data_available(&mut self, first: usize, count: usize);

    /// `count` rows were inserted at `first`.
    fn data_added(&mut self, first: usize, count: usize);

    /// `count` rows were removed starting at `first`.
    fn data_removed(&mut self, first: usize, count: usize);

    /// Everything cached was discarded and the total is now `new_size`.
    fn reset_data_and_size(&mut self, new_size: usize);

    /// A row left the cache. It is no longer reachable by index.
    fn row_dropped(&mut self, _index: usize, _row: &T) {}
}

impl<T> ChangeNotifier<T> for () {
    fn data_updated(&mut self, _first: usize, _count: usize) {}
    fn data_available(&mut self, _first: usize, _count: usize) {}
    fn data_added(&mut self, _first: usize, _count: usize) {}
    fn data_removed(&mut self, _first: usize, _count: usize) {}
    fn reset_data_and_size(&mut self, _new_size: usize) {}
}

/// One recorded notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Updated { first: usize, count: usize },
    Available { first: usize, count: usize },
    Added { first: usize, count: usize },
    Removed { first: usize, count: usize },
    Reset { size: usize },
}

/// A notifier that records every event, for hosts that poll instead of
/// reacting, and for tests.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    events: Vec<ChangeEvent>,
    dropped: Vec<usize>,
}

impl ChangeLog {
    pub fn new() -> ChangeLog {
        return ChangeLog::default();
    }

    pub fn events(&self) -> &[ChangeEvent] {
        return &self.events;
    }

    /// Indices of rows dropped from the cache, in drop order.
    pub fn dropped(&self) -> &[usize] {
        return &self.dropped;
    }

    /// Take the recorded events, leaving the log empty.
    pub fn take(&mut self) -> Vec<ChangeEvent> {
        self.dropped.clear();
        return std::mem::take(&mut self.events);
    }
}

impl<T> ChangeNotifier<T> for ChangeLog {
    fn data_updated(&mut self, first: usize, count: usize) {
        self.events.push(ChangeEvent::Updated { first, count });
    }

    fn data_available(&mut self, first: usize, count: usize) {
        self.events.push(ChangeEvent::Available { first, count });
    }

    fn data_added(&mut self, first: usize, count: usize) {
        self.events.push(ChangeEvent::Added { first, count });
    }

    fn data_removed(&mut self, first: usize, count: usize) {
        self.events.push(ChangeEvent::Removed { first, count });
    }

    fn reset_data_and_size(&mut self, new_size: usize) {
        self.events.push(ChangeEvent::Reset { size: new_size });
    }

    fn row_dropped(&mut self, index: usize, _row: &T) {
        self.dropped.push(index);
    }
}
