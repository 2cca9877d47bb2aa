// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! The remote end of the cache.
//!
//! A [`Fetcher`] is told which rows to load and returns immediately. When
//! the load resolves, the host hands the rows back through
//! `RangeCache::on_response` (or reports `RangeCache::on_fetch_failed`),
//! quoting the ticket it was given. Retries and backoff are the fetcher's
//! business; the cache never re-issues a failed request on its own.

use std::collections::VecDeque;

use crate::range::Range;

/// Identifies one issued fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(pub(crate) u64);

/// A request to load the rows in `range`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub range: Range,
}

/// Loads rows asynchronously.
pub trait Fetcher {
    /// Start loading `request.range`. Must not block.
    fn request_rows(&mut self, request: FetchRequest);

    /// Whether fetching is currently possible. When false, the cache skips
    /// fetching and re-evaluates on its next trigger.
    fn can_fetch(&self) -> bool {
        return true;
    }
}

/// A fetcher that parks requests in a FIFO queue.
///
/// Suits hosts whose transport is driven from their own event loop: pop a
/// request, send it, and answer the cache when the reply comes in.
#[derive(Debug)]
pub struct FetchQueue {
    queue: VecDeque<FetchRequest>,
    enabled: bool,
    issued: usize,
}

impl FetchQueue {
    pub fn new() -> FetchQueue {
        return FetchQueue {
            queue: VecDeque::new(),
            enabled: true,
            issued: 0,
        };
    }

    pub fn pop(&mut self) -> Option<FetchRequest> {
        return self.queue.pop_front();
    }

    pub fn peek(&self) -> Option<&FetchRequest> {
        return self.queue.front();
    }

    pub fn len(&self) -> usize {
        return self.queue.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.queue.is_empty();
    }

    /// Total number of requests ever received.
    pub fn issued(&self) -> usize {
        return self.issued;
    }

    /// Toggle the answer given to `can_fetch`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for FetchQueue {
    fn default() -> FetchQueue {
        return FetchQueue::new();
    }
}

impl Fetcher for FetchQueue {
    fn request_rows(&mut self, request: FetchRequest) {
        self.issued += 1;
        self.queue.push_back(request);
    }

    fn can_fetch(&self) -> bool {
        return self.enabled;
    }
}
