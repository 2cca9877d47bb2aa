// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Rowcache - a windowed client-side cache for remotely stored rows.
//!
//! The cache keeps one contiguous block of rows around the window a consumer
//! (typically a virtual-scrolling list) needs, fetches the missing parts in
//! ranges, and keeps its index and key maps consistent while the remote end
//! inserts and removes rows underneath it.
//!
//! # Quick Start
//!
//! ```
//! use rowcache::cache::RangeCache;
//! use rowcache::fetch::FetchQueue;
//! use rowcache::key::key_fn;
//! use rowcache::notify::{ChangeEvent, ChangeLog};
//!
//! let keys = key_fn(|row: &(u64, String)| row.0);
//! let mut cache = RangeCache::new(keys, FetchQueue::new(), ChangeLog::new());
//!
//! // Ask for the first ten rows, then let the event loop run the check.
//! cache.ensure_availability(0, 10);
//! cache.run_pending();
//!
//! // Answer the fetch the cache issued.
//! let request = cache.fetcher_mut().pop().unwrap();
//! let rows = request
//!     .range
//!     .indices()
//!     .map(|i| (i as u64, format!("row {}", i)))
//!     .collect();
//! cache.on_response(request, rows, 100).unwrap();
//!
//! assert_eq!(cache.get_row(5).map(|row| row.1.as_str()), Some("row 5"));
//! assert!(cache.notifier().events().contains(&ChangeEvent::Available { first: 0, count: 10 }));
//! ```

pub mod cache;
pub mod error;
pub mod fetch;
pub mod invalidation;
pub mod key;
pub mod notify;
pub mod pin;
pub mod range;
pub mod strategy;

pub use cache::RangeCache;
pub use error::CacheError;
pub use error::ConfigError;
pub use fetch::FetchQueue;
pub use fetch::FetchRequest;
pub use fetch::Fetcher;
pub use key::KeyOf;
pub use notify::ChangeEvent;
pub use notify::ChangeNotifier;
pub use pin::RowHandle;
pub use range::Range;
pub use strategy::AdaptiveCacheStrategy;
pub use strategy::CacheStrategy;
pub use strategy::DefaultCacheStrategy;
