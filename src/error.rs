// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Error types for the row cache.

use thiserror::Error;

/// Contract violations reported by the cache.
///
/// None of these are retried: each one means the caller asked for
/// something the cache was never in a position to give.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A row was unpinned more times than it was pinned.
    #[error("row with key {key} was not pinned to begin with")]
    NotPinned { key: String },

    /// A handle was requested for a row that is neither cached nor pinned.
    #[error("row with key {key} is not cached and not pinned")]
    RowNotCached { key: String },

    /// Row data was delivered for indices past the known size.
    #[error("rows [{first}..{end}) exceed the known size {size}", end = .first + .count)]
    ResponseOutOfBounds {
        first: usize,
        count: usize,
        size: usize,
    },
}

/// Invalid cache strategy tuning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error("min_ratio {min} is larger than max_ratio {max}")]
    RatioOrder { min: f64, max: f64 },

    #[error("min_page {min} is larger than max_page {max}")]
    PageOrder { min: usize, max: usize },

    #[error("min_page must be at least 1")]
    ZeroPage,

    #[error("target_latency_ms must be positive")]
    ZeroLatency,
}

/// A broken internal invariant, as found by `RangeCache::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("index {index} inside the cached range {cached} has no row")]
    MissingRow { index: usize, cached: String },

    #[error("row at index {index} lies outside the cached range {cached}")]
    RowOutsideCache { index: usize, cached: String },

    #[error("row at index {index} has key {key} mapped to {mapped:?}")]
    KeyMismatch {
        index: usize,
        key: String,
        mapped: Option<usize>,
    },

    #[error("key map has {keys} entries but row map has {rows}")]
    MapSizeMismatch { keys: usize, rows: usize },

    #[error("cached range {cached} extends past the known size {size}")]
    CacheBeyondSize { cached: String, size: usize },
}
