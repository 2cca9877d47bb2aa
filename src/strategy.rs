// model = "claude-opus-4-5"
// created = "2026-10-16"
// modified = "2026-10-16"
// driver = "Isaac Clayton"

//! Cache sizing policies.
//!
//! A strategy decides two windows around the rows a consumer asked for:
//!
//! - the **min cache range**: rows that must be resident, fetched eagerly
//! - the **max cache range**: rows allowed to stay resident, everything
//!   outside it is evicted
//!
//! Both are always clamped to the rows that exist. The min range is expected
//! to be a subset of the max range, otherwise the cache would fetch rows
//! only to throw them away.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::range::Range;

/// A pluggable policy computing cache windows.
pub trait CacheStrategy {
    /// Called when a fetch resolves, with the time it took and the number
    /// of rows it returned.
    fn on_data_arrive(&mut self, latency: Duration, row_count: usize);

    /// Rows that must be cached for `requested` to count as covered.
    fn min_cache_range(&self, requested: Range, cached: Range, available: Range) -> Range;

    /// Rows that may stay cached while `requested` is the active window.
    fn max_cache_range(&self, requested: Range, cached: Range, available: Range) -> Range;
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidRatio { name, value });
    }
    return Ok(());
}

fn margin(ratio: f64, page: usize) -> usize {
    return (ratio * page as f64) as usize;
}

/// Tuning for [`DefaultCacheStrategy`].
///
/// Margins are multiples of the requested window length.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for StrategyConfig {
    fn default() -> StrategyConfig {
        return StrategyConfig {
            min_ratio: 3.0,
            max_ratio: 4.0,
        };
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_ratio("min_ratio", self.min_ratio)?;
        check_ratio("max_ratio", self.max_ratio)?;
        if self.min_ratio > self.max_ratio {
            return Err(ConfigError::RatioOrder {
                min: self.min_ratio,
                max: self.max_ratio,
            });
        }
        return Ok(());
    }
}

/// Caches a fixed multiple of the requested window on each side.
#[derive(Clone, Debug, Default)]
pub struct DefaultCacheStrategy {
    config: StrategyConfig,
}

impl DefaultCacheStrategy {
    pub fn new(config: StrategyConfig) -> Result<DefaultCacheStrategy, ConfigError> {
        config.validate()?;
        return Ok(DefaultCacheStrategy { config });
    }

    pub fn config(&self) -> &StrategyConfig {
        return &self.config;
    }
}

impl CacheStrategy for DefaultCacheStrategy {
    fn on_data_arrive(&mut self, _latency: Duration, _row_count: usize) {}

    fn min_cache_range(&self, requested: Range, _cached: Range, available: Range) -> Range {
        let m = margin(self.config.min_ratio, requested.len());
        return requested.expand(m, m).restrict_to(&available);
    }

    fn max_cache_range(&self, requested: Range, _cached: Range, available: Range) -> Range {
        let m = margin(self.config.max_ratio, requested.len());
        return requested.expand(m, m).restrict_to(&available);
    }
}

/// Tuning for [`AdaptiveCacheStrategy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Eager margin, as a multiple of the requested window length.
    pub min_ratio: f64,
    /// Retention margin, as a multiple of the current page estimate.
    pub max_ratio: f64,
    pub initial_page: usize,
    pub min_page: usize,
    pub max_page: usize,
    /// The fetch latency the page estimate steers towards.
    pub target_latency_ms: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> AdaptiveConfig {
        return AdaptiveConfig {
            min_ratio: 3.0,
            max_ratio: 4.0,
            initial_page: 50,
            min_page: 10,
            max_page: 1000,
            target_latency_ms: 200,
        };
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_ratio("min_ratio", self.min_ratio)?;
        check_ratio("max_ratio", self.max_ratio)?;
        if self.min_page == 0 {
            return Err(ConfigError::ZeroPage);
        }
        if self.min_page > self.max_page {
            return Err(ConfigError::PageOrder {
                min: self.min_page,
                max: self.max_page,
            });
        }
        if self.target_latency_ms == 0 {
            return Err(ConfigError::ZeroLatency);
        }
        return Ok(());
    }
}

/// Retains a margin proportional to a page size that adapts to how fast
/// the remote end answers.
///
/// Responses faster than the target latency grow the page estimate, slower
/// ones shrink it. Each response moves the estimate by at most a factor of
/// two, and it never leaves `[min_page, max_page]`.
#[derive(Clone, Debug)]
pub struct AdaptiveCacheStrategy {
    config: AdaptiveConfig,
    page: usize,
}

impl AdaptiveCacheStrategy {
    pub fn new(config: AdaptiveConfig) -> Result<AdaptiveCacheStrategy, ConfigError> {
        config.validate()?;
        let page = config.initial_page.clamp(config.min_page, config.max_page);
        return Ok(AdaptiveCacheStrategy { config, page });
    }

    /// The current page size estimate.
    pub fn page_size(&self) -> usize {
        return self.page;
    }

    pub fn config(&self) -> &AdaptiveConfig {
        return &self.config;
    }
}

impl Default for AdaptiveCacheStrategy {
    fn default() -> AdaptiveCacheStrategy {
        let config = AdaptiveConfig::default();
        return AdaptiveCacheStrategy {
            page: config.initial_page,
            config,
        };
    }
}

impl CacheStrategy for AdaptiveCacheStrategy {
    fn on_data_arrive(&mut self, latency: Duration, row_count: usize) {
        if row_count == 0 {
            return;
        }
        let elapsed_ms = (latency.as_secs_f64() * 1000.0).max(1.0);
        let factor = (self.config.target_latency_ms as f64 / elapsed_ms).clamp(0.5, 2.0);
        let next = (self.page as f64 * factor).round() as usize;
        self.page = next.clamp(self.config.min_page, self.config.max_page);
        tracing::trace!(page = self.page, ?latency, row_count, "adapted page size");
    }

    fn min_cache_range(&self, requested: Range, _cached: Range, available: Range) -> Range {
        let m = margin(self.config.min_ratio, requested.len());
        return requested.expand(m, m).restrict_to(&available);
    }

    fn max_cache_range(&self, requested: Range, _cached: Range, available: Range) -> Range {
        let eager = margin(self.config.min_ratio, requested.len());
        let page = self.page.max(requested.len());
        let m = margin(self.config.max_ratio, page).max(eager);
        return requested.expand(m, m).restrict_to(&available);
    }
}
