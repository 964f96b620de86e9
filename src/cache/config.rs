//! Cache configuration.
//!
//! Controls the link cache and the rendered page cache via `pockets.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::entry::CachePolicy;

// Default values for cache configuration
const DEFAULT_TTL_SECS: u64 = 60 * 60;
const DEFAULT_STALE_FRACTION: f64 = 0.83;
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_TTL_SECS: u64 = 60 * 60;
const DEFAULT_PAGE_LIMIT: usize = 200;
const DEFAULT_REDIS_KEY: &str = "pockets:links";

/// Storage behind the link cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

/// Resolved cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Connection URL, required for the Redis backend.
    pub redis_url: Option<String>,
    /// Key holding the single link cache record in Redis.
    pub redis_key: String,
    /// Lifetime of a link cache entry.
    pub ttl: Duration,
    /// Fraction of `ttl` after which an entry is served stale and refreshed.
    pub stale_fraction: f64,
    /// Page size of the cached first page.
    pub page_size: u32,
    /// Lifetime of a rendered page.
    pub page_ttl: Duration,
    /// Maximum rendered pages kept in memory.
    pub page_limit: usize,
    /// Period of the proactive refresh loop; `None` disables it.
    pub refresh_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            redis_key: DEFAULT_REDIS_KEY.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            stale_fraction: DEFAULT_STALE_FRACTION,
            page_size: DEFAULT_PAGE_SIZE,
            page_ttl: Duration::from_secs(DEFAULT_PAGE_TTL_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
            refresh_interval: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            redis_key: settings.redis_key.clone(),
            ttl: settings.ttl,
            stale_fraction: settings.stale_fraction,
            page_size: settings.page_size.get(),
            page_ttl: settings.page_ttl,
            page_limit: settings.page_limit.get(),
            refresh_interval: settings.refresh_interval,
        }
    }
}

impl CacheConfig {
    /// TTL and staleness policy for the link cache.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(self.ttl, self.stale_fraction)
    }

    /// Returns the page limit as NonZeroUsize, clamping to 1 if zero.
    pub fn page_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.page_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert!((config.stale_fraction - 0.83).abs() < f64::EPSILON);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.redis_key, "pockets:links");
        assert!(config.refresh_interval.is_none());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            page_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.page_limit_non_zero().get(), 1);
    }

    #[test]
    fn backend_parses_lowercase_names() {
        let backend: CacheBackend = serde_json::from_str("\"redis\"").expect("backend");
        assert_eq!(backend, CacheBackend::Redis);
    }
}
