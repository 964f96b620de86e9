//! Pockets Cache System
//!
//! Two caches sit in front of the upstream link-storage service:
//!
//! - **Link cache**: a single TTL entry holding the first page of links. Reads
//!   past a staleness threshold are still served while a background refresh
//!   runs (stale-while-revalidate). Backed by process memory or Redis.
//! - **Page cache**: rendered HTML/XML responses keyed by path, dropped on
//!   explicit revalidation after admin writes.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "memory"      # or "redis"
//! ttl_seconds = 3600
//! stale_fraction = 0.83
//! page_size = 100
//! page_ttl_seconds = 3600
//! ```

mod clock;
mod config;
mod entry;
#[cfg(test)]
pub(crate) mod fake;
mod lock;
mod middleware;
mod pages;
mod redis_store;
mod revalidate;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheBackend, CacheConfig};
pub use entry::{CacheEntry, CachePolicy, Freshness};
pub use middleware::{PAGE_CACHE_HEADER, PageCacheState, page_cache_layer};
pub use pages::{CachedPage, LINKS_TAG, PageCache, PageKey, hash_query, tags_for_path};
pub use redis_store::RedisStore;
pub use revalidate::{RefreshTrigger, Revalidator};
pub use store::{CacheError, LinkCacheStore, MemoryStore};

pub(crate) const METRIC_LINKS_HIT: &str = "pockets_links_cache_hit_total";
pub(crate) const METRIC_LINKS_MISS: &str = "pockets_links_cache_miss_total";
pub(crate) const METRIC_LINKS_BYPASS: &str = "pockets_links_cache_bypass_total";
pub(crate) const METRIC_REVALIDATE_STARTED: &str = "pockets_links_revalidate_started_total";
pub(crate) const METRIC_REVALIDATE_SKIPPED: &str = "pockets_links_revalidate_skipped_total";
pub(crate) const METRIC_REVALIDATE_FAILED: &str = "pockets_links_revalidate_failed_total";
pub(crate) const METRIC_PAGE_HIT: &str = "pockets_page_cache_hit_total";
pub(crate) const METRIC_PAGE_MISS: &str = "pockets_page_cache_miss_total";
