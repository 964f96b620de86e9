//! Rendered page cache.
//!
//! Holds finished HTML/XML responses keyed by path and query. Entries carry
//! tags so a write can drop every page that shows the affected data.

use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use time::OffsetDateTime;
use tracing::debug;

use super::clock::Clock;
use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::pages";

/// Tag carried by every page that renders the link list.
pub const LINKS_TAG: &str = "links";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub path: String,
    pub query_hash: u64,
}

impl PageKey {
    pub fn new(path: impl Into<String>, query: &str) -> Self {
        Self {
            path: path.into(),
            query_hash: hash_query(query),
        }
    }
}

/// Cached HTTP response.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub tags: BTreeSet<String>,
}

struct Stored {
    at: OffsetDateTime,
    page: CachedPage,
}

pub struct PageCache {
    pages: RwLock<LruCache<PageKey, Stored>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PageCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pages: RwLock::new(LruCache::new(config.page_limit_non_zero())),
            ttl: config.page_ttl,
            clock,
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<CachedPage> {
        let now = self.clock.now();
        let mut pages = rw_write(&self.pages, SOURCE, "get");
        let expired = pages.get(key).is_some_and(|stored| now - stored.at > self.ttl);
        if expired {
            pages.pop(key);
            return None;
        }
        pages.get(key).map(|stored| stored.page.clone())
    }

    /// Store `page`, stamped with the current time for TTL checks.
    pub fn put(&self, key: PageKey, page: CachedPage) {
        let at = self.clock.now();
        rw_write(&self.pages, SOURCE, "put").put(key, Stored { at, page });
    }

    /// Drop every variant of exactly `path`. Returns the number removed.
    pub fn invalidate_path(&self, path: &str) -> usize {
        self.retain(|key, _| key.path != path, "invalidate_path")
    }

    /// Drop `prefix` and everything below it.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let base = prefix.trim_end_matches('/');
        self.retain(
            |key, _| {
                !(base.is_empty()
                    || key.path == base
                    || key.path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/')))
            },
            "invalidate_prefix",
        )
    }

    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.retain(|_, page| !page.tags.contains(tag), "invalidate_tag")
    }

    pub fn invalidate_all(&self) {
        rw_write(&self.pages, SOURCE, "invalidate_all").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.pages, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain(&self, keep: impl Fn(&PageKey, &CachedPage) -> bool, op: &'static str) -> usize {
        let mut pages = rw_write(&self.pages, SOURCE, op);
        let doomed: Vec<PageKey> = pages
            .iter()
            .filter(|(key, stored)| !keep(key, &stored.page))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            pages.pop(key);
        }
        if !doomed.is_empty() {
            debug!(op, removed = doomed.len(), "Dropped rendered pages");
        }
        doomed.len()
    }
}

/// Hash a raw query string for use in page keys.
pub fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

/// Data tags shown by the page at `path`.
pub fn tags_for_path(path: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    match path {
        "/" | "/rss.xml" | "/feed" => {
            tags.insert(LINKS_TAG.to_string());
        }
        _ => {
            if let Some(slug) = path.strip_prefix('/')
                && !slug.is_empty()
                && !slug.contains('/')
            {
                tags.insert(format!("link:{slug}"));
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn cache(limit: usize) -> (PageCache, ManualClock) {
        let clock = ManualClock::default();
        let config = CacheConfig {
            page_limit: limit,
            page_ttl: Duration::from_secs(300),
            ..Default::default()
        };
        (PageCache::new(&config, Arc::new(clock.clone())), clock)
    }

    fn page(path: &str, body: &'static str) -> CachedPage {
        CachedPage {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(body.as_bytes()),
            tags: tags_for_path(path),
        }
    }

    #[test]
    fn roundtrip_and_ttl_expiry() {
        let (pages, clock) = cache(8);
        let key = PageKey::new("/", "");

        assert!(pages.get(&key).is_none());
        pages.put(key.clone(), page("/", "home"));
        assert_eq!(pages.get(&key).expect("cached").body, Bytes::from("home"));

        clock.advance(Duration::from_secs(301));
        assert!(pages.get(&key).is_none());
        assert!(pages.is_empty());
    }

    #[test]
    fn query_variants_are_separate_entries() {
        let (pages, _) = cache(8);
        pages.put(PageKey::new("/", ""), page("/", "first"));
        pages.put(PageKey::new("/", "page=2"), page("/", "second"));

        assert_eq!(pages.len(), 2);
        assert_eq!(pages.invalidate_path("/"), 2);
        assert!(pages.is_empty());
    }

    #[test]
    fn prefix_invalidation_respects_segment_boundaries() {
        let (pages, _) = cache(8);
        pages.put(PageKey::new("/rust", ""), page("/rust", "a"));
        pages.put(PageKey::new("/rust/comments", ""), page("/rust/comments", "b"));
        pages.put(PageKey::new("/rusty", ""), page("/rusty", "c"));

        assert_eq!(pages.invalidate_prefix("/rust"), 2);
        assert!(pages.get(&PageKey::new("/rusty", "")).is_some());

        assert_eq!(pages.invalidate_prefix("/"), 1);
        assert!(pages.is_empty());
    }

    #[test]
    fn tag_invalidation_hits_every_list_view() {
        let (pages, _) = cache(8);
        pages.put(PageKey::new("/", ""), page("/", "home"));
        pages.put(PageKey::new("/feed", ""), page("/feed", "feed"));
        pages.put(PageKey::new("/rust", ""), page("/rust", "detail"));

        assert_eq!(pages.invalidate_tag(LINKS_TAG), 2);
        assert!(pages.get(&PageKey::new("/rust", "")).is_some());
        assert_eq!(pages.invalidate_tag("link:rust"), 1);
    }

    #[test]
    fn lru_evicts_oldest_page() {
        let (pages, _) = cache(2);
        pages.put(PageKey::new("/a", ""), page("/a", "a"));
        pages.put(PageKey::new("/b", ""), page("/b", "b"));
        pages.put(PageKey::new("/c", ""), page("/c", "c"));

        assert!(pages.get(&PageKey::new("/a", "")).is_none());
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn tags_follow_route_shape() {
        assert!(tags_for_path("/").contains(LINKS_TAG));
        assert!(tags_for_path("/rss.xml").contains(LINKS_TAG));
        assert!(tags_for_path("/rust").contains("link:rust"));
        assert!(tags_for_path("/rust/comments").is_empty());
    }
}
