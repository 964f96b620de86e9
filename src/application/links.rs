//! Read path for the link listing.
//!
//! Only the first page at the cache page size is served from the link cache.
//! Anything else goes straight upstream.

use std::sync::Arc;

use metrics::counter;
use pockets_api_types::{
    CacheRefreshRequest, CacheRefreshResponse, CacheStats, LinksResponse, RefreshStats,
};
use tracing::{debug, instrument, warn};

use crate::cache::{
    CacheError, LinkCacheStore, METRIC_LINKS_BYPASS, METRIC_LINKS_HIT, METRIC_LINKS_MISS,
    RefreshTrigger, Revalidator,
};
use crate::upstream::{LinkSource, ListQuery, UpstreamError};

/// How a listing was answered; surfaced as the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub page: Arc<LinksResponse>,
    pub cache: CacheStatus,
}

pub struct LinkListingService {
    store: Arc<dyn LinkCacheStore>,
    source: Arc<dyn LinkSource>,
    revalidator: Revalidator,
    page_size: u32,
}

impl LinkListingService {
    pub fn new(
        store: Arc<dyn LinkCacheStore>,
        source: Arc<dyn LinkSource>,
        revalidator: Revalidator,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            source,
            revalidator,
            page_size,
        }
    }

    /// The single query whose result lives in the link cache.
    pub fn cache_query(&self) -> ListQuery {
        ListQuery::first_page(self.page_size)
    }

    pub fn is_cacheable(&self, query: &ListQuery) -> bool {
        matches!(query.page, None | Some(1))
            && !query.has_search()
            && query.per_page.is_none_or(|per_page| per_page == self.page_size)
    }

    #[instrument(skip(self), fields(page = ?query.page, per_page = ?query.per_page))]
    pub async fn list(&self, query: ListQuery) -> Result<Listing, UpstreamError> {
        if !self.is_cacheable(&query) {
            debug!(cache = "links", outcome = "bypass", "query not cacheable");
            counter!(METRIC_LINKS_BYPASS).increment(1);
            let page = self.source.list_links(&query).await?;
            return Ok(Listing {
                page: Arc::new(page),
                cache: CacheStatus::Bypass,
            });
        }

        match self.store.get().await {
            Ok(Some(entry)) => {
                counter!(METRIC_LINKS_HIT).increment(1);
                let stale = self.store.is_stale(&entry);
                debug!(cache = "links", outcome = "hit", stale, "serving cached links");
                if stale
                    && let RefreshTrigger::Started(_) =
                        self.revalidator.trigger_refresh(self.cache_query())
                {
                    debug!("Stale link cache, refresh started");
                }
                return Ok(Listing {
                    page: entry.data,
                    cache: CacheStatus::Hit,
                });
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    backend = self.store.backend(),
                    error = %err,
                    "Link cache read failed, falling back to upstream"
                );
            }
        }

        debug!(cache = "links", outcome = "miss", "fetching links upstream");
        counter!(METRIC_LINKS_MISS).increment(1);
        let generation = self.store.generation();
        let page = Arc::new(self.source.list_links(&self.cache_query()).await?);
        match self.store.set_if_generation(page.clone(), generation).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!("Link cache cleared during fetch, not populating"),
            Err(err) => {
                warn!(backend = self.store.backend(), error = %err, "Failed to populate link cache");
            }
        }

        Ok(Listing {
            page,
            cache: CacheStatus::Miss,
        })
    }

    /// Cache snapshot; a failing backend reports an empty cache.
    pub async fn stats(&self) -> CacheStats {
        match self.store.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(backend = self.store.backend(), error = %err, "Link cache stats unavailable");
                CacheStats::default()
            }
        }
    }

    /// Synchronous refresh. Only the cached query is written to the store;
    /// other pages are fetched to report their size and otherwise discarded.
    #[instrument(skip(self))]
    pub async fn refresh(
        &self,
        request: CacheRefreshRequest,
    ) -> Result<CacheRefreshResponse, UpstreamError> {
        let query = ListQuery {
            page: Some(request.page.unwrap_or(1)),
            per_page: Some(request.per_page.unwrap_or(self.page_size)),
            search: None,
            include_timestamps: true,
        };

        let before = self.stats().await;
        let (items_count, message) = if self.is_cacheable(&query) {
            let page = self.revalidator.refresh_now(&query).await?;
            (page.data.len(), "Cache refreshed successfully")
        } else {
            let page = self.source.list_links(&query).await?;
            (
                page.data.len(),
                "Fetched requested page; only the first page is cached",
            )
        };
        let after = self.stats().await;

        Ok(CacheRefreshResponse {
            success: true,
            message: message.to_string(),
            timestamp: self.store.now(),
            stats: RefreshStats { before, after },
            items_count,
        })
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }
}
