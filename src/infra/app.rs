//! Service wiring shared by the binary and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    application::{
        admin::AdminService, details::DetailService, invalidation::InvalidationService,
        links::LinkListingService, metadata::MetadataService, syndication::SyndicationService,
    },
    cache::{CacheConfig, Clock, LinkCacheStore, PageCache, PageCacheState, Revalidator},
    config::SiteSettings,
    upstream::LinkSource,
};

use super::error::InfraError;
use super::http::{ApiState, HttpState, RouterState};

/// Inputs needed to assemble the application.
pub struct AppParts {
    pub source: Arc<dyn LinkSource>,
    pub store: Arc<dyn LinkCacheStore>,
    pub clock: Arc<dyn Clock>,
    pub cache: CacheConfig,
    pub site: SiteSettings,
    pub admin_pin: Option<String>,
    pub metadata_timeout: Duration,
}

pub struct ApplicationContext {
    pub state: RouterState,
    pub listing: Arc<LinkListingService>,
    pub revalidator: Revalidator,
    pub pages: Arc<PageCache>,
}

pub fn build_application_context(parts: AppParts) -> Result<ApplicationContext, InfraError> {
    let AppParts {
        source,
        store,
        clock,
        cache,
        site,
        admin_pin,
        metadata_timeout,
    } = parts;

    let pages = Arc::new(PageCache::new(&cache, clock.clone()));
    let revalidator = Revalidator::new(store.clone(), source.clone());
    let listing = Arc::new(LinkListingService::new(
        store.clone(),
        source.clone(),
        revalidator.clone(),
        cache.page_size,
    ));
    let invalidation = InvalidationService::new(pages.clone(), store);
    let details = Arc::new(DetailService::new(
        source.clone(),
        invalidation.clone(),
        clock.clone(),
    ));
    let admin = Arc::new(AdminService::new(admin_pin, source, invalidation.clone()));
    let syndication = Arc::new(SyndicationService::new(listing.clone(), site.clone()));
    let metadata = Arc::new(MetadataService::new(metadata_timeout)?);

    let http = HttpState {
        listing: listing.clone(),
        details: details.clone(),
        admin: admin.clone(),
        syndication,
        site: Arc::new(site),
        page_cache: PageCacheState {
            pages: pages.clone(),
        },
        clock: clock.clone(),
    };
    let api = ApiState {
        listing: listing.clone(),
        details,
        admin,
        invalidation: Arc::new(invalidation),
        metadata,
        clock,
    };

    Ok(ApplicationContext {
        state: RouterState { http, api },
        listing,
        revalidator,
        pages,
    })
}
