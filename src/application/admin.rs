//! PIN-gated admin operations.

use std::sync::Arc;

use axum::http::StatusCode;
use pockets_api_types::{CreateLinkRequest, CreateLinkResponse, NewValue};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, instrument};

use super::error::HttpError;
use super::invalidation::InvalidationService;
use crate::upstream::{LinkSource, UpstreamError};

const SOURCE: &str = "application::admin";

/// Link kinds the admin form may create.
pub const LINK_KINDS: [&str; 3] = ["text", "url", "link"];

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Admin PIN not configured")]
    NotConfigured,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Missing required fields")]
    MissingFields,
    #[error("Unsupported link type `{0}`")]
    UnsupportedKind(String),
    #[error("Failed to create link")]
    Upstream(#[source] UpstreamError),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::NotConfigured | AdminError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::MissingFields | AdminError::UnsupportedKind(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<AdminError> for HttpError {
    fn from(err: AdminError) -> Self {
        HttpError::from_error(SOURCE, err.status(), err.to_string(), &err)
    }
}

#[derive(Clone)]
pub struct AdminService {
    pin: Option<Arc<str>>,
    source: Arc<dyn LinkSource>,
    invalidation: InvalidationService,
}

impl AdminService {
    pub fn new(
        pin: Option<String>,
        source: Arc<dyn LinkSource>,
        invalidation: InvalidationService,
    ) -> Self {
        Self {
            pin: pin.map(Arc::from),
            source,
            invalidation,
        }
    }

    pub fn verify(&self, candidate: &str) -> Result<(), AdminError> {
        let expected = self.pin.as_deref().ok_or(AdminError::NotConfigured)?;
        if expected.as_bytes().ct_eq(candidate.trim().as_bytes()).unwrap_u8() == 0 {
            return Err(AdminError::Unauthorized);
        }
        Ok(())
    }

    /// Store a new link, then drop every cached view of the list.
    #[instrument(skip_all, fields(slug = %request.slug.trim()))]
    pub async fn create_link(
        &self,
        request: CreateLinkRequest,
    ) -> Result<CreateLinkResponse, AdminError> {
        self.verify(&request.pin)?;

        let link = NewValue {
            name: request.name.trim().to_string(),
            slug: request.slug.trim().to_string(),
            value: request.value.trim().to_string(),
            kind: request.kind.trim().to_string(),
        };
        if link.name.is_empty() || link.slug.is_empty() || link.value.is_empty() {
            return Err(AdminError::MissingFields);
        }
        if !LINK_KINDS.contains(&link.kind.as_str()) {
            return Err(AdminError::UnsupportedKind(link.kind));
        }

        let data = self
            .source
            .create_link(&link)
            .await
            .map_err(AdminError::Upstream)?;
        info!(kind = %link.kind, "Link created");

        self.invalidation.after_link_created().await;

        Ok(CreateLinkResponse {
            success: true,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pockets_api_types::LinksResponse;

    use super::*;
    use crate::cache::{
        CacheConfig, CachePolicy, LinkCacheStore, ManualClock, MemoryStore, PageCache,
    };
    use crate::upstream::fake::GatedSource;

    fn service(pin: Option<&str>) -> (AdminService, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(
            CachePolicy::new(Duration::from_secs(60), 0.83),
            clock.clone(),
        ));
        let pages = Arc::new(PageCache::new(&CacheConfig::default(), clock));
        let invalidation = InvalidationService::new(pages, store.clone());
        (
            AdminService::new(
                pin.map(str::to_string),
                Arc::new(GatedSource::default()),
                invalidation,
            ),
            store,
        )
    }

    fn link(pin: &str) -> CreateLinkRequest {
        CreateLinkRequest {
            pin: pin.to_string(),
            name: "Rust".to_string(),
            slug: "rust".to_string(),
            value: "https://rust-lang.org".to_string(),
            kind: "url".to_string(),
        }
    }

    #[test]
    fn verify_distinguishes_missing_and_wrong_pin() {
        let (unconfigured, _) = service(None);
        assert!(matches!(
            unconfigured.verify("1234"),
            Err(AdminError::NotConfigured)
        ));

        let (admin, _) = service(Some("1234"));
        assert!(admin.verify("1234").is_ok());
        assert!(matches!(admin.verify("123"), Err(AdminError::Unauthorized)));
        assert!(matches!(admin.verify(""), Err(AdminError::Unauthorized)));
    }

    #[tokio::test]
    async fn create_link_validates_before_writing() {
        let (admin, _) = service(Some("1234"));

        let err = admin.create_link(link("0000")).await.expect_err("bad pin");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let mut missing = link("1234");
        missing.value = "  ".to_string();
        let err = admin.create_link(missing).await.expect_err("missing value");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let mut odd = link("1234");
        odd.kind = "video".to_string();
        let err = admin.create_link(odd).await.expect_err("unsupported kind");
        assert!(matches!(err, AdminError::UnsupportedKind(kind) if kind == "video"));
    }

    #[tokio::test]
    async fn create_link_clears_the_link_cache() {
        let (admin, store) = service(Some("1234"));
        store
            .set(Arc::new(LinksResponse::default()))
            .await
            .expect("seed");

        let created = admin.create_link(link("1234")).await.expect("created");

        assert!(created.success);
        assert!(store.get().await.expect("get").is_none());
    }
}
