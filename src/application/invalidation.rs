//! Push-based invalidation after writes.

use std::sync::Arc;

use axum::http::StatusCode;
use pockets_api_types::{RevalidateRequest, RevalidateResponse};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::error::HttpError;
use crate::cache::{LINKS_TAG, LinkCacheStore, PageCache};

const SOURCE: &str = "application::invalidation";

/// How far below `path` rendered pages are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Exactly `path`.
    Page,
    /// `path` and everything below it.
    Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub path: String,
    pub scope: Scope,
    pub tag: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error("Missing path parameter")]
    MissingPath,
    #[error("Path must start with '/'")]
    RelativePath,
    #[error("Invalid type parameter. Must be 'page' or 'layout'")]
    UnknownScope(String),
}

impl From<InvalidationError> for HttpError {
    fn from(err: InvalidationError) -> Self {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, err.to_string(), &err)
    }
}

impl Invalidation {
    pub fn parse(request: RevalidateRequest) -> Result<Self, InvalidationError> {
        let path = request
            .path
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .ok_or(InvalidationError::MissingPath)?;
        if !path.starts_with('/') {
            return Err(InvalidationError::RelativePath);
        }

        let scope = match request.kind.as_deref().map(str::trim) {
            None | Some("") | Some("page") => Scope::Page,
            Some("layout") => Scope::Layout,
            Some(other) => return Err(InvalidationError::UnknownScope(other.to_string())),
        };

        let tag = request
            .tag
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty());

        Ok(Self { path, scope, tag })
    }
}

/// Drops rendered pages and the link cache so the next read sees fresh data.
#[derive(Clone)]
pub struct InvalidationService {
    pages: Arc<PageCache>,
    store: Arc<dyn LinkCacheStore>,
}

impl InvalidationService {
    pub fn new(pages: Arc<PageCache>, store: Arc<dyn LinkCacheStore>) -> Self {
        Self { pages, store }
    }

    /// Apply `invalidation`. Invalidating something that was never cached is
    /// a successful no-op.
    #[instrument(skip(self), fields(path = %invalidation.path))]
    pub async fn revalidate(&self, invalidation: Invalidation) -> RevalidateResponse {
        let mut removed = match invalidation.scope {
            Scope::Page => self.pages.invalidate_path(&invalidation.path),
            Scope::Layout => self.pages.invalidate_prefix(&invalidation.path),
        };
        if let Some(tag) = invalidation.tag.as_deref() {
            removed += self.pages.invalidate_tag(tag);
        }

        self.clear_links().await;
        info!(removed, scope = ?invalidation.scope, tag = ?invalidation.tag, "Revalidated");

        let now = self.store.now();
        RevalidateResponse {
            revalidated: true,
            path: invalidation.path,
            now: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }

    /// A new link changes every list view.
    pub async fn after_link_created(&self) {
        self.revalidate(Invalidation {
            path: "/".to_string(),
            scope: Scope::Page,
            tag: Some(LINKS_TAG.to_string()),
        })
        .await;
    }

    /// A comment only changes the detail page of its link.
    pub fn after_comment(&self, slug: &str) {
        let removed = self.pages.invalidate_path(&format!("/{}", slug.trim_matches('/')));
        info!(slug, removed, "Dropped rendered detail page after comment");
    }

    async fn clear_links(&self) {
        if let Err(err) = self.store.clear().await {
            warn!(backend = self.store.backend(), error = %err, "Failed to clear link cache");
        }
    }
}
