//! Link detail pages and visitor comments.

use std::sync::Arc;

use axum::http::StatusCode;
use pockets_api_types::{CommentRequest, LinkDetailsResponse, LinkId, LinksResponse, NewValue};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::error::HttpError;
use super::invalidation::InvalidationService;
use crate::cache::Clock;
use crate::upstream::{LinkSource, UpstreamError};

const SOURCE: &str = "application::details";

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("Link not found")]
    NotFound,
    #[error("Missing required fields")]
    MissingFields,
    #[error("Upstream request failed")]
    Upstream(#[source] UpstreamError),
}

impl From<UpstreamError> for DetailError {
    fn from(err: UpstreamError) -> Self {
        if err.is_not_found() {
            DetailError::NotFound
        } else {
            DetailError::Upstream(err)
        }
    }
}

impl From<DetailError> for HttpError {
    fn from(err: DetailError) -> Self {
        let status = match &err {
            DetailError::NotFound => StatusCode::NOT_FOUND,
            DetailError::MissingFields => StatusCode::BAD_REQUEST,
            DetailError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError::from_error(SOURCE, status, err.to_string(), &err)
    }
}

/// A link together with its visitor comments.
#[derive(Debug, Clone)]
pub struct DetailPage {
    pub link: LinkDetailsResponse,
    pub comments: LinksResponse,
}

#[derive(Clone)]
pub struct DetailService {
    source: Arc<dyn LinkSource>,
    invalidation: InvalidationService,
    clock: Arc<dyn Clock>,
}

impl DetailService {
    pub fn new(
        source: Arc<dyn LinkSource>,
        invalidation: InvalidationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            invalidation,
            clock,
        }
    }

    pub async fn detail(&self, slug: &str) -> Result<LinkDetailsResponse, DetailError> {
        Ok(self.source.link_by_slug(slug).await?)
    }

    pub async fn comments(&self, link_id: &LinkId) -> Result<LinksResponse, DetailError> {
        Ok(self.source.comments(link_id).await?)
    }

    /// Detail plus comments. A failing comment lookup renders as no comments.
    #[instrument(skip(self))]
    pub async fn page(&self, slug: &str) -> Result<DetailPage, DetailError> {
        let link = self.detail(slug).await?;
        let comments = match self.source.comments(&link.data.id).await {
            Ok(comments) => comments,
            Err(err) => {
                warn!(error = %err, "Failed to load comments");
                LinksResponse::default()
            }
        };
        Ok(DetailPage { link, comments })
    }

    /// Store a visitor comment and return the upstream body verbatim.
    #[instrument(skip_all, fields(link_id = ?request.link_id))]
    pub async fn post_comment(
        &self,
        request: CommentRequest,
    ) -> Result<serde_json::Value, DetailError> {
        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .ok_or(DetailError::MissingFields)?;
        let link_id = request.link_id.as_ref().ok_or(DetailError::MissingFields)?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS);
        let millis = self.clock.now().unix_timestamp_nanos() / 1_000_000;

        let value = NewValue {
            name: name.to_string(),
            slug: format!("comment-{millis}"),
            value: comment.to_string(),
            kind: format!("comment:{link_id}"),
        };
        let stored = self.source.post_comment(&value).await?;
        info!("Comment stored");

        if let Some(slug) = request.slug.as_deref().filter(|slug| !slug.trim().is_empty()) {
            self.invalidation.after_comment(slug);
        }
        Ok(stored)
    }
}
