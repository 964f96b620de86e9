//! Access to the upstream link-storage service.
//!
//! The service stores every record as a `{name, slug, value, type}` value
//! inside a project. Links live in one project, visitor comments in another.

mod client;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use pockets_api_types::{LinkDetailsResponse, LinkId, LinksResponse, NewValue};
use serde::Deserialize;
use thiserror::Error;

pub use client::{SiloClient, UpstreamConfig};

pub(crate) const METRIC_UPSTREAM_REQUEST_MS: &str = "pockets_upstream_request_ms";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream responded {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("upstream response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid upstream URL: {0}")]
    Url(String),
}

impl UpstreamError {
    /// Whether the upstream reported the record as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 404, .. })
    }
}

/// Listing parameters forwarded to the upstream service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    #[serde(skip)]
    pub include_timestamps: bool,
}

impl ListQuery {
    /// First page at `per_page`, as stored in the link cache.
    pub fn first_page(per_page: u32) -> Self {
        Self {
            page: Some(1),
            per_page: Some(per_page),
            search: None,
            include_timestamps: true,
        }
    }

    pub fn has_search(&self) -> bool {
        self.search
            .as_deref()
            .is_some_and(|term| !term.trim().is_empty())
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            pairs.push(("search", search.to_string()));
        }
        if self.include_timestamps {
            pairs.push(("include_timestamps", "true".to_string()));
        }
        pairs
    }
}

/// Read and write access to stored links and comments.
#[async_trait]
pub trait LinkSource: Send + Sync {
    async fn list_links(&self, query: &ListQuery) -> Result<LinksResponse, UpstreamError>;

    async fn link_by_slug(&self, slug: &str) -> Result<LinkDetailsResponse, UpstreamError>;

    /// Comments attached to the link with `link_id`.
    async fn comments(&self, link_id: &LinkId) -> Result<LinksResponse, UpstreamError>;

    /// Store a visitor comment; returns the upstream's response body verbatim.
    async fn post_comment(&self, comment: &NewValue) -> Result<serde_json::Value, UpstreamError>;

    /// Store a new link; returns the upstream's response body verbatim.
    async fn create_link(&self, link: &NewValue) -> Result<serde_json::Value, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_skip_blank_search() {
        let query = ListQuery {
            page: Some(2),
            per_page: None,
            search: Some("   ".to_string()),
            include_timestamps: false,
        };
        assert!(!query.has_search());
        assert_eq!(query.to_pairs(), vec![("page", "2".to_string())]);
    }

    #[test]
    fn first_page_requests_timestamps() {
        let pairs = ListQuery::first_page(100).to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("page", "1".to_string()),
                ("per_page", "100".to_string()),
                ("include_timestamps", "true".to_string()),
            ]
        );
    }
}
