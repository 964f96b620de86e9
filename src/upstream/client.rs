use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use pockets_api_types::{LinkDetailsResponse, LinkId, LinksResponse, NewValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{LinkSource, ListQuery, METRIC_UPSTREAM_REQUEST_MS, UpstreamError};

/// Connection details of the upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// API root, e.g. `https://silo.msar.dev/api`.
    pub base_url: Url,
    pub api_key: String,
    pub project_id: String,
    pub comments_project_id: String,
    pub timeout: Duration,
}

impl From<&crate::config::UpstreamSettings> for UpstreamConfig {
    fn from(settings: &crate::config::UpstreamSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            project_id: settings.project_id.clone(),
            comments_project_id: settings.comments_project_id.clone(),
            timeout: settings.timeout,
        }
    }
}

/// HTTP client for the upstream key/value API.
#[derive(Clone)]
pub struct SiloClient {
    client: Client,
    config: UpstreamConfig,
}

impl SiloClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(concat!("pockets/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// `{base}/values/{project}/{extra...}`
    fn values_url(&self, project: &str, extra: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| UpstreamError::Url(self.config.base_url.to_string()))?;
            segments.pop_if_empty().push("values").push(project);
            for segment in extra {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let started_at = Instant::now();
        let result = request.send().await;
        histogram!(METRIC_UPSTREAM_REQUEST_MS, "operation" => operation)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        Self::handle(result?).await
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, UpstreamError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned()),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl LinkSource for SiloClient {
    #[instrument(skip(self), fields(page = ?query.page, per_page = ?query.per_page))]
    async fn list_links(&self, query: &ListQuery) -> Result<LinksResponse, UpstreamError> {
        let mut url = self.values_url(&self.config.project_id, &[])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_pairs() {
                pairs.append_pair(key, &value);
            }
        }
        debug!(%url, "Fetching links");
        self.send("list_links", self.request(Method::GET, url)).await
    }

    #[instrument(skip(self))]
    async fn link_by_slug(&self, slug: &str) -> Result<LinkDetailsResponse, UpstreamError> {
        let url = self.values_url(&self.config.project_id, &[slug])?;
        self.send("link_by_slug", self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self), fields(link_id = %link_id))]
    async fn comments(&self, link_id: &LinkId) -> Result<LinksResponse, UpstreamError> {
        let mut url = self.values_url(&self.config.comments_project_id, &[])?;
        url.query_pairs_mut()
            .append_pair("type", &format!("comment:{link_id}"));
        self.send("comments", self.request(Method::GET, url)).await
    }

    #[instrument(skip_all, fields(kind = %comment.kind))]
    async fn post_comment(&self, comment: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        let url = self.values_url(&self.config.comments_project_id, &[])?;
        self.send("post_comment", self.request(Method::POST, url).json(comment))
            .await
    }

    #[instrument(skip_all, fields(slug = %link.slug))]
    async fn create_link(&self, link: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        let url = self.values_url(&self.config.project_id, &[])?;
        self.send("create_link", self.request(Method::POST, url).json(link))
            .await
    }
}
