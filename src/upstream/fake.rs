//! In-process upstream double for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pockets_api_types::{LinkDetailsResponse, LinkId, LinkItem, LinksResponse, NewValue};
use tokio::sync::Notify;

use super::{LinkSource, ListQuery, UpstreamError};

/// Upstream double: counts listing calls and can hold them until released.
#[derive(Default)]
pub(crate) struct GatedSource {
    pub calls: AtomicUsize,
    pub gate: Option<Arc<Notify>>,
    pub fail: AtomicBool,
    pub names: Mutex<Vec<String>>,
}

impl GatedSource {
    pub(crate) fn returning(names: &[&str]) -> Self {
        Self {
            names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Default::default()
        }
    }

    pub(crate) fn set_names(&self, names: &[&str]) {
        *self.names.lock().expect("names") = names.iter().map(|n| n.to_string()).collect();
    }
}

#[async_trait]
impl LinkSource for GatedSource {
    async fn list_links(&self, _query: &ListQuery) -> Result<LinksResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                status: 503,
                reason: "Service Unavailable".to_string(),
            });
        }
        let names = self.names.lock().expect("names").clone();
        Ok(LinksResponse {
            data: names
                .iter()
                .enumerate()
                .map(|(idx, name)| LinkItem {
                    id: LinkId::Number(idx as i64 + 1),
                    name: name.clone(),
                    slug: name.to_lowercase(),
                    value: format!("https://{}.example", name.to_lowercase()),
                    kind: "url".to_string(),
                    created_at: None,
                    updated_at: None,
                })
                .collect(),
            ..Default::default()
        })
    }

    async fn link_by_slug(&self, _slug: &str) -> Result<LinkDetailsResponse, UpstreamError> {
        Err(UpstreamError::Status {
            status: 404,
            reason: "Not Found".to_string(),
        })
    }

    async fn comments(&self, _link_id: &LinkId) -> Result<LinksResponse, UpstreamError> {
        Ok(LinksResponse::default())
    }

    async fn post_comment(&self, _comment: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        Ok(serde_json::Value::Null)
    }

    async fn create_link(&self, _link: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        Ok(serde_json::Value::Null)
    }
}
