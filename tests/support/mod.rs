#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use pockets::{
    cache::{
        CacheConfig, CacheEntry, CacheError, CachePolicy, Clock, LinkCacheStore, ManualClock,
        MemoryStore,
    },
    config::SiteSettings,
    infra::app::{AppParts, ApplicationContext, build_application_context},
    infra::http::build_router,
    upstream::{LinkSource, ListQuery, UpstreamError},
};
use pockets_api_types::{
    LinkDetailsResponse, LinkId, LinkItem, LinksResponse, NewValue, PageMeta, ProjectDetails,
};
use time::OffsetDateTime;
use time::macros::datetime;
use tower::ServiceExt;
use url::Url;

pub const PIN: &str = "4242";

/// In-memory upstream that records every call.
#[derive(Default)]
pub struct StubSource {
    pub list_calls: AtomicUsize,
    pub queries: Mutex<Vec<ListQuery>>,
    pub names: Mutex<Vec<String>>,
    pub created: Mutex<Vec<NewValue>>,
    pub comments: Mutex<Vec<NewValue>>,
    pub fail: AtomicBool,
}

impl StubSource {
    pub fn with_links(names: &[&str]) -> Arc<Self> {
        let source = Self::default();
        source.set_links(names);
        Arc::new(source)
    }

    pub fn set_links(&self, names: &[&str]) {
        *self.names.lock().expect("names lock") = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn item(idx: usize, name: &str) -> LinkItem {
        LinkItem {
            id: LinkId::Number(idx as i64 + 1),
            name: name.to_string(),
            slug: name.to_lowercase(),
            value: format!("https://{}.example/", name.to_lowercase()),
            kind: "url".to_string(),
            created_at: Some("2024-01-02T03:04:05Z".to_string()),
            updated_at: None,
        }
    }

    fn unavailable() -> UpstreamError {
        UpstreamError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
        }
    }
}

#[async_trait]
impl LinkSource for StubSource {
    async fn list_links(&self, query: &ListQuery) -> Result<LinksResponse, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().expect("queries lock").push(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let names = self.names.lock().expect("names lock").clone();
        let data: Vec<LinkItem> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| Self::item(idx, name))
            .collect();
        Ok(LinksResponse {
            meta: PageMeta {
                current_page: query.page.unwrap_or(1),
                last_page: 1,
                per_page: query.per_page.unwrap_or(15),
                total: Some(data.len() as u64),
                ..Default::default()
            },
            data,
            ..Default::default()
        })
    }

    async fn link_by_slug(&self, slug: &str) -> Result<LinkDetailsResponse, UpstreamError> {
        let names = self.names.lock().expect("names lock").clone();
        let Some((idx, name)) = names
            .iter()
            .enumerate()
            .find(|(_, name)| name.to_lowercase() == slug)
        else {
            return Err(UpstreamError::Status {
                status: 404,
                reason: "Not Found".to_string(),
            });
        };
        Ok(LinkDetailsResponse {
            data: Self::item(idx, name),
            project: ProjectDetails {
                id: LinkId::Number(1),
                name: "Pockets".to_string(),
                slug: "pockets".to_string(),
                description: None,
                status: "active".to_string(),
                created_at: None,
                updated_at: None,
            },
        })
    }

    async fn comments(&self, _link_id: &LinkId) -> Result<LinksResponse, UpstreamError> {
        Ok(LinksResponse::default())
    }

    async fn post_comment(&self, comment: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        self.comments.lock().expect("comments lock").push(comment.clone());
        Ok(serde_json::json!({ "data": { "slug": comment.slug } }))
    }

    async fn create_link(&self, link: &NewValue) -> Result<serde_json::Value, UpstreamError> {
        self.created.lock().expect("created lock").push(link.clone());
        Ok(serde_json::json!({ "data": { "slug": link.slug } }))
    }
}

/// Link cache whose backend never answers.
pub struct FailingStore {
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl FailingStore {
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    fn down() -> CacheError {
        CacheError::Unavailable(redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

#[async_trait]
impl LinkCacheStore for FailingStore {
    async fn get(&self) -> Result<Option<CacheEntry>, CacheError> {
        Err(Self::down())
    }

    async fn set(&self, _data: Arc<LinksResponse>) -> Result<CacheEntry, CacheError> {
        Err(Self::down())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(Self::down())
    }

    fn generation(&self) -> u64 {
        0
    }

    async fn set_if_generation(
        &self,
        _data: Arc<LinksResponse>,
        _generation: u64,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Decode("unwritable record".to_string()))
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

pub struct TestApp {
    pub router: Router,
    pub source: Arc<StubSource>,
    pub clock: Arc<ManualClock>,
    pub context: ApplicationContext,
}

impl TestApp {
    pub fn new(source: Arc<StubSource>) -> Self {
        Self::with_store(source, |policy, clock| -> Arc<dyn LinkCacheStore> {
            Arc::new(MemoryStore::new(policy, clock))
        })
    }

    pub fn with_store(
        source: Arc<StubSource>,
        store: impl FnOnce(CachePolicy, Arc<dyn Clock>) -> Arc<dyn LinkCacheStore>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00:00 UTC)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let cache = CacheConfig::default();
        let store = store(cache.policy(), dyn_clock.clone());

        let context = build_application_context(AppParts {
            source: source.clone(),
            store,
            clock: dyn_clock,
            cache,
            site: SiteSettings {
                url: Url::parse("https://pockets.test").expect("site url"),
                title: "Pockets".to_string(),
                description: "A collection of curated links".to_string(),
            },
            admin_pin: Some(PIN.to_string()),
            metadata_timeout: Duration::from_secs(2),
        })
        .expect("application context");

        Self {
            router: build_router(context.state.clone()),
            source,
            clock,
            context,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    /// Wait for a detached refresh to reach the upstream.
    pub async fn wait_for_list_calls(&self, expected: usize) {
        for _ in 0..200 {
            if self.source.list_calls() >= expected {
                // Let the refresh task finish writing the store
                tokio::time::sleep(Duration::from_millis(5)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {expected} upstream list calls, saw {}",
            self.source.list_calls()
        );
    }
}

pub fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("json body")
}
