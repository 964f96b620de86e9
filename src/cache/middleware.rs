//! Rendered page cache middleware.
//!
//! Serves cached GET responses for public pages and stores fresh 200s.
//! Responses marked `Cache-Control: no-store` (the "no data" fallback) are
//! never stored.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::pages::{CachedPage, PageCache, PageKey, tags_for_path};
use super::{METRIC_PAGE_HIT, METRIC_PAGE_MISS};

/// Response header reporting the page cache outcome.
pub const PAGE_CACHE_HEADER: &str = "x-page-cache";

const MAX_CACHED_BODY: usize = 1024 * 1024;

#[derive(Clone)]
pub struct PageCacheState {
    pub pages: Arc<PageCache>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let key = PageKey::new(path.clone(), request.uri().query().unwrap_or(""));

    if let Some(cached) = cache.pages.get(&key) {
        debug!(cache = "page", outcome = "hit", "serving cached page");
        counter!(METRIC_PAGE_HIT).increment(1);
        return build_response(cached, "HIT");
    }

    debug!(cache = "page", outcome = "miss", "rendering page");
    counter!(METRIC_PAGE_MISS).increment(1);

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || is_no_store(&response) {
        return response;
    }

    // Bodies that may not fit are passed through uncached.
    if response
        .body()
        .size_hint()
        .upper()
        .is_none_or(|len| len > MAX_CACHED_BODY as u64)
    {
        debug!(cache = "page", "response too large to cache");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "Failed to buffer rendered page");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let tags: BTreeSet<String> = tags_for_path(&path);
    cache.pages.put(
        key,
        CachedPage {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
                .collect(),
            body: bytes.clone(),
            tags,
        },
    );

    parts
        .headers
        .insert(PAGE_CACHE_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

fn is_no_store(response: &Response) -> bool {
    response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("no-store"))
}

fn build_response(cached: CachedPage, outcome: &'static str) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .header(PAGE_CACHE_HEADER, outcome)
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
