use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header::CACHE_CONTROL};
use axum::response::{IntoResponse, Response};
use pockets_api_types::{
    CacheRefreshRequest, CacheStatusResponse, CommentRequest, CreateLinkRequest, LinkId,
    PinRequest, RevalidateRequest, RevalidateResponse,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::application::admin::AdminError;
use crate::application::error::HttpError;
use crate::application::invalidation::Invalidation;
use crate::upstream::{ListQuery, UpstreamError};

use super::state::ApiState;

/// Response header carrying the link cache outcome.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

const NO_STORE: &str = "no-store, max-age=0";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetadataQuery {
    pub url: Option<String>,
}

pub async fn hello() -> Json<serde_json::Value> {
    Json(json!({ "message": "Hello, World!" }))
}

pub async fn list_links(
    State(state): State<ApiState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::api::list_links";

    let Query(query) = query.map_err(|err| bad_request(SOURCE, "Invalid query parameters", &err))?;
    let listing = state
        .listing
        .list(query)
        .await
        .map_err(|err| upstream_failure(SOURCE, err))?;

    let mut response = Json(listing.page.as_ref()).into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(listing.cache.as_str()),
    );
    Ok(response)
}

pub async fn link_details(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    let details = state.details.detail(&slug).await?;
    Ok(with_cache_control(
        Json(details).into_response(),
        "public, max-age=3600",
    ))
}

pub async fn link_comments(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let link_id = match id.parse::<i64>() {
        Ok(number) => LinkId::Number(number),
        Err(_) => LinkId::Text(id),
    };
    let comments = state.details.comments(&link_id).await?;
    Ok(with_cache_control(
        Json(comments).into_response(),
        "public, max-age=300",
    ))
}

pub async fn create_comment(
    State(state): State<ApiState>,
    body: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(request) = body.map_err(|err| {
        bad_request("infra::http::api::create_comment", "Invalid JSON body", &err)
    })?;
    let stored = state.details.post_comment(request).await?;
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}

pub async fn verify_admin(
    State(state): State<ApiState>,
    body: Result<Json<PinRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, HttpError> {
    const SOURCE: &str = "infra::http::api::verify_admin";

    let Json(request) = body.map_err(|err| bad_request(SOURCE, "Verification failed", &err))?;
    match state.admin.verify(&request.pin) {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(AdminError::Unauthorized) => Err(HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Invalid PIN",
            "admin PIN mismatch",
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn create_link(
    State(state): State<ApiState>,
    body: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(request) = body.map_err(|err| {
        bad_request("infra::http::api::create_link", "Missing required fields", &err)
    })?;
    let created = state.admin.create_link(request).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn metadata(
    State(state): State<ApiState>,
    Query(query): Query<MetadataQuery>,
) -> Result<Response, HttpError> {
    let metadata = state.metadata.fetch(query.url.as_deref()).await?;
    Ok(Json(metadata).into_response())
}

pub async fn cache_status(State(state): State<ApiState>) -> Response {
    let body = CacheStatusResponse {
        success: true,
        timestamp: state.clock.now(),
        cache: state.listing.stats().await,
    };
    with_cache_control(Json(body).into_response(), NO_STORE)
}

/// Refresh the cached first page.
pub async fn refresh_cache(State(state): State<ApiState>) -> Result<Response, HttpError> {
    run_refresh(&state, CacheRefreshRequest::default()).await
}

/// Refresh with an optional `{page, per_page}` body.
pub async fn refresh_cache_with(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let request: CacheRefreshRequest = parse_optional_body(&body)
        .map_err(|err| bad_request("infra::http::api::refresh_cache", "Invalid JSON body", &err))?;
    run_refresh(&state, request).await
}

pub async fn revalidate(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<RevalidateResponse>, HttpError> {
    let request: RevalidateRequest = parse_optional_body(&body)
        .map_err(|err| bad_request("infra::http::api::revalidate", "Invalid JSON body", &err))?;
    let invalidation = Invalidation::parse(request)?;
    Ok(Json(state.invalidation.revalidate(invalidation).await))
}

/// `GET /api/revalidate?path=..&type=..&tag=..` for callers that cannot POST.
pub async fn revalidate_query(
    State(state): State<ApiState>,
    Query(request): Query<RevalidateRequest>,
) -> Result<Json<RevalidateResponse>, HttpError> {
    let invalidation = Invalidation::parse(request)?;
    Ok(Json(state.invalidation.revalidate(invalidation).await))
}

async fn run_refresh(state: &ApiState, request: CacheRefreshRequest) -> Result<Response, HttpError> {
    let report = state
        .listing
        .refresh(request)
        .await
        .map_err(|err| upstream_failure("infra::http::api::refresh_cache", err))?;
    Ok(with_cache_control(Json(report).into_response(), NO_STORE))
}

/// An empty body is the default request.
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
}

fn with_cache_control(mut response: Response, value: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(value));
    response
}

fn bad_request(
    source: &'static str,
    message: &'static str,
    err: &dyn std::error::Error,
) -> HttpError {
    HttpError::from_error(source, StatusCode::BAD_REQUEST, message, err)
}

/// Upstream failures surface as 500 with the upstream message.
fn upstream_failure(source: &'static str, err: UpstreamError) -> HttpError {
    HttpError::from_error(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        err.to_string(),
        &err,
    )
}
