use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use pockets_api_types::{CommentRequest, CreateLinkRequest, LinkId};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        admin::{AdminError, AdminService},
        details::{DetailError, DetailService},
        error::ErrorReport,
        links::LinkListingService,
        syndication::{FEED_ERROR_BODY, FEED_MAX_AGE, SyndicationService},
    },
    cache::{Clock, PageCacheState, page_cache_layer},
    config::SiteSettings,
    presentation::views::{
        AdminTemplate, AdminView, DetailTemplate, DetailView, ErrorPageView, ErrorTemplate,
        IndexTemplate, IndexView, LayoutContext, render_not_found_response,
        render_template_response, render_uncached_response,
    },
    upstream::ListQuery,
};

use super::{
    RouterState,
    api::build_api_router,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<LinkListingService>,
    pub details: Arc<DetailService>,
    pub admin: Arc<AdminService>,
    pub syndication: Arc<SyndicationService>,
    pub site: Arc<SiteSettings>,
    pub page_cache: PageCacheState,
    pub clock: Arc<dyn Clock>,
}

pub fn build_router(state: RouterState) -> Router {
    // Rendered pages that the invalidation endpoint can drop
    let cached_routes = Router::new()
        .route("/", get(index))
        .route("/rss.xml", get(rss_feed))
        .route("/feed", get(rss_feed))
        .route("/{slug}", get(link_detail))
        .layer(middleware::from_fn_with_state(
            state.http.page_cache.clone(),
            page_cache_layer,
        ));

    let dynamic_routes = Router::new()
        .route("/hq", get(admin_page).post(admin_submit))
        .route("/{slug}/comments", post(comment_submit))
        .route("/_health", get(health));

    cached_routes
        .merge(dynamic_routes)
        .nest("/api", build_api_router())
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    link_id: String,
    name: String,
    comment: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdminForm {
    pin: String,
    name: Option<String>,
    slug: Option<String>,
    value: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl AdminForm {
    fn has_link(&self) -> bool {
        self.name.is_some() || self.slug.is_some() || self.value.is_some()
    }
}

async fn index(
    State(state): State<HttpState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let query = query.map(|Query(query)| query).unwrap_or_default();
    let search = query.search.clone();

    match state.listing.list(query).await {
        Ok(listing) => {
            let content = IndexView::from_page(&listing.page, search.as_deref());
            let view = LayoutContext::new(&state.site, "/", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => {
            warn!(error = %err, "Rendering link list without data");
            let content = IndexView::unavailable(search.as_deref());
            let view = LayoutContext::new(&state.site, "/", content);
            render_uncached_response(IndexTemplate { view }, StatusCode::OK)
        }
    }
}

async fn link_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.details.page(&slug).await {
        Ok(page) => {
            let content = DetailView::from_page(&page);
            let view = LayoutContext::new(&state.site, &detail_path(&state.site, &slug), content)
                .with_title(&page.link.data.name)
                .with_description(&page.link.data.value);
            render_template_response(DetailTemplate { view }, StatusCode::OK)
        }
        Err(DetailError::NotFound) => render_not_found_response(&state.site),
        Err(err) => unavailable_page(&state.site, "infra::http::public::link_detail", &err),
    }
}

async fn comment_submit(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let link_id = form.link_id.trim();
    let request = CommentRequest {
        link_id: (!link_id.is_empty()).then(|| parse_link_id(link_id)),
        name: Some(form.name),
        comment: Some(form.comment),
        slug: Some(slug.clone()),
    };

    match state.details.post_comment(request).await {
        Ok(_) => Redirect::to(&detail_path(&state.site, &slug)).into_response(),
        Err(DetailError::MissingFields) => {
            let page = match state.details.page(&slug).await {
                Ok(page) => page,
                Err(DetailError::NotFound) => return render_not_found_response(&state.site),
                Err(err) => {
                    return unavailable_page(
                        &state.site,
                        "infra::http::public::comment_submit",
                        &err,
                    );
                }
            };
            let mut content = DetailView::from_page(&page);
            content.comment_error = Some("Please write a comment before posting.".to_string());
            let view = LayoutContext::new(&state.site, &detail_path(&state.site, &slug), content)
                .with_title(&page.link.data.name);
            render_uncached_response(DetailTemplate { view }, StatusCode::BAD_REQUEST)
        }
        Err(err) => unavailable_page(&state.site, "infra::http::public::comment_submit", &err),
    }
}

async fn admin_page(State(state): State<HttpState>) -> Response {
    let view = LayoutContext::new(&state.site, "/hq", AdminView::locked(None)).with_title("HQ");
    render_uncached_response(AdminTemplate { view }, StatusCode::OK)
}

async fn admin_submit(State(state): State<HttpState>, Form(form): Form<AdminForm>) -> Response {
    const SOURCE: &str = "infra::http::public::admin_submit";

    if !form.has_link() {
        return match state.admin.verify(&form.pin) {
            Ok(()) => admin_response(&state.site, AdminView::unlocked(form.pin), StatusCode::OK),
            Err(err) => admin_failure(&state.site, SOURCE, AdminView::locked(None), err),
        };
    }

    let name = form.name.clone().unwrap_or_default();
    let request = CreateLinkRequest {
        pin: form.pin.clone(),
        name: name.clone(),
        slug: form.slug.unwrap_or_default(),
        value: form.value.unwrap_or_default(),
        kind: form.kind.unwrap_or_default(),
    };

    match state.admin.create_link(request).await {
        Ok(_) => {
            let mut view = AdminView::unlocked(form.pin);
            view.notice = Some(format!("Added {}.", name.trim()));
            admin_response(&state.site, view, StatusCode::CREATED)
        }
        Err(err @ (AdminError::Unauthorized | AdminError::NotConfigured)) => {
            admin_failure(&state.site, SOURCE, AdminView::locked(None), err)
        }
        Err(err) => admin_failure(&state.site, SOURCE, AdminView::unlocked(form.pin), err),
    }
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    match state.syndication.rss_feed(state.clock.now()).await {
        Ok(xml) => (
            [
                (CONTENT_TYPE, "application/xml".to_string()),
                (CACHE_CONTROL, format!("public, max-age={FEED_MAX_AGE}")),
            ],
            xml,
        )
            .into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "application/xml")],
                FEED_ERROR_BODY,
            )
                .into_response();
            ErrorReport::from_error(
                "infra::http::public::rss_feed",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn admin_response(site: &SiteSettings, content: AdminView, status: StatusCode) -> Response {
    let view = LayoutContext::new(site, "/hq", content).with_title("HQ");
    render_uncached_response(AdminTemplate { view }, status)
}

fn admin_failure(
    site: &SiteSettings,
    source: &'static str,
    mut content: AdminView,
    err: AdminError,
) -> Response {
    let status = err.status();
    content.error = Some(err.to_string());
    let mut response = admin_response(site, content, status);
    ErrorReport::from_error(source, status, &err).attach(&mut response);
    response
}

fn unavailable_page(
    site: &SiteSettings,
    source: &'static str,
    err: &dyn std::error::Error,
) -> Response {
    let view = LayoutContext::new(site, "/", ErrorPageView::unavailable());
    let mut response = render_uncached_response(ErrorTemplate { view }, StatusCode::BAD_GATEWAY);
    ErrorReport::from_error(source, StatusCode::BAD_GATEWAY, err).attach(&mut response);
    response
}

fn parse_link_id(raw: &str) -> LinkId {
    match raw.parse::<i64>() {
        Ok(number) => LinkId::Number(number),
        Err(_) => LinkId::Text(raw.to_string()),
    }
}

/// Percent-encoded `/{slug}`.
fn detail_path(site: &SiteSettings, slug: &str) -> String {
    let mut url = site.url.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.clear().push(slug);
        }
        Err(()) => return format!("/{slug}"),
    }
    url.path().to_string()
}
