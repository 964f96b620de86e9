pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

use crate::infra::http::RouterState;

/// JSON surface, mounted under `/api`.
pub fn build_api_router() -> Router<RouterState> {
    Router::new()
        .route("/", get(handlers::hello))
        .route("/links", get(handlers::list_links))
        .route("/details/{slug}", get(handlers::link_details))
        .route("/comments", post(handlers::create_comment))
        .route("/comments/{id}", get(handlers::link_comments))
        .route("/admin/verify", post(handlers::verify_admin))
        .route("/admin/links", post(handlers::create_link))
        .route("/metadata", get(handlers::metadata))
        .route("/cache/status", get(handlers::cache_status))
        .route(
            "/cache/refresh",
            get(handlers::refresh_cache).post(handlers::refresh_cache_with),
        )
        .route(
            "/revalidate",
            post(handlers::revalidate).get(handlers::revalidate_query),
        )
}
