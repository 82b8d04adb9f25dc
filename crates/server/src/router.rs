//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Build the control-surface router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", post(api::ping))
        .route("/sources", get(api::list_sources).post(api::create_sources))
        .route("/sources/{name}", delete(api::delete_source))
        .route("/sources/{name}/upload", post(api::upload_stream))
        .route("/sources/{name}/upload-url", post(api::upload_by_url))
        .route(
            "/pipelines/{pipeline}/sources/{source}/start",
            post(api::start_api),
        )
        .route(
            "/pipelines/{pipeline}/sources/{source}/stop",
            post(api::stop_api),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
