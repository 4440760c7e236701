use crate::handlers;
use crate::metrics;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart framing on top of the document itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    metrics::init_metrics();

    let body_limit = match state.documents.max_length() {
        0 => DefaultBodyLimit::disable(),
        max => DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD)),
    };

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Prometheus scrape endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Document routes; GET also answers HEAD
        .route("/documents", post(handlers::create_document))
        .route("/documents/{id}", get(handlers::get_document))
        .route("/raw/{id}", get(handlers::get_raw_document))
        .route(
            "/log",
            post(handlers::create_log_document).put(handlers::create_log_document),
        )
        // Middleware
        .layer(body_limit)
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
