use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::metrics::render_metrics;

/// GET /metrics
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        render_metrics(),
    )
}
