use axum::Json;

use crate::models::MessageResponse;

/// GET /health
pub async fn health_check() -> Json<MessageResponse> {
    Json(MessageResponse::new("OK"))
}
