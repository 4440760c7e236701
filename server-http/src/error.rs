use crate::models::MessageResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::Error;
use tracing::error;

pub const NOT_FOUND_MESSAGE: &str = "Document not found.";
pub const TOO_LARGE_MESSAGE: &str = "Document exceeds maximum length.";
pub const UNREADABLE_BODY_MESSAGE: &str = "Error reading request body.";

/// Failure of a document request, rendered as `{"message": ...}`
#[derive(Debug)]
pub enum ApiError {
    Store(Error),
    /// The body hit the transport limit before it could be measured
    PayloadTooLarge,
    UnreadableBody,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Store(Error::NotFound) => {
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
            }
            ApiError::Store(Error::TooLarge { .. }) | ApiError::PayloadTooLarge => {
                (StatusCode::BAD_REQUEST, TOO_LARGE_MESSAGE.to_string())
            }
            ApiError::UnreadableBody => (
                StatusCode::INTERNAL_SERVER_ERROR,
                UNREADABLE_BODY_MESSAGE.to_string(),
            ),
            ApiError::Store(err) => {
                error!(error = %err, "Document request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}
