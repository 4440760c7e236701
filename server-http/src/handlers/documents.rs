use crate::error::ApiError;
use crate::metrics::{record_document_created, record_document_read};
use crate::models::{CreatedResponse, DocumentResponse};
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        StatusCode,
    },
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use shared::Error;
use stash::Document;
use tracing::{info, warn};

/// Multipart form field carrying the document
const FORM_FIELD: &str = "data";

/// POST /documents
pub async fn create_document(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<CreatedResponse>, ApiError> {
    let content = read_body(request).await?;
    let document = store(&state, content).await?;

    info!(key = %document.key, "Added document");
    Ok(Json(CreatedResponse { key: document.key }))
}

/// POST|PUT /log
///
/// Same as `POST /documents` but answers with a plain-text link.
pub async fn create_log_document(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let content = read_body(request).await?;
    let document = store(&state, content).await?;

    info!(key = %document.key, "Added document with log link");
    Ok((
        [(CONTENT_TYPE, "text/plain")],
        format!("\nhttps://{}/{}\n\n", host, document.key),
    ))
}

/// GET|HEAD /documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = fetch(&state, &id).await?;

    info!(key = %document.key, "Retrieved document");
    Ok(Json(DocumentResponse {
        data: document.data,
        key: document.key,
    }))
}

/// GET|HEAD /raw/:id
pub async fn get_raw_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = fetch(&state, &id).await?;

    info!(key = %document.key, "Retrieved raw document");
    Ok(([(CONTENT_TYPE, "text/plain; charset=UTF-8")], document.data))
}

/// Drops any extension, so `/documents/abc.txt` reads `abc`
fn key_from_id(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

async fn store(state: &AppState, content: String) -> Result<Document, ApiError> {
    let document = state.documents.create(content).await.map_err(|err| {
        if let Error::TooLarge { length, max } = &err {
            info!(length, max, "Document exceeds max length");
        }
        ApiError::from(err)
    })?;

    record_document_created();
    Ok(document)
}

async fn fetch(state: &AppState, id: &str) -> Result<Document, ApiError> {
    let key = key_from_id(id);
    let document = state.documents.fetch(key).await.map_err(|err| {
        if err.is_not_found() {
            info!(key, "Document not found");
        }
        ApiError::from(err)
    })?;

    record_document_read();
    Ok(document)
}

/// Document text from a raw body, or from the `data` field of a multipart form.
async fn read_body(request: Request) -> Result<String, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.contains("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?
        {
            if field.name() == Some(FORM_FIELD) {
                return field
                    .text()
                    .await
                    .map_err(|e| rejected(e.status(), e.body_text()));
            }
        }

        // A form without the field stores an empty document
        return Ok(String::new());
    }

    let bytes = Bytes::from_request(request, &())
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn rejected(status: StatusCode, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        info!("Document exceeds body limit");
        ApiError::PayloadTooLarge
    } else {
        warn!(%status, %detail, "Error reading request body");
        ApiError::UnreadableBody
    }
}
