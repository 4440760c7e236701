use serde::{Deserialize, Serialize};

/// `{"message": ...}`, used by the health check and every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub data: String,
    pub key: String,
}
