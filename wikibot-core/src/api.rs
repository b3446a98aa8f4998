use serde::{Deserialize, Serialize};

/// Body of `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Omit to start a new conversation.
    pub session_id: Option<uuid::Uuid>,
    pub message: String,
}

/// Envelope wrapping every JSON response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl ApiResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
