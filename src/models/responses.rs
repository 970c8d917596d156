use serde::{Deserialize, Serialize};

/// Acknowledgement for an ingested event.
///
/// Recoverable problems (validation failures, stale display handles) are
/// reported here with `accepted: false`; the user has already been
/// re-prompted through the delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAck {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EventAck {
    pub fn ok() -> Self {
        Self { accepted: true, detail: None }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self { accepted: false, detail: Some(detail.into()) }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
