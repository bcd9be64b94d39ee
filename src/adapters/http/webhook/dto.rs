//! Response bodies for the webhook and health endpoints.
//!
//! Shapes are fixed by what Stripe and existing monitoring expect.

use serde::{Deserialize, Serialize};

/// `{"message": ...}` bodies: invalid signature and duplicate delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn invalid_signature() -> Self {
        Self {
            message: "Invalid signature".to_string(),
        }
    }

    pub fn already_processed() -> Self {
        Self {
            message: "Event already processed".to_string(),
        }
    }
}

/// `{"status": ...}` bodies, with a message on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn processing_failed() -> Self {
        Self {
            status: "error".to_string(),
            message: Some("Processing failed".to_string()),
        }
    }
}

/// `GET /api/health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: String,
}
