//! Wire types for the `/ragbot` endpoint.

use serde::{Deserialize, Serialize};

/// Query string of `GET /ragbot`.
#[derive(Debug, Default, Deserialize)]
pub struct RagbotQuery {
    pub prompt: Option<String>,
}

/// Successful reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagbotResponse {
    pub success: bool,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl RagbotResponse {
    pub fn new(prompt: impl Into<String>, response: Option<String>) -> Self {
        Self {
            success: true,
            prompt: prompt.into(),
            response,
        }
    }
}

/// Body of every 500 reply.
///
/// `error` is only present when the failure had a known type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: "Internal Server Error".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn unknown() -> Self {
        Self {
            success: false,
            message: "An unknown error occurred".to_string(),
            error: None,
        }
    }
}
