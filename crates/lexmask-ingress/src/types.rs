//! Shared ingress types and utilities

use lexmask_pii::PiiError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request ID for tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new request ID
    pub fn generate() -> Self {
        Self(format!("req_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ingress error types
#[derive(Debug, Error)]
pub enum IngressError {
    /// Invalid request format or values
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Input text above the configured cap
    #[error("Text too long (max {max} characters, got {len})")]
    TextTooLong { len: usize, max: usize },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngressError {
    /// Short label used for the failure metric
    pub fn error_type(&self) -> &'static str {
        match self {
            IngressError::InvalidRequest(_) => "invalid_request",
            IngressError::TextTooLong { .. } => "text_too_long",
            IngressError::Internal(_) => "internal",
        }
    }
}

impl From<PiiError> for IngressError {
    fn from(err: PiiError) -> Self {
        match err {
            PiiError::TextTooLong { len, max } => IngressError::TextTooLong { len, max },
            err if err.is_client_error() => IngressError::InvalidRequest(err.to_string()),
            err => IngressError::Internal(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for IngressError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, error_type) = match &self {
            IngressError::InvalidRequest(_) | IngressError::TextTooLong { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            IngressError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        };

        let message = match self {
            IngressError::InvalidRequest(msg) | IngressError::Internal(msg) => msg,
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Ingress result type
pub type IngressResult<T> = Result<T, IngressError>;
