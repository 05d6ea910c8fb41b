//! API error taxonomy
//!
//! Every error maps to a JSON body with a human-readable `error` message
//! and a stable machine-readable `kind`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many verification attempts. Please try again tomorrow.")]
    RateLimited { retry_after: i64 },

    #[error("Provider error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable kind for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotAuthenticated => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Upstream(_) => "upstream",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::RateLimited { retry_after } => json!({
                "error": self.to_string(),
                "kind": self.kind(),
                "retry_after": retry_after,
            }),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({
                    "error": "Internal server error",
                    "kind": self.kind(),
                })
            }
            ApiError::Upstream(msg) => {
                tracing::warn!("Upstream provider error: {}", msg);
                json!({
                    "error": self.to_string(),
                    "kind": self.kind(),
                })
            }
            _ => json!({
                "error": self.to_string(),
                "kind": self.kind(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
