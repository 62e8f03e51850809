use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::core::channels::ChannelError;
use crate::core::generation::GenerationError;

/// Every failure a handler can return, mapped onto one JSON error shape:
/// `{"error": "..."}` plus `details` for validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation { message, details } => {
                (status, Json(json!({ "error": message, "details": details }))).into_response()
            }
            Self::RateLimited { retry_after_secs } => {
                let mut response =
                    (status, Json(json!({ "error": "Too many requests" }))).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Validation(details) => Self::validation("Validation failed", details),
            GenerationError::NotFound(_) => Self::NotFound("Generation not found".to_string()),
            e @ GenerationError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            GenerationError::Store(e) => Self::Internal(e),
        }
    }
}

impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::InvalidConfig(details) => {
                Self::validation("Invalid channel configuration", details)
            }
            ChannelError::NotFound(_) => Self::NotFound("Channel not found".to_string()),
            ChannelError::AppNotFound(_) => Self::NotFound("App not found".to_string()),
            e @ (ChannelError::NameRequired | ChannelError::InvalidStatus(_)) => {
                Self::validation("Validation failed", vec![e.to_string()])
            }
            ChannelError::Store(e) => Self::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("Invalid request body", vec![rejection.body_text()])
    }
}
