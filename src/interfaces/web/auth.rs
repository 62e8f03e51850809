use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::AppState;
use super::error::ApiError;
use crate::core::ratelimit::RateDecision;

/// The user a bearer token resolved to, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(raw_token) = bearer_token(req.headers()) else {
        return ApiError::Unauthorized(
            "Missing or invalid Authorization header. Use: Bearer <token>".to_string(),
        )
        .into_response();
    };

    let resolved = state.store.resolve_api_token(raw_token).await;
    match resolved {
        Ok(Some(user_id)) => {
            req.extensions_mut().insert(AuthUser(user_id));
            next.run(req).await
        }
        Ok(None) => {
            ApiError::Unauthorized("Invalid or unauthorized API token".to_string()).into_response()
        }
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = state.rate_limiter.key_for(req.headers(), req.extensions());
    match state.rate_limiter.check(&key).await {
        RateDecision::Allowed { .. } => next.run(req).await,
        RateDecision::Limited { retry_after_secs } => {
            warn!("Rate limit exceeded for {}", key);
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
