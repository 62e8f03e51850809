//! Public inbound endpoint for all messaging platforms. Requests are
//! authenticated by per-platform signatures instead of bearer tokens.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::super::AppState;
use super::super::error::ApiError;
use crate::core::channels::signature::{constant_time_eq, verify_channel_signature};
use crate::core::channels::{ChannelType, parse_inbound_message};
use crate::core::store::types::ChannelRecord;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn load_channel(state: &AppState, id: &str) -> Result<ChannelRecord, ApiError> {
    state
        .channels
        .find(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))
}

/// Platform handshakes: WhatsApp's hub challenge and Telegram's liveness
/// check. Other platforms have no GET verification.
pub async fn webhook_verify_endpoint(
    Path(channel_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let channel = load_channel(&state, &channel_id).await?;

    match channel.channel_type {
        ChannelType::Whatsapp => {
            let config = state.channels.credentials(&channel)?;
            let expected = config
                .get("verifyToken")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mode = query.get("hub.mode").map(String::as_str);
            let token = query.get("hub.verify_token").map(String::as_str);

            match (mode, token) {
                (Some("subscribe"), Some(token))
                    if !expected.is_empty()
                        && constant_time_eq(token.as_bytes(), expected.as_bytes()) =>
                {
                    info!("WhatsApp webhook verified for channel {}", channel.id);
                    let challenge = query.get("hub.challenge").cloned().unwrap_or_default();
                    Ok((StatusCode::OK, challenge).into_response())
                }
                _ => {
                    warn!("WhatsApp webhook verification failed for channel {}", channel.id);
                    Err(ApiError::Forbidden("Verification failed".to_string()))
                }
            }
        }
        ChannelType::Telegram => Ok((StatusCode::OK, "ok").into_response()),
        other => Err(ApiError::MethodNotAllowed(format!(
            "{} webhooks do not support GET verification",
            other
        ))),
    }
}

/// Decode a delivery body. Twilio posts form fields; everything else is
/// JSON. Undecodable bodies become `null` and parse to empty content.
fn decode_payload(headers: &HeaderMap, body: &[u8]) -> Value {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        let fields: Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Value::Object(fields);
    }
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

pub async fn webhook_receive_endpoint(
    Path(channel_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let channel = load_channel(&state, &channel_id).await?;
    if !channel.status.accepts_deliveries() {
        return Err(ApiError::Conflict(format!(
            "Channel is {} and not accepting messages",
            channel.status
        )));
    }

    let config = state.channels.credentials(&channel)?;
    if !verify_channel_signature(
        channel.channel_type,
        &headers,
        &body,
        &config,
        &channel.webhook_secret,
        now_secs(),
    ) {
        warn!(
            "Rejected {} webhook for channel {}: invalid signature",
            channel.channel_type, channel.id
        );
        state
            .channels
            .record_error(&channel.id, "Invalid webhook signature")
            .await;
        return Err(ApiError::Unauthorized("Invalid signature".to_string()));
    }

    let payload = decode_payload(&headers, &body);

    if channel.channel_type == ChannelType::Slack
        && payload.get("type").and_then(Value::as_str) == Some("url_verification")
    {
        let challenge = payload.get("challenge").cloned().unwrap_or(Value::Null);
        return Ok(Json(json!({ "challenge": challenge })).into_response());
    }

    let message = parse_inbound_message(channel.channel_type, &payload);
    if message.content.trim().is_empty() {
        return Ok(Json(json!({ "success": true, "ignored": true })).into_response());
    }

    let record = state.channels.record_inbound(&channel, &message).await?;
    info!(
        "Received {} message {} on channel {}",
        channel.channel_type, record.id, channel.id
    );
    Ok(Json(json!({ "success": true, "messageId": record.id })).into_response())
}
