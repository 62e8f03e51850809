use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::ApiError;
use crate::core::channels::{
    ChannelDisplayInfo, ChannelType, CreateChannel, CreatedChannel, UpdateChannel,
    get_channel_display_info,
};
use crate::core::store::types::{AppChannelRecord, ChannelMessageRecord, ChannelRecord};

const DEFAULT_MESSAGE_LIMIT: usize = 50;
const MAX_MESSAGE_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTypeInfo {
    #[serde(rename = "type")]
    channel_type: ChannelType,
    #[serde(flatten)]
    display: ChannelDisplayInfo,
    required_fields: &'static [&'static str],
}

pub async fn channel_types_endpoint() -> Json<Vec<ChannelTypeInfo>> {
    Json(
        ChannelType::ALL
            .iter()
            .map(|t| ChannelTypeInfo {
                channel_type: *t,
                display: get_channel_display_info(*t),
                required_fields: t.required_fields(),
            })
            .collect(),
    )
}

pub async fn list_channels_endpoint(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let channels = state.channels.list(&user_id).await?;
    Ok(Json(json!({ "channels": channels })))
}

pub async fn create_channel_endpoint(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<CreateChannel>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedChannel>), ApiError> {
    let Json(payload) = payload?;
    let created = state.channels.create(&user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_channel_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<ChannelRecord>, ApiError> {
    Ok(Json(state.channels.get(&user_id, &id).await?))
}

pub async fn update_channel_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<UpdateChannel>, JsonRejection>,
) -> Result<Json<ChannelRecord>, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(state.channels.update(&user_id, &id, payload).await?))
}

pub async fn delete_channel_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.channels.delete(&user_id, &id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    limit: Option<usize>,
}

pub async fn channel_messages_endpoint(
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<ChannelMessageRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT);
    Ok(Json(state.channels.messages(&user_id, &id, limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAppRequest {
    app_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleAppRequest {
    enabled: bool,
}

pub async fn list_channel_apps_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<AppChannelRecord>>, ApiError> {
    Ok(Json(state.channels.app_links(&user_id, &id).await?))
}

pub async fn link_app_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<LinkAppRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppChannelRecord>), ApiError> {
    let Json(payload) = payload?;
    let link = state
        .channels
        .link_app(&user_id, &id, payload.app_id.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn toggle_app_endpoint(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<ToggleAppRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(payload) = payload?;
    state
        .channels
        .set_app_enabled(&user_id, &id, &app_id, payload.enabled)
        .await?;
    Ok(Json(json!({ "success": true, "enabled": payload.enabled })))
}

pub async fn unlink_app_endpoint(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.channels.unlink_app(&user_id, &id, &app_id).await?;
    Ok(Json(json!({ "success": true })))
}
