use serde::Serialize;

use crate::core::channels::{ChannelStatus, ChannelType, MessageDirection};

/// A messaging channel row. The sealed credentials blob and the webhook
/// secret never leave the process through serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub name: String,
    pub status: ChannelStatus,
    pub webhook_url: String,
    #[serde(skip_serializing)]
    pub webhook_secret: String,
    #[serde(skip_serializing)]
    pub credentials: String,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessageRecord {
    pub id: String,
    pub channel_id: String,
    pub direction: MessageDirection,
    pub external_id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppChannelRecord {
    pub app_id: String,
    pub channel_id: String,
    pub enabled: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTokenRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
}
