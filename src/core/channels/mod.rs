//! Messaging channel abstraction: per-platform config rules, webhook
//! addressing, inbound parsing, outbound formatting and signature checks for
//! the eight supported platforms.

pub mod inbound;
pub mod manager;
pub mod outbound;
pub mod signature;

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::validation::ValidationResult;

pub use inbound::parse_inbound_message;
pub use manager::{ChannelManager, CreateChannel, CreatedChannel, UpdateChannel};
pub use outbound::format_outbound_message;

pub const WEBHOOK_PATH_PREFIX: &str = "/api/openclaw/webhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Slack,
    Discord,
    Whatsapp,
    Teams,
    Email,
    WebChat,
    Sms,
    Telegram,
}

impl ChannelType {
    pub const ALL: [ChannelType; 8] = [
        ChannelType::Slack,
        ChannelType::Discord,
        ChannelType::Whatsapp,
        ChannelType::Teams,
        ChannelType::Email,
        ChannelType::WebChat,
        ChannelType::Sms,
        ChannelType::Telegram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Slack => "SLACK",
            ChannelType::Discord => "DISCORD",
            ChannelType::Whatsapp => "WHATSAPP",
            ChannelType::Teams => "TEAMS",
            ChannelType::Email => "EMAIL",
            ChannelType::WebChat => "WEB_CHAT",
            ChannelType::Sms => "SMS",
            ChannelType::Telegram => "TELEGRAM",
        }
    }

    pub fn from_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Config keys that must hold a non-empty string for this platform.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            ChannelType::Slack => &["botToken", "signingSecret", "channelId"],
            ChannelType::Discord => &["botToken", "applicationId", "publicKey"],
            ChannelType::Whatsapp => &["phoneNumberId", "accessToken", "verifyToken"],
            ChannelType::Teams => &["appId", "appPassword"],
            ChannelType::Email => &["fromAddress", "apiKey"],
            ChannelType::WebChat => &[],
            ChannelType::Sms => &["accountSid", "authToken", "phoneNumber"],
            ChannelType::Telegram => &["botToken"],
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Pending,
    Configuring,
    Active,
    Paused,
    Failed,
    Disconnected,
}

impl ChannelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelStatus::Pending => "PENDING",
            ChannelStatus::Configuring => "CONFIGURING",
            ChannelStatus::Active => "ACTIVE",
            ChannelStatus::Paused => "PAUSED",
            ChannelStatus::Failed => "FAILED",
            ChannelStatus::Disconnected => "DISCONNECTED",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ChannelStatus::Pending),
            "CONFIGURING" => Some(ChannelStatus::Configuring),
            "ACTIVE" => Some(ChannelStatus::Active),
            "PAUSED" => Some(ChannelStatus::Paused),
            "FAILED" => Some(ChannelStatus::Failed),
            "DISCONNECTED" => Some(ChannelStatus::Disconnected),
            _ => None,
        }
    }

    /// Whether webhook deliveries are accepted in this state.
    pub fn accepts_deliveries(self) -> bool {
        !matches!(self, ChannelStatus::Pending | ChannelStatus::Disconnected)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageDirection::Inbound => "INBOUND",
            MessageDirection::Outbound => "OUTBOUND",
        }
    }

    pub fn from_direction(value: &str) -> Option<Self> {
        match value {
            "INBOUND" => Some(MessageDirection::Inbound),
            "OUTBOUND" => Some(MessageDirection::Outbound),
            _ => None,
        }
    }
}

/// Platform-neutral view of a single message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMessage {
    pub content: String,
    pub sender_id: String,
    pub channel_ref: String,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDisplayInfo {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid channel config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
    #[error("channel {0} not found")]
    NotFound(String),
    #[error("generated app {0} not found")]
    AppNotFound(String),
    #[error("channel name is required")]
    NameRequired,
    #[error("channel status cannot be set to {0}")]
    InvalidStatus(ChannelStatus),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub fn get_channel_display_info(channel_type: ChannelType) -> ChannelDisplayInfo {
    match channel_type {
        ChannelType::Slack => ChannelDisplayInfo {
            name: "Slack",
            icon: "slack",
            color: "#4A154B",
            description: "Connect your app to Slack workspaces",
        },
        ChannelType::Discord => ChannelDisplayInfo {
            name: "Discord",
            icon: "discord",
            color: "#5865F2",
            description: "Engage with patients through Discord servers",
        },
        ChannelType::Whatsapp => ChannelDisplayInfo {
            name: "WhatsApp",
            icon: "whatsapp",
            color: "#25D366",
            description: "Reach patients on WhatsApp Business",
        },
        ChannelType::Teams => ChannelDisplayInfo {
            name: "Microsoft Teams",
            icon: "teams",
            color: "#6264A7",
            description: "Integrate with Microsoft Teams for care coordination",
        },
        ChannelType::Email => ChannelDisplayInfo {
            name: "Email",
            icon: "mail",
            color: "#EA4335",
            description: "Send and receive messages over email",
        },
        ChannelType::WebChat => ChannelDisplayInfo {
            name: "Web Chat",
            icon: "message-circle",
            color: "#0EA5E9",
            description: "Embed a chat widget in your web app",
        },
        ChannelType::Sms => ChannelDisplayInfo {
            name: "SMS",
            icon: "smartphone",
            color: "#F22F46",
            description: "Text patients through Twilio SMS",
        },
        ChannelType::Telegram => ChannelDisplayInfo {
            name: "Telegram",
            icon: "send",
            color: "#26A5E4",
            description: "Chat with patients through a Telegram bot",
        },
    }
}

/// Check the platform-specific required fields of a channel config.
pub fn validate_channel_config(channel_type: ChannelType, config: &Value) -> ValidationResult {
    let display = get_channel_display_info(channel_type);
    let Some(object) = config.as_object() else {
        return ValidationResult::from_errors(vec![format!(
            "Configuration for {} must be an object",
            display.name
        )]);
    };

    let errors = channel_type
        .required_fields()
        .iter()
        .filter(|field| {
            !object
                .get(**field)
                .and_then(Value::as_str)
                .is_some_and(|v| !v.trim().is_empty())
        })
        .map(|field| format!("{} is required for {}", field, display.name))
        .collect();

    ValidationResult::from_errors(errors)
}

pub fn generate_webhook_url(channel_id: &str, base_url: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        WEBHOOK_PATH_PREFIX,
        channel_id
    )
}

/// 32 random bytes, hex encoded.
pub fn generate_webhook_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
