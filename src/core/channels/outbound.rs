use serde_json::{Value, json};

use super::{ChannelType, UnifiedMessage};

pub const DEFAULT_EMAIL_SUBJECT: &str = "Message from FHIRBuilders";

/// Build the platform API payload for a reply to `message`.
///
/// Direct-message platforms (WhatsApp, SMS, email) address the original
/// sender; the rest post back into the conversation the message came from.
pub fn format_outbound_message(channel_type: ChannelType, message: &UnifiedMessage) -> Value {
    match channel_type {
        ChannelType::Slack => json!({
            "channel": message.channel_ref,
            "text": message.content,
        }),
        ChannelType::Discord => json!({
            "content": message.content,
        }),
        ChannelType::Whatsapp => json!({
            "messaging_product": "whatsapp",
            "to": message.sender_id,
            "type": "text",
            "text": { "body": message.content },
        }),
        ChannelType::Teams => json!({
            "type": "message",
            "text": message.content,
            "conversation": { "id": message.channel_ref },
        }),
        ChannelType::Email => {
            let subject = message
                .metadata
                .as_ref()
                .and_then(|m| m.get("subject"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| format!("Re: {}", s))
                .unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string());
            json!({
                "to": message.sender_id,
                "subject": subject,
                "text": message.content,
            })
        }
        ChannelType::WebChat => json!({
            "sessionId": message.channel_ref,
            "message": message.content,
        }),
        ChannelType::Sms => json!({
            "To": message.sender_id,
            "Body": message.content,
        }),
        ChannelType::Telegram => json!({
            "chat_id": message.channel_ref,
            "text": message.content,
        }),
    }
}
