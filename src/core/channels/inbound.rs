use serde_json::{Map, Value};

use super::{ChannelType, UnifiedMessage};

/// Read a scalar at a JSON pointer as a string. Missing, null and
/// structured values read as empty.
fn text_at(payload: &Value, pointer: &str) -> String {
    match payload.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn optional_text_at(payload: &Value, pointer: &str) -> Option<String> {
    Some(text_at(payload, pointer)).filter(|s| !s.is_empty())
}

/// Normalize a platform webhook payload. Never fails: a payload missing the
/// expected fields yields empty strings, which the receiver treats as
/// nothing to store.
pub fn parse_inbound_message(channel_type: ChannelType, payload: &Value) -> UnifiedMessage {
    match channel_type {
        ChannelType::Slack => UnifiedMessage {
            content: text_at(payload, "/event/text"),
            sender_id: text_at(payload, "/event/user"),
            channel_ref: text_at(payload, "/event/channel"),
            external_id: text_at(payload, "/event/ts"),
            timestamp: optional_text_at(payload, "/event/ts"),
            metadata: None,
        },
        ChannelType::Discord => UnifiedMessage {
            content: text_at(payload, "/content"),
            sender_id: text_at(payload, "/author/id"),
            channel_ref: text_at(payload, "/channel_id"),
            external_id: text_at(payload, "/id"),
            timestamp: optional_text_at(payload, "/timestamp"),
            metadata: None,
        },
        ChannelType::Whatsapp => {
            let value = payload
                .pointer("/entry/0/changes/0/value")
                .cloned()
                .unwrap_or(Value::Null);
            let message = value.pointer("/messages/0").cloned().unwrap_or(Value::Null);
            UnifiedMessage {
                content: text_at(&message, "/text/body"),
                sender_id: text_at(&message, "/from"),
                channel_ref: text_at(&value, "/metadata/phone_number_id"),
                external_id: text_at(&message, "/id"),
                timestamp: optional_text_at(&message, "/timestamp"),
                metadata: None,
            }
        }
        ChannelType::Teams => UnifiedMessage {
            content: text_at(payload, "/text"),
            sender_id: text_at(payload, "/from/id"),
            channel_ref: text_at(payload, "/conversation/id"),
            external_id: text_at(payload, "/id"),
            timestamp: optional_text_at(payload, "/timestamp"),
            metadata: None,
        },
        ChannelType::Email => {
            let mut metadata = Map::new();
            metadata.insert(
                "subject".to_string(),
                Value::String(text_at(payload, "/subject")),
            );
            UnifiedMessage {
                content: text_at(payload, "/text"),
                sender_id: text_at(payload, "/from"),
                channel_ref: text_at(payload, "/to"),
                external_id: text_at(payload, "/messageId"),
                timestamp: None,
                metadata: Some(metadata),
            }
        }
        ChannelType::WebChat => UnifiedMessage {
            content: text_at(payload, "/message"),
            sender_id: text_at(payload, "/sessionId"),
            channel_ref: text_at(payload, "/sessionId"),
            external_id: text_at(payload, "/messageId"),
            timestamp: optional_text_at(payload, "/timestamp"),
            metadata: None,
        },
        ChannelType::Sms => UnifiedMessage {
            content: text_at(payload, "/Body"),
            sender_id: text_at(payload, "/From"),
            channel_ref: text_at(payload, "/To"),
            external_id: text_at(payload, "/MessageSid"),
            timestamp: None,
            metadata: None,
        },
        ChannelType::Telegram => UnifiedMessage {
            content: text_at(payload, "/message/text"),
            sender_id: text_at(payload, "/message/from/id"),
            channel_ref: text_at(payload, "/message/chat/id"),
            external_id: text_at(payload, "/message/message_id"),
            timestamp: optional_text_at(payload, "/message/date"),
            metadata: None,
        },
    }
}
