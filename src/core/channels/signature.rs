//! Webhook signature verification per platform. Every check fails closed:
//! a missing header or secret is a rejection.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::ChannelType;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a Slack request timestamp, in seconds.
pub const SLACK_REPLAY_WINDOW_SECS: u64 = 300;

pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const WHATSAPP_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
pub const GENERIC_SIGNATURE_HEADER: &str = "x-signature";

/// Hex HMAC-SHA256 of `payload` keyed with `secret`.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn verify_slack_signature(
    headers: &HeaderMap,
    body: &[u8],
    signing_secret: &str,
    now_secs: u64,
) -> bool {
    if signing_secret.is_empty() {
        return false;
    }
    let Some(timestamp) = header(headers, SLACK_TIMESTAMP_HEADER) else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<u64>() else {
        return false;
    };
    if now_secs.abs_diff(ts) > SLACK_REPLAY_WINDOW_SECS {
        return false;
    }
    let Some(sig) = header(headers, SLACK_SIGNATURE_HEADER) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));
    constant_time_eq(sig.as_bytes(), expected.as_bytes())
}

pub fn verify_hub_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(sig) = header(headers, WHATSAPP_SIGNATURE_HEADER).and_then(|s| s.strip_prefix("sha256="))
    else {
        return false;
    };
    match hmac_sha256_hex(secret, body) {
        Some(expected) => constant_time_eq(sig.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

pub fn verify_telegram_secret(headers: &HeaderMap, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    match header(headers, TELEGRAM_SECRET_HEADER) {
        Some(token) => constant_time_eq(token.as_bytes(), secret.as_bytes()),
        None => false,
    }
}

pub fn verify_generic_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(sig) = header(headers, GENERIC_SIGNATURE_HEADER) else {
        return false;
    };
    match hmac_sha256_hex(secret, body) {
        Some(expected) => constant_time_eq(sig.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// Verify an inbound delivery for `channel_type`.
///
/// `config` is the decrypted channel config; `webhook_secret` is the secret
/// issued when the channel was created.
pub fn verify_channel_signature(
    channel_type: ChannelType,
    headers: &HeaderMap,
    body: &[u8],
    config: &Value,
    webhook_secret: &str,
    now_secs: u64,
) -> bool {
    match channel_type {
        ChannelType::Slack => verify_slack_signature(
            headers,
            body,
            config_str(config, "signingSecret").unwrap_or_default(),
            now_secs,
        ),
        ChannelType::Whatsapp => {
            let secret = config_str(config, "appSecret").unwrap_or(webhook_secret);
            verify_hub_signature(headers, body, secret)
        }
        ChannelType::Telegram => verify_telegram_secret(headers, webhook_secret),
        ChannelType::Discord
        | ChannelType::Teams
        | ChannelType::Email
        | ChannelType::WebChat
        | ChannelType::Sms => verify_generic_signature(headers, body, webhook_secret),
    }
}
