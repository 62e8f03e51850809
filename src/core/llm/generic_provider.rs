use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::registry::{ApiFormat, AuthType, ProviderDef};
use super::{ChatMessage, LlmProvider};

/// Upper bound on generated tokens for a single Anthropic reply.
const ANTHROPIC_MAX_TOKENS: u32 = 8192;

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

// ── Anthropic Messages request/response ──

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Fold leading system messages into one system string; the remainder is
/// the conversation. Later system messages are sent as user turns.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage<'_>>) {
    let mut system: Vec<&str> = Vec::new();
    let mut rest = Vec::new();
    let mut past_system = false;
    for m in messages {
        if m.role == "system" && !past_system {
            system.push(&m.content);
            continue;
        }
        past_system = true;
        let role = if m.role == "assistant" { "assistant" } else { "user" };
        rest.push(WireMessage {
            role,
            content: &m.content,
        });
    }
    let system = (!system.is_empty()).then(|| system.join("\n"));
    (system, rest)
}

/// Extract the reply text of an Anthropic response, which must be exactly
/// one text block.
fn anthropic_text(response: AnthropicResponse) -> Result<String> {
    let mut blocks = response.content.into_iter();
    let first = blocks
        .next()
        .ok_or_else(|| anyhow!("Anthropic API returned no content"))?;
    let extra = blocks.count();
    if extra > 0 {
        return Err(anyhow!(
            "Anthropic API returned {} content blocks, expected one",
            extra + 1
        ));
    }
    match (first.block_type.as_str(), first.text) {
        ("text", Some(text)) => Ok(text),
        (other, _) => Err(anyhow!("Unexpected response type from Anthropic API: {}", other)),
    }
}

pub struct GenericProvider {
    provider_def: ProviderDef,
    api_key: String,
    client: Client,
}

impl GenericProvider {
    pub fn new(provider_def: ProviderDef, api_key: String) -> Self {
        Self {
            provider_def,
            api_key,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.provider_def.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        request = match self.provider_def.auth.auth_type {
            AuthType::Bearer => request.header("Authorization", format!("Bearer {}", self.api_key)),
            AuthType::Header => {
                let name = self
                    .provider_def
                    .auth
                    .header_name
                    .as_deref()
                    .unwrap_or("x-api-key");
                request.header(name, &self.api_key)
            }
        };
        for (name, value) in &self.provider_def.extra_headers {
            request = request.header(name, value);
        }
        request
    }

    async fn send<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<R> {
        let request = self.authorize(self.client.post(url).json(body));
        let res = request.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "{} API Error ({}): {}",
                self.provider_def.name,
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        Ok(res.json().await?)
    }

    async fn generate_openai(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let req = OpenAiRequest {
            model: model_id,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
        };
        let parsed: OpenAiResponse = self.send(&self.endpoint("/v1/chat/completions"), &req).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("{} API returned no message", self.provider_def.name))
    }

    async fn generate_anthropic(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let (system, conversation) = split_system(messages);
        let req = AnthropicRequest {
            model: model_id,
            max_tokens: ANTHROPIC_MAX_TOKENS,
            system,
            messages: conversation,
        };
        let parsed: AnthropicResponse = self.send(&self.endpoint("/v1/messages"), &req).await?;
        anthropic_text(parsed)
    }
}

#[async_trait]
impl LlmProvider for GenericProvider {
    fn provider_id(&self) -> &str {
        &self.provider_def.id
    }

    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        match self.provider_def.api_format {
            ApiFormat::Openai => self.generate_openai(model_id, messages).await,
            ApiFormat::Anthropic => self.generate_anthropic(model_id, messages).await,
        }
    }
}
