use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRegistry {
    pub providers: Vec<ProviderDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub id: String,
    pub name: String,
    pub api_format: ApiFormat,
    pub base_url: String,
    pub auth: AuthConfig,
    pub default_model: String,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Header carrying the raw key for `AuthType::Header`.
    #[serde(default)]
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    Header,
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self {
            providers: vec![
                ProviderDef {
                    id: "anthropic".to_string(),
                    name: "Anthropic".to_string(),
                    api_format: ApiFormat::Anthropic,
                    base_url: "https://api.anthropic.com".to_string(),
                    auth: AuthConfig {
                        auth_type: AuthType::Header,
                        header_name: Some("x-api-key".to_string()),
                    },
                    default_model: "claude-sonnet-4-20250514".to_string(),
                    extra_headers: HashMap::from([(
                        "anthropic-version".to_string(),
                        "2023-06-01".to_string(),
                    )]),
                },
                ProviderDef {
                    id: "openai".to_string(),
                    name: "OpenAI".to_string(),
                    api_format: ApiFormat::Openai,
                    base_url: "https://api.openai.com".to_string(),
                    auth: AuthConfig {
                        auth_type: AuthType::Bearer,
                        header_name: None,
                    },
                    default_model: "gpt-4o".to_string(),
                    extra_headers: HashMap::new(),
                },
            ],
        }
    }

    pub fn get_provider(&self, id: &str) -> Option<&ProviderDef> {
        let normalized = id.to_lowercase();
        self.providers
            .iter()
            .find(|p| p.id == normalized || p.name.to_lowercase() == normalized)
    }
}
