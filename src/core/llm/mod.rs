pub mod generic_provider;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use generic_provider::GenericProvider;
use registry::ProviderRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    // Execute a prompt against a selected model using a structured conversation history
    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct LlmManager {
    providers: Vec<Box<dyn LlmProvider>>,
    selected_provider: Option<String>,
    selected_model: Option<String>,
}

impl LlmManager {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            selected_provider: None,
            selected_model: None,
        }
    }

    /// Build a manager with the named built-in provider selected.
    pub fn from_settings(
        provider_id: &str,
        model: Option<&str>,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<Self> {
        let registry = ProviderRegistry::builtin();
        let mut def = registry
            .get_provider(provider_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Unknown LLM provider '{}'", provider_id))?;
        if let Some(base_url) = base_url {
            def.base_url = base_url.to_string();
        }
        let model = model
            .map(str::to_string)
            .unwrap_or_else(|| def.default_model.clone());
        let id = def.id.clone();

        let mut manager = Self::new();
        manager.register_provider(Box::new(GenericProvider::new(def, api_key.to_string())));
        manager.set_active(&id, model);
        Ok(manager)
    }

    pub fn register_provider(&mut self, provider: Box<dyn LlmProvider>) {
        info!("Registered LLM Provider: {}", provider.provider_id());
        self.providers.push(provider);
    }

    pub fn set_active(&mut self, provider_id: &str, model_id: String) {
        info!("Setting active LLM: {} ({})", provider_id, model_id);
        self.selected_provider = Some(provider_id.to_string());
        self.selected_model = Some(model_id);
    }

    pub fn get_provider(&self, id: &str) -> Option<&dyn LlmProvider> {
        self.providers
            .iter()
            .find(|p| p.provider_id() == id)
            .map(|p| p.as_ref())
    }

    pub fn get_active_info(&self) -> (Option<&String>, Option<&String>) {
        (self.selected_provider.as_ref(), self.selected_model.as_ref())
    }

    pub async fn generate_with_selected(&self, messages: &[ChatMessage]) -> Result<String> {
        let provider_id = self
            .selected_provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No LLM provider selected"))?;

        let model_id = self
            .selected_model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No LLM model selected"))?;

        let provider = self
            .get_provider(provider_id)
            .ok_or_else(|| anyhow::anyhow!("Selected provider not found in registry"))?;

        provider.generate(model_id, messages).await
    }
}

impl Default for LlmManager {
    fn default() -> Self {
        Self::new()
    }
}
