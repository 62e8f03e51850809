//! Service configuration: defaults, then an optional TOML file, then
//! environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::platform::{NativePlatform, Platform};

pub const CONFIG_FILE: &str = "config.toml";
pub const SECRET_KEY_FILE: &str = "secret.key";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            api_key: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients by `x-forwarded-for` / `x-real-ip`. Only enable behind a
    /// proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    /// Public origin used to build webhook URLs.
    pub base_url: String,
    /// Key material for sealing channel credentials. When unset a random
    /// key is generated into the data directory on first use.
    pub secret_key: Option<String>,
    pub log_level: String,
    pub max_concurrent_generations: usize,
    pub llm: LlmConfig,
    pub rate_limit: RateLimitConfig,
    /// User ids allowed to stream the process log.
    pub operators: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: NativePlatform::default_data_dir()
                .unwrap_or_else(|| PathBuf::from(".fhirbuilders")),
            api_host: "127.0.0.1".to_string(),
            api_port: 3001,
            base_url: "http://127.0.0.1:3001".to_string(),
            secret_key: None,
            log_level: "info".to_string(),
            max_concurrent_generations: 2,
            llm: LlmConfig::default(),
            rate_limit: RateLimitConfig::default(),
            operators: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load with an injectable environment lookup.
    pub fn load_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(dir) = env("FHIRBUILDERS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        let explicit = env("FHIRBUILDERS_CONFIG").map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| config.data_dir.join(CONFIG_FILE));
        if path.exists() {
            config = Self::from_file(&path)?;
        } else if explicit.is_some() {
            bail!("Config file not found: {}", path.display());
        }

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env("FHIRBUILDERS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(host) = env("FHIRBUILDERS_API_HOST") {
            self.api_host = host;
        }
        if let Some(port) = env("FHIRBUILDERS_API_PORT") {
            self.api_port = port
                .trim()
                .parse()
                .with_context(|| format!("FHIRBUILDERS_API_PORT is not a port: {}", port))?;
        }
        if let Some(url) = env("FHIRBUILDERS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = env("FHIRBUILDERS_SECRET_KEY") {
            self.secret_key = Some(key);
        }
        if let Some(key) = env("FHIRBUILDERS_LLM_API_KEY").or_else(|| env("ANTHROPIC_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = env("FHIRBUILDERS_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = env("FHIRBUILDERS_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(level) = env("FHIRBUILDERS_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Some(trust) = env("FHIRBUILDERS_TRUST_PROXY_HEADERS") {
            self.rate_limit.trust_proxy_headers = match trust.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => bail!("FHIRBUILDERS_TRUST_PROXY_HEADERS is not a boolean: {}", other),
            };
        }
        if let Some(operators) = env("FHIRBUILDERS_OPERATORS") {
            self.operators = operators
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("base_url must use http or https: {}", self.base_url);
        }
        if self.api_host.trim().is_empty() {
            bail!("api_host must not be empty");
        }
        if self.api_port == 0 {
            bail!("api_port must not be 0");
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!(
                "log_level must be one of {}: {}",
                LOG_LEVELS.join(", "),
                self.log_level
            );
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }
        if self.max_concurrent_generations == 0 {
            bail!("max_concurrent_generations must be at least 1");
        }
        Ok(())
    }

    /// Configured secret key, or the one persisted in the data directory,
    /// created on first call.
    pub fn resolve_secret_key(&self) -> Result<String> {
        if let Some(key) = &self.secret_key {
            return Ok(key.clone());
        }

        let path = self.data_dir.join(SECRET_KEY_FILE);
        if path.exists() {
            let key = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let key = key.trim().to_string();
            if key.is_empty() {
                bail!("{} is empty", path.display());
            }
            return Ok(key);
        }

        std::fs::create_dir_all(&self.data_dir)?;
        NativePlatform::restrict_dir_permissions(&self.data_dir);
        let key = hex::encode(rand::random::<[u8; 32]>());
        std::fs::write(&path, &key)?;
        NativePlatform::restrict_file_permissions(&path);
        info!("Generated credential key at {}", path.display());
        Ok(key)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
