use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::parse_api_server_flags;
use crate::core::channels::ChannelManager;
use crate::core::codegen::CodeGenerator;
use crate::core::config::AppConfig;
use crate::core::generation::queue::{GenerationQueue, GenerationWorker};
use crate::core::generation::{GenerationService, Orchestrator};
use crate::core::lifecycle::LifecycleManager;
use crate::core::llm::LlmManager;
use crate::core::ratelimit::RateLimiter;
use crate::core::store::Store;
use crate::core::terminal::{
    ROCKET, print_goodbye, print_link, print_status, print_step, print_warn,
};
use crate::core::vault::CredentialVault;
use crate::interfaces::web::{ApiServer, ApiServerConfig};
use crate::logging;

pub async fn run_serve_command(args: &[String]) -> Result<()> {
    let mut config = AppConfig::load()?;
    let (api_host, api_port) =
        parse_api_server_flags(args, 2, config.api_host.clone(), config.api_port)?;
    config.api_host = api_host;
    config.api_port = api_port;
    config.validate()?;

    let log_tx = logging::init(&config.log_level);

    let store = Store::open(&config.data_dir).await?;
    let vault = CredentialVault::new(&config.resolve_secret_key()?)
        .context("Failed to initialize credential vault")?;

    let api_key = config.llm.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        print_warn("No LLM API key configured (ANTHROPIC_API_KEY); generations will fail.");
    }
    let llm = LlmManager::from_settings(
        &config.llm.provider,
        config.llm.model.as_deref(),
        config.llm.base_url.as_deref(),
        &api_key,
    )?;
    let model_label = match llm.get_active_info() {
        (Some(provider), Some(model)) => format!("{} ({})", provider, model),
        _ => "none".to_string(),
    };

    let generator = CodeGenerator::new(Arc::new(RwLock::new(llm)));
    let (queue, receiver) = GenerationQueue::channel();
    let orchestrator = Orchestrator::new(GenerationService::new(store.clone()), generator, queue);
    let worker = GenerationWorker::new(
        receiver,
        orchestrator.clone(),
        config.max_concurrent_generations,
    );
    let channels = ChannelManager::new(store.clone(), vault, config.base_url.clone());
    let rate_limiter = RateLimiter::in_memory(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_secs),
    )
    .with_proxy_headers(config.rate_limit.trust_proxy_headers);

    let api = ApiServer::new(ApiServerConfig {
        orchestrator,
        channels,
        store: store.clone(),
        rate_limiter: rate_limiter.clone(),
        log_tx,
        operators: config.operators.clone(),
        api_host: config.api_host.clone(),
        api_port: config.api_port,
        base_url: config.base_url.clone(),
    });

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(store)));
    lifecycle.attach(Arc::new(Mutex::new(worker)));
    lifecycle.attach(Arc::new(Mutex::new(api)));
    rate_limiter.schedule_sweep(&lifecycle.scheduler).await?;

    print_step("Starting fhirbuilders");
    lifecycle.start().await?;

    println!("\n {}fhirbuilders is running\n", ROCKET);
    print_link("API", &format!("http://{}", config.bind_addr()));
    print_link(
        "Webhooks",
        &format!("{}/api/openclaw/webhook/<channel-id>", config.base_url),
    );
    print_status("Data", &config.data_dir.display().to_string());
    print_status("Model", &model_label);
    println!();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    lifecycle.shutdown().await?;
    print_goodbye();
    Ok(())
}
