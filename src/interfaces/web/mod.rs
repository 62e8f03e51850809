pub(crate) mod auth;
mod error;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::collections::HashSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

pub use router::build_api_router;

use auth::AuthUser;
use error::ApiError;

use crate::core::channels::ChannelManager;
use crate::core::generation::Orchestrator;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::ratelimit::RateLimiter;
use crate::core::store::Store;

pub struct ApiServerConfig {
    pub orchestrator: Orchestrator,
    pub channels: ChannelManager,
    pub store: Store,
    pub rate_limiter: RateLimiter,
    pub log_tx: broadcast::Sender<String>,
    /// User ids allowed on `/api/logs`.
    pub operators: Vec<String>,
    pub api_host: String,
    pub api_port: u16,
    pub base_url: String,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) channels: ChannelManager,
    pub(crate) store: Store,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) log_tx: broadcast::Sender<String>,
    pub(crate) operators: Arc<HashSet<String>>,
    pub(crate) api_port: u16,
    pub(crate) base_url: String,
}

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                orchestrator: config.orchestrator,
                channels: config.channels,
                store: config.store,
                rate_limiter: config.rate_limiter,
                log_tx: config.log_tx,
                operators: Arc::new(config.operators.into_iter().collect()),
                api_port: config.api_port,
                base_url: config.base_url,
            },
            api_host: config.api_host,
            api_port: config.api_port,
            handle: None,
        }
    }
}

// --- SSE Logs (used by router) ---

/// Whole-process log stream. Only users listed in `operators` may subscribe.
async fn sse_logs_endpoint(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if !state.operators.contains(&user_id) {
        warn!("Log stream refused for non-operator {}", user_id);
        return Err(ApiError::Forbidden(
            "Log stream is restricted to operators".to_string(),
        ));
    }
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| {
        match msg {
            Ok(log) => Ok(Event::default().data(log)), // SSE properly encodes this
            Err(_) => Ok(Event::default().data("Log stream lagged")),
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// --- Lifecycle Implementations ---

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;
        let app = build_api_router(self.state.clone());

        self.handle = Some(tokio::spawn(async move {
            info!("API Server running at http://{addr}");
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::RwLock;

    use super::*;
    use crate::core::codegen::CodeGenerator;
    use crate::core::generation::GenerationService;
    use crate::core::generation::queue::{GenerationQueue, GenerationReceiver};
    use crate::core::llm::testing::{RequestLog, scripted_manager};
    use crate::core::store::test_store;
    use crate::core::vault::CredentialVault;

    pub(crate) const BASE_URL: &str = "https://fhirbuilders.test";

    pub(crate) struct Harness {
        pub state: AppState,
        /// Bearer token for `user-1`.
        pub token: String,
        /// Bearer token for `user-2`.
        pub other_token: String,
        /// Bearer token for `ops-1`, the only operator.
        pub operator_token: String,
        /// Kept so enqueueing succeeds; nothing drains it.
        pub receiver: GenerationReceiver,
        pub requests: RequestLog,
    }

    pub(crate) async fn test_state_with_limit(max_requests: u32) -> Harness {
        let store = test_store();
        let (manager, requests) = scripted_manager(vec![]);
        let generator = CodeGenerator::new(Arc::new(RwLock::new(manager)));
        let (queue, receiver) = GenerationQueue::channel();
        let orchestrator =
            Orchestrator::new(GenerationService::new(store.clone()), generator, queue);
        let vault = CredentialVault::new("test-secret").unwrap();
        let channels = ChannelManager::new(store.clone(), vault, BASE_URL);
        let (log_tx, _) = broadcast::channel(8);

        let (token, _) = store.create_api_token("user-1", "test").await.unwrap();
        let (other_token, _) = store.create_api_token("user-2", "other").await.unwrap();
        let (operator_token, _) = store.create_api_token("ops-1", "ops").await.unwrap();

        Harness {
            state: AppState {
                orchestrator,
                channels,
                store,
                rate_limiter: RateLimiter::in_memory(max_requests, Duration::from_secs(60)),
                log_tx,
                operators: Arc::new(HashSet::from(["ops-1".to_string()])),
                api_port: 3001,
                base_url: BASE_URL.to_string(),
            },
            token,
            other_token,
            operator_token,
            receiver,
            requests,
        }
    }

    pub(crate) async fn test_state() -> Harness {
        test_state_with_limit(1_000).await
    }
}
