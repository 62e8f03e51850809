//! Fixed-window request limiting keyed by client address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

/// Every five minutes.
pub const SWEEP_SCHEDULE: &str = "0 0/5 * * * *";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub count: u32,
    pub reset_at: Instant,
}

/// Backing storage for window counters. Only an in-process store ships;
/// the trait is the seam for a shared one.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one hit for `key`, opening a fresh window when the current one
    /// has expired, and return the window after the hit.
    async fn hit(&self, key: &str, window: Duration, now: Instant) -> Window;
    /// Drop expired windows. Returns how many were removed.
    async fn sweep(&self, now: Instant) -> usize;
}

#[derive(Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration, now: Instant) -> Window {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window,
        });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }
        entry.count = entry.count.saturating_add(1);
        *entry
    }

    async fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        before - windows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u32,
    window: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests: max_requests.max(1),
            window,
            trust_proxy_headers: false,
        }
    }

    pub fn in_memory(max_requests: u32, window: Duration) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), max_requests, window)
    }

    pub fn with_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Counter key for a request under this limiter's proxy setting.
    pub fn key_for(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        client_key(headers, extensions, self.trust_proxy_headers)
    }

    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now()).await
    }

    pub async fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let window = self.store.hit(key, self.window, now).await;
        if window.count > self.max_requests {
            let wait = window.reset_at.saturating_duration_since(now);
            // Round up so clients never retry a moment too early.
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            RateDecision::Limited {
                retry_after_secs: retry_after_secs.max(1),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.max_requests - window.count,
            }
        }
    }

    pub async fn sweep(&self) -> usize {
        self.store.sweep(Instant::now()).await
    }

    /// Register the periodic sweep on the shared scheduler.
    pub async fn schedule_sweep(&self, scheduler: &JobScheduler) -> Result<()> {
        let limiter = self.clone();
        let job = Job::new_async(SWEEP_SCHEDULE, move |_uuid, _l| {
            let limiter = limiter.clone();
            Box::pin(async move {
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!("Rate limiter swept {} expired windows", removed);
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("Rate limiter sweep scheduled ({})", SWEEP_SCHEDULE);
        Ok(())
    }
}

/// Client identity used as the counter key. With `trust_proxy_headers` the
/// first `x-forwarded-for` hop wins, then `x-real-ip`. Otherwise, and as the
/// fallback, the socket address.
pub fn client_key(headers: &HeaderMap, extensions: &Extensions, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers && let Some(ip) = proxy_client_ip(headers) {
        return ip.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn proxy_client_ip(headers: &HeaderMap) -> Option<&str> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn limits_after_max_requests_in_window() {
        let limiter = RateLimiter::in_memory(3, Duration::from_secs(60));
        let now = Instant::now();
        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.check_at("1.2.3.4", now).await,
                RateDecision::Allowed { remaining: expected }
            );
        }
        assert_eq!(
            limiter.check_at("1.2.3.4", now + Duration::from_secs(10)).await,
            RateDecision::Limited { retry_after_secs: 50 }
        );
        // Other clients have their own window.
        assert!(matches!(
            limiter.check_at("5.6.7.8", now).await,
            RateDecision::Allowed { remaining: 2 }
        ));
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::in_memory(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(matches!(limiter.check_at("k", now).await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at("k", now).await, RateDecision::Limited { .. }));
        assert!(matches!(
            limiter.check_at("k", now + Duration::from_secs(60)).await,
            RateDecision::Allowed { remaining: 0 }
        ));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_windows() {
        let store = InMemoryCounterStore::new();
        let now = Instant::now();
        store.hit("old", Duration::from_secs(1), now).await;
        store.hit("fresh", Duration::from_secs(120), now).await;
        assert_eq!(store.sweep(now + Duration::from_secs(5)).await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn schedules_sweep_job() {
        let scheduler = JobScheduler::new().await.unwrap();
        let limiter = RateLimiter::in_memory(10, Duration::from_secs(60));
        limiter.schedule_sweep(&scheduler).await.unwrap();
    }

    #[test]
    fn trusted_proxy_key_prefers_forwarded_then_real_ip_then_socket() {
        let mut headers = HeaderMap::new();
        let mut extensions = Extensions::new();
        assert_eq!(client_key(&headers, &extensions, true), "unknown");

        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));
        assert_eq!(client_key(&headers, &extensions, true), "10.0.0.9");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.5"));
        assert_eq!(client_key(&headers, &extensions, true), "192.168.1.5");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, &extensions, true), "203.0.113.7");
    }

    #[test]
    fn untrusted_proxy_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.5"));
        let mut extensions = Extensions::new();
        assert_eq!(client_key(&headers, &extensions, false), "unknown");

        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));
        assert_eq!(client_key(&headers, &extensions, false), "10.0.0.9");

        let limiter = RateLimiter::in_memory(1, Duration::from_secs(60));
        assert_eq!(limiter.key_for(&headers, &extensions), "10.0.0.9");
        let limiter = limiter.with_proxy_headers(true);
        assert_eq!(limiter.key_for(&headers, &extensions), "203.0.113.7");
    }
}
