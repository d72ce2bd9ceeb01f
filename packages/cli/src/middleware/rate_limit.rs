// ABOUTME: Per-client request rate limiting built on governor
// ABOUTME: Clients are keyed by agent id, then remote IP, then a shared anonymous bucket
// ABOUTME: Failed authentication is counted per IP and throttled before any key lookup

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use benos_security::Agent;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::error::AppError;

/// Tracked clients before idle buckets are pruned
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 120,
            burst: 20,
        }
    }
}

/// Shared limiter state handed to [`rate_limit_middleware`]
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    auth_failures: Arc<DefaultKeyedRateLimiter<String>>,
    blocked: Arc<Mutex<HashMap<String, Instant>>>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rpm).allow_burst(burst);

        debug!(rpm = %rpm, burst = %burst, "Created per-client rate limiter");

        Self {
            config,
            limiter: Arc::new(RateLimiter::keyed(quota)),
            auth_failures: Arc::new(RateLimiter::keyed(quota)),
            blocked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Seconds until the next request slot frees up
    fn retry_after(&self) -> u64 {
        let rpm = u64::from(self.config.requests_per_minute.max(1));
        60_u64.div_ceil(rpm).max(1)
    }

    /// Seconds left on a block for `key`, clearing it once expired
    fn blocked_for(&self, key: &str) -> Option<u64> {
        let mut blocked = self.blocked.lock().ok()?;
        let now = Instant::now();
        match blocked.get(key) {
            Some(until) if *until > now => {
                let millis = until.duration_since(now).as_millis().div_ceil(1000);
                Some(u64::try_from(millis).unwrap_or(u64::MAX).max(1))
            }
            Some(_) => {
                blocked.remove(key);
                None
            }
            None => None,
        }
    }

    /// Counts a failed authentication and blocks the client once its bucket runs dry
    fn record_auth_failure(&self, key: &str) {
        if self.auth_failures.check_key(&key.to_string()).is_ok() {
            return;
        }
        if let Ok(mut blocked) = self.blocked.lock() {
            let now = Instant::now();
            if blocked.len() > MAX_TRACKED_CLIENTS {
                blocked.retain(|_, until| *until > now);
            }
            blocked.insert(
                key.to_string(),
                now + Duration::from_secs(self.retry_after()),
            );
        }
        if self.auth_failures.len() > MAX_TRACKED_CLIENTS {
            self.auth_failures.retain_recent();
        }
        warn!(client = %key, audit = true, "Blocking client after repeated authentication failures");
    }
}

/// Bucket key for the request
fn client_key(request: &Request) -> String {
    if let Some(agent) = request.extensions().get::<Agent>() {
        return format!("agent:{}", agent.id);
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    "anonymous".to_string()
}

pub async fn rate_limit_middleware(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !layer.config.enabled {
        return Ok(next.run(request).await);
    }

    let key = client_key(&request);
    let limit = layer.config.requests_per_minute;

    if layer.limiter.check_key(&key).is_err() {
        warn!(
            client = %key,
            path = %request.uri().path(),
            audit = true,
            "Rate limit exceeded"
        );
        return Err(AppError::RateLimitExceeded {
            retry_after: layer.retry_after(),
            limit,
        });
    }

    if layer.limiter.len() > MAX_TRACKED_CLIENTS {
        layer.limiter.retain_recent();
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(limit),
    );
    Ok(response)
}

/// Runs outside authentication so missing or invalid keys are throttled per IP.
/// A blocked client is rejected before its key is looked up.
pub async fn auth_failure_guard(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !layer.config.enabled {
        return Ok(next.run(request).await);
    }

    let key = client_key(&request);
    if let Some(retry_after) = layer.blocked_for(&key) {
        warn!(
            client = %key,
            path = %request.uri().path(),
            audit = true,
            "Rejected request from client blocked for failed authentication"
        );
        return Err(AppError::RateLimitExceeded {
            retry_after,
            limit: layer.config.requests_per_minute,
        });
    }

    let response = next.run(request).await;
    if response.status() == StatusCode::UNAUTHORIZED {
        layer.record_auth_failure(&key);
    }
    Ok(response)
}
