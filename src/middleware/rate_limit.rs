//! Rate limiting middleware using fixed time windows.
//!
//! # Algorithm
//!
//! A fixed-window counter per source IP: the first request from an IP opens a
//! window, every request increments the counter (rejected ones included), and
//! when the window elapses the counter resets in full. There is no sliding or
//! smoothing; a client locked out mid-window is admitted again as soon as the
//! window turns over.
//!
//! Two independently configured instances exist: a tight one scoped to the
//! login route, counting successful and failed attempts alike, and a loose
//! one over all API traffic that is only enforced in production.
//!
//! # Response Headers
//!
//! Draft-standard headers are emitted on every response that passes through
//! a limiter; legacy `X-RateLimit-*` names are suppressed:
//!
//! - `RateLimit-Limit`: window maximum
//! - `RateLimit-Remaining`: requests left in the current window
//! - `RateLimit-Reset`: seconds until the window resets
//!
//! Rejected requests (429) additionally carry `Retry-After`.
//!
//! # Deployment
//!
//! Buckets are per-process and in-memory. Under multi-instance deployment
//! each instance enforces its own independent budget; see
//! [`super::ip`] for the proxy configuration required to key buckets by the
//! real client IP.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response};
use axum::response::IntoResponse;
use tokio::sync::RwLock;
use tower::{Layer, Service};
use tracing::warn;

use super::ip::extract_client_ip;
use crate::error::AppError;

/// Window length for the login limiter. Fixed, not configurable.
pub const LOGIN_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Maximum login attempts per source IP per window. Fixed, not configurable.
pub const LOGIN_RATE_LIMIT_MAX: u32 = 5;

/// Which limiter a layer instance enforces. Selects the rejection message
/// and the log label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Tight limiter on the login endpoint.
    Login,
    /// Loose limiter over all API traffic.
    Api,
}

impl RateLimitScope {
    fn exceeded_message(self) -> &'static str {
        match self {
            RateLimitScope::Login => "Too many login attempts, please try again later",
            RateLimitScope::Api => "Too many requests, please try again later",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RateLimitScope::Login => "login",
            RateLimitScope::Api => "api",
        }
    }
}

/// A single key's counter within the current window.
#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    count: u32,
    started_at: Instant,
}

/// Outcome of a bucket check, carrying the header material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Window maximum
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Seconds until the current window resets
    pub reset_secs: u64,
}

/// Per-key fixed-window request counters.
///
/// Shared between the middleware layer and a background sweeper that evicts
/// elapsed windows so idle keys do not accumulate.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    slots: RwLock<HashMap<String, WindowSlot>>,
}

impl FixedWindowLimiter {
    /// Create a limiter admitting `max` requests per key per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Count a request against `key` and decide whether it may proceed.
    ///
    /// The counter increments for every call, so rejected requests also
    /// consume nothing further but remain visible in the count; the window
    /// start is never pushed forward by traffic.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut slots = self.slots.write().await;

        let slot = slots.entry(key.to_string()).or_insert(WindowSlot {
            count: 0,
            started_at: now,
        });

        if now.duration_since(slot.started_at) >= self.window {
            slot.count = 0;
            slot.started_at = now;
        }

        slot.count = slot.count.saturating_add(1);

        let allowed = slot.count <= self.max;
        let remaining = self.max.saturating_sub(slot.count);
        let reset_secs = self
            .window
            .saturating_sub(now.duration_since(slot.started_at))
            .as_secs();

        RateLimitDecision {
            allowed,
            limit: self.max,
            remaining,
            reset_secs,
        }
    }

    /// Evict keys whose window has fully elapsed. Returns the eviction count.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write().await;

        let before = slots.len();
        slots.retain(|_, slot| now.duration_since(slot.started_at) < self.window);
        before - slots.len()
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Window length this limiter was built with.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Rate limiting layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(FixedWindowLimiter::new(100, Duration::from_secs(900)));
/// let app = router.layer(RateLimitLayer::new(limiter, RateLimitScope::Api));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
    scope: RateLimitScope,
}

impl RateLimitLayer {
    /// Wrap a shared limiter in a layer for the given scope.
    pub fn new(limiter: Arc<FixedWindowLimiter>, scope: RateLimitScope) -> Self {
        Self { limiter, scope }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            scope: self.scope,
        }
    }
}

/// Service wrapper produced by [`RateLimitLayer`].
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<FixedWindowLimiter>,
    scope: RateLimitScope,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let scope = self.scope;
        let mut inner = self.inner.clone();

        // Extract client IP before moving req into the async block
        let client_ip = extract_client_ip(&req).into_owned();

        Box::pin(async move {
            let decision = limiter.check(&client_ip).await;

            if !decision.allowed {
                let path = req.uri().path();
                let retry_after = decision.reset_secs.max(1);

                warn!(
                    client_ip = %client_ip,
                    path = %path,
                    scope = scope.label(),
                    retry_after_secs = retry_after,
                    "Rate limit exceeded for IP"
                );

                let mut response = AppError::RateLimited {
                    message: scope.exceeded_message(),
                    retry_after_secs: retry_after,
                }
                .into_response();
                apply_rate_limit_headers(&mut response, &decision);

                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            apply_rate_limit_headers(&mut response, &decision);

            Ok(response)
        })
    }
}

/// Attach the draft-standard rate limit headers to a response.
fn apply_rate_limit_headers(response: &mut Response<Body>, decision: &RateLimitDecision) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("RateLimit-Reset", value);
    }
}
