//! HTTP middleware forming the request security pipeline.
//!
//! Every request traverses the same chain before any handler runs:
//!
//! ```text
//! Request → Correlation ID → Trace → Origin Guard → CORS → API Limiter
//!         → Panic Recovery → [Login Limiter | Auth Gate → Role Gate] → Handler
//!              ↓                   ↓                ↓            ↓
//!       X-Request-Id header   403 Forbidden   429 Too Many   401 / 403
//! ```
//!
//! The correlation id sits outermost so even rejections produced deep in the
//! chain carry an `X-Request-Id`. The origin guard and the general API
//! limiter only enforce in production; the login limiter and the
//! authentication/authorization gates are always on.
//!
//! # Security Considerations
//!
//! - Authentication failures are split into distinct variants so tampering,
//!   expiry, and lockouts are distinguishable in logs
//! - Guest accounts past their lifetime are deactivated on first contact
//! - Rate limit buckets are keyed by proxy-reported client IP; see [`ip`]
//!   for the trust assumptions that implies
//! - Panics are contained per-request and never leak internals to clients

pub mod auth;
pub mod authorize;
pub mod ip;
pub mod origin;
pub mod rate_limit;
pub mod recovery;
pub mod request_id;

pub use auth::{RequireAuthLayer, authenticate};
pub use authorize::{CurrentPrincipal, RequireRoleLayer};
pub use ip::{UNKNOWN_IP, extract_client_ip};
pub use origin::{OriginGuardLayer, cors_layer};
pub use rate_limit::{
    FixedWindowLimiter, LOGIN_RATE_LIMIT_MAX, LOGIN_RATE_LIMIT_WINDOW, RateLimitLayer,
    RateLimitScope,
};
pub use recovery::catch_panic_layer;
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, is_canonical_request_id};
