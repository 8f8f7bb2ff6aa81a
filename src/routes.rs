//! Route table and middleware stack assembly.
//!
//! Layer order decides who can reject a request before a handler runs.
//! In request order:
//!
//! 1. correlation id (outermost, so every reply carries `X-Request-Id`)
//! 2. trace span (method, path, id, client ip)
//! 3. origin guard, production only (403 for origins off the allow-list)
//! 4. CORS (preflight and response headers)
//! 5. general limiter, production only (429 per source IP)
//! 6. panic recovery (500 instead of a dropped connection)
//! 7. per group: the login limiter on `/login`, the bearer-token gate plus
//!    role gates on the rest of `/api/auth`
//!
//! # Who Can Call What
//!
//! - `/health`, `/ready`: probes, open to anyone
//! - `/api/auth/login`: credential exchange, login limiter only
//! - `/api/auth/me`: any authenticated principal
//! - `/api/auth/password`: admins and users, never guests
//! - `/api/auth/guests`: admins only

use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{
    OriginGuardLayer, REQUEST_ID_HEADER, RateLimitLayer, RateLimitScope, RequestIdLayer,
    RequireAuthLayer, RequireRoleLayer, catch_panic_layer, cors_layer, extract_client_ip,
};
use crate::models::Role;
use crate::state::AppState;

/// Maximum accepted request body size.
///
/// Every payload this API accepts is a small JSON document, so anything
/// beyond this is either a mistake or an attempt to exhaust memory.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Assemble the route table and wrap it in the middleware stack.
///
/// The origin guard and the general limiter are attached only in
/// production; the login limiter and the auth and role gates are always
/// on. Axum applies the last-added layer first, so the assembly below
/// reads innermost to outermost.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // Route Groups
    // =========================================================================

    // Credential exchange gets its own limiter so an attacker cannot burn
    // the general quota to mask a brute-force run.
    let login_routes = Router::new()
        .route("/login", post(handlers::login))
        .layer(RateLimitLayer::new(
            state.login_limiter.clone(),
            RateLimitScope::Login,
        ));

    // Role layers are applied per group before merging; the shared auth
    // gate wraps the merged router so it always runs before any role check.
    let session_routes = Router::new().route("/me", get(handlers::me));

    let password_routes = Router::new()
        .route("/password", post(handlers::change_password))
        .layer(RequireRoleLayer::forbid_guest());

    let admin_routes = Router::new()
        .route("/guests", post(handlers::create_guest))
        .layer(RequireRoleLayer::any_of(&[Role::Admin]));

    let protected_routes = session_routes
        .merge(password_routes)
        .merge(admin_routes)
        .layer(RequireAuthLayer::new(
            state.codec.clone(),
            state.store.clone(),
        ));

    let mut router = Router::new()
        // Probe endpoints (always accessible)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .nest("/api/auth", login_routes.merge(protected_routes));

    // =========================================================================
    // Middleware (added innermost first; the last layer runs first)
    // =========================================================================

    // 1. Body size cap
    router = router.layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    // 2. Panic recovery. Sits inside the limiters and CORS so a panicking
    //    handler still produces a well-formed, headered response.
    router = router.layer(catch_panic_layer(!config.is_production()));

    // 3. General rate limiting (production only)
    if let Some(api_limiter) = &state.api_limiter {
        info!(
            max = config.rate_limit_max,
            window_secs = config.rate_limit_window.as_secs(),
            "general rate limiting enabled"
        );
        router = router.layer(RateLimitLayer::new(api_limiter.clone(), RateLimitScope::Api));
    } else {
        info!("general rate limiting disabled outside production");
    }

    // 4. CORS
    router = router.layer(cors_layer(config));

    // 5. Origin guard (production only). Runs before CORS so a disallowed
    //    origin gets an explicit 403 instead of a silently header-less reply.
    if config.is_production() {
        info!(
            origins = config.cors_allowed_origins.len(),
            "origin allow-list enforced"
        );
        router = router.layer(OriginGuardLayer::new(config.cors_allowed_origins.clone()));
    }

    // 6. Tracing. The span is created after the request id middleware has
    //    rewritten the header, so the recorded id is always the canonical one.
    router = router.layer(
        TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
                client_ip = %extract_client_ip(request),
            )
        }),
    );

    // 7. Request ID (outermost, so even early rejections carry one)
    router = router.layer(RequestIdLayer::new());

    router.with_state(state)
}
