//! Cross-origin policy: explicit origin guard plus CORS headers.
//!
//! Browser-facing origin control happens in two cooperating pieces:
//!
//! - [`OriginGuardLayer`] rejects requests whose `Origin` header is outside
//!   the configured allow-list with an explicit 403 body, instead of the
//!   silent header-omission browsers turn into an opaque network error.
//!   Requests without an `Origin` header (curl, service-to-service, probes)
//!   pass untouched.
//! - [`cors_layer`] emits the actual CORS response headers and answers
//!   preflights for permitted origins.
//!
//! The guard is attached outside the CORS layer and only in production;
//! development mode mirrors every origin back so local frontends on random
//! ports work without configuration. A `*` entry in the allow-list keeps the
//! mirroring behavior in production deployments that sit behind a trusted
//! gateway. Credentialed requests forbid the literal wildcard header, so
//! mirroring the caller's origin stands in for `*` in both cases.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, HeaderValue, Method, Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::request_id::REQUEST_ID_HEADER;
use crate::config::Config;
use crate::error::AppError;

/// How long browsers may cache a preflight response.
const CORS_MAX_AGE: Duration = Duration::from_secs(600);

/// Build the CORS header layer from the configured origin policy.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.is_production() && !config.cors_allows_any_origin() {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    } else {
        // Wildcard with credentials must mirror instead of sending `*`
        AllowOrigin::mirror_request()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

/// Layer that rejects browser requests from origins outside the allow-list.
#[derive(Clone)]
pub struct OriginGuardLayer {
    allowed: Arc<[String]>,
}

impl OriginGuardLayer {
    /// Guard against origins not present in `allowed`. A `*` entry admits
    /// every origin.
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }
}

impl<S> Layer<S> for OriginGuardLayer {
    type Service = OriginGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OriginGuardService {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

/// Service wrapper produced by [`OriginGuardLayer`].
#[derive(Clone)]
pub struct OriginGuardService<S> {
    inner: S,
    allowed: Arc<[String]>,
}

impl<S> Service<Request<Body>> for OriginGuardService<S>
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
        let allowed = self.allowed.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(origin) = req.headers().get(ORIGIN)
                && !origin_permitted(origin, &allowed)
            {
                warn!(
                    origin = ?origin,
                    path = %req.uri().path(),
                    "Rejected request from origin outside the allow-list"
                );
                return Ok(AppError::OriginNotPermitted.into_response());
            }

            inner.call(req).await
        })
    }
}

/// Exact-match membership test; `*` in the list admits any origin.
fn origin_permitted(origin: &HeaderValue, allowed: &[String]) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    allowed.iter().any(|entry| entry == "*" || entry == origin)
}
