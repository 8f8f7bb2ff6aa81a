//! Correlation ID middleware for request tracing.
//!
//! Every request gets an `X-Request-Id`: an inbound header is reused verbatim
//! when it is a canonical UUID (8-4-4-4-12 hex groups, case-insensitive), and
//! anything else, including malformed values, is replaced with a fresh
//! UUIDv4. The resolved id is written back onto the request, echoed on every
//! response regardless of outcome, and picked up by the request span so it
//! appears in each log line emitted while the request is in flight.
//!
//! Callers that want to correlate client-side logs can supply their own id:
//!
//! ```bash
//! curl -H "X-Request-Id: 5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d" http://localhost:3000/health
//! ```

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

/// Header name for the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID layer for the Tower middleware stack.
///
/// Must sit outermost in the stack so the response header is present on
/// every outcome, including rejections produced by inner layers.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    /// Create a new correlation ID layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service wrapper produced by [`RequestIdLayer`].
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // Reuse a well-formed inbound id or mint a fresh one
        let request_id = resolve_request_id(&req);

        // Resolved ids are UUID strings, so this parse cannot fail
        let header_value = HeaderValue::from_str(&request_id)
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"));

        // Overwrite the request header so handlers and inner layers always
        // see the resolved id, never a malformed client value
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, header_value.clone());

        debug!(%request_id, "correlation id resolved");

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            // Echo the resolved id on the response
            response.headers_mut().insert(REQUEST_ID_HEADER, header_value);

            Ok(response)
        })
    }
}

/// Whether a header value is a canonical hyphenated UUID.
///
/// `Uuid::try_parse` also accepts simple, braced, and URN forms; the length
/// check pins the accepted shape to exactly 8-4-4-4-12.
pub fn is_canonical_request_id(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

/// Resolve the correlation id for a request.
///
/// An inbound `X-Request-Id` is reused verbatim only when it is a canonical
/// UUID; anything else is ignored and a fresh UUIDv4 is generated.
fn resolve_request_id<B>(req: &Request<B>) -> String {
    if let Some(header_value) = req.headers().get(REQUEST_ID_HEADER)
        && let Ok(value) = header_value.to_str()
        && is_canonical_request_id(value)
    {
        return value.to_string();
    }

    Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_canonical_request_id() {
        let req = Request::builder()
            .header("x-request-id", "5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            resolve_request_id(&req),
            "5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d"
        );
    }

    #[test]
    fn test_uppercase_id_is_reused_verbatim() {
        let req = Request::builder()
            .header("x-request-id", "5F0C9B2E-8A41-4A6E-9D3C-1B2F4E5A6C7D")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            resolve_request_id(&req),
            "5F0C9B2E-8A41-4A6E-9D3C-1B2F4E5A6C7D"
        );
    }

    #[test]
    fn test_malformed_id_is_replaced() {
        let req = Request::builder()
            .header("x-request-id", "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let id = resolve_request_id(&req);

        assert_ne!(id, "not-a-uuid");
        assert!(is_canonical_request_id(&id));
    }

    #[test]
    fn test_missing_id_generates_fresh_uuid() {
        let req = Request::builder().body(Body::empty()).unwrap();

        let id = resolve_request_id(&req);

        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_canonical_check_rejects_other_uuid_forms() {
        // Canonical hyphenated form
        assert!(is_canonical_request_id(
            "5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d"
        ));
        assert!(is_canonical_request_id(
            "00000000-0000-0000-0000-000000000000"
        ));

        // Simple form without hyphens
        assert!(!is_canonical_request_id("5f0c9b2e8a414a6e9d3c1b2f4e5a6c7d"));
        // Braced form
        assert!(!is_canonical_request_id(
            "{5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d}"
        ));
        // URN form
        assert!(!is_canonical_request_id(
            "urn:uuid:5f0c9b2e-8a41-4a6e-9d3c-1b2f4e5a6c7d"
        ));
        assert!(!is_canonical_request_id(""));
        assert!(!is_canonical_request_id("not-a-uuid"));
    }
}
