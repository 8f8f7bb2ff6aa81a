//! Bearer-token authentication gate.
//!
//! Wrapped routes only run their handler after a request has passed every
//! step of the verification pipeline:
//!
//! 1. Extract the compact token from the `Authorization: Bearer` header
//! 2. Verify the token signature and validity window (with skew tolerance)
//! 3. Resolve the embedded principal id against the store
//! 4. Reject deactivated principals
//! 5. Reject guests whose account lifetime elapsed, deactivating them
//! 6. Attach the resolved [`Principal`] to the request extensions
//!
//! Each failing step maps to its own [`AppError`] variant so operators can
//! tell token tampering, routine expiry, and account lockouts apart in the
//! logs. Store failures during resolution or deactivation never degrade into
//! a 401; they surface as [`AppError::Unavailable`].
//!
//! # Guest Lockout
//!
//! Step 5 is the only authentication step with a side effect. A guest
//! observed past its expiry is deactivated through the store *before* the
//! rejection is returned, so the first request after the lifetime elapses
//! flips the account off. Replays of the same token then fail at step 4 as
//! a plain inactive account. The store write is idempotent; concurrent
//! requests racing on the same expired guest both end up locked out.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, Response};
use axum::response::IntoResponse;
use chrono::Utc;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::Principal;
use crate::store::{PrincipalStore, SharedPrincipalStore};
use crate::token::TokenCodec;

/// Token scheme expected in the `Authorization` header.
const BEARER_SCHEME: &str = "Bearer ";

/// Layer that restricts wrapped routes to authenticated principals.
///
/// # Example
///
/// ```rust,ignore
/// let protected = router.layer(RequireAuthLayer::new(codec, store));
/// ```
#[derive(Clone)]
pub struct RequireAuthLayer {
    codec: Arc<TokenCodec>,
    store: SharedPrincipalStore,
}

impl RequireAuthLayer {
    /// Build the gate from the process-wide codec and store handles.
    pub fn new(codec: Arc<TokenCodec>, store: SharedPrincipalStore) -> Self {
        Self { codec, store }
    }
}

impl<S> Layer<S> for RequireAuthLayer {
    type Service = RequireAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAuthService {
            inner,
            codec: self.codec.clone(),
            store: self.store.clone(),
        }
    }
}

/// Service wrapper produced by [`RequireAuthLayer`].
#[derive(Clone)]
pub struct RequireAuthService<S> {
    inner: S,
    codec: Arc<TokenCodec>,
    store: SharedPrincipalStore,
}

impl<S> Service<Request<Body>> for RequireAuthService<S>
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
        let codec = self.codec.clone();
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match authenticate(req.headers(), &codec, store.as_ref()).await {
                Ok(principal) => {
                    debug!(
                        principal_id = %principal.id,
                        username = %principal.username,
                        role = %principal.role,
                        "Request authenticated"
                    );
                    req.extensions_mut().insert(principal);
                    inner.call(req).await
                }
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

/// Run the full verification pipeline against a request's headers.
///
/// On success the caller receives the resolved principal; every failure mode
/// maps to a distinct [`AppError`] variant. Exposed separately from the layer
/// so the pipeline can be exercised without standing up a router.
pub async fn authenticate(
    headers: &HeaderMap,
    codec: &TokenCodec,
    store: &dyn PrincipalStore,
) -> Result<Principal, AppError> {
    let token = bearer_token(headers).ok_or(AppError::MissingCredential)?;

    // Signature, structure, and validity window (clock skew included)
    let claims = codec.verify(token)?;

    let principal = store
        .find_by_id(claims.principal_id)
        .await
        .map_err(|err| AppError::Unavailable(err.to_string()))?
        .ok_or(AppError::PrincipalNotFound)?;

    if !principal.active {
        return Err(AppError::PrincipalInactive);
    }

    // Account-level guest expiry is independent of the token's own window:
    // a token with hours of validity left still fails here once the guest
    // lifetime lapses.
    if principal.guest_expired(Utc::now()) {
        store
            .deactivate(principal.id)
            .await
            .map_err(|err| AppError::Unavailable(err.to_string()))?;

        warn!(
            principal_id = %principal.id,
            username = %principal.username,
            expired_at = ?principal.guest_expires_at,
            "Guest lifetime elapsed, account deactivated"
        );

        return Err(AppError::GuestSessionExpired);
    }

    Ok(principal)
}

/// Extract the compact token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` for a missing header, a non-Bearer scheme, or an empty
/// token. The scheme match is exact; `bearer` and `BEARER` are rejected the
/// same as any other scheme.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_SCHEME)?.trim();

    if token.is_empty() { None } else { Some(token) }
}
