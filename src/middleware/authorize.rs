//! Role-based authorization gate.
//!
//! Runs strictly after the authentication gate: it reads the [`Principal`]
//! that [`super::auth::RequireAuthLayer`] attached to the request extensions
//! and checks its role against an allowed set. Roles are flat labels with no
//! hierarchy, so the gate is a plain membership test; an admin is only
//! admitted to a user-gated route when `admin` is listed explicitly.
//!
//! A request that reaches this gate without a principal attached is a wiring
//! mistake (the authentication layer was skipped), reported as 401 rather
//! than a panic. Non-membership is 403.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;
use crate::models::{Principal, Role};

/// Layer that restricts wrapped routes to principals in an allowed role set.
///
/// # Example
///
/// ```rust,ignore
/// let admin_only = Router::new()
///     .route("/api/auth/guests", post(create_guest))
///     .layer(RequireRoleLayer::any_of(&[Role::Admin]))
///     .layer(RequireAuthLayer::new(codec, store));
/// ```
#[derive(Clone)]
pub struct RequireRoleLayer {
    allowed: Arc<[Role]>,
}

impl RequireRoleLayer {
    /// Admit only principals whose role appears in `allowed`.
    pub fn any_of(allowed: &[Role]) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    /// Admit every role except guest.
    ///
    /// A named convenience for routes that real accounts may use but
    /// short-lived guests may not, such as password changes.
    pub fn forbid_guest() -> Self {
        Self::any_of(&[Role::Admin, Role::User])
    }
}

impl<S> Layer<S> for RequireRoleLayer {
    type Service = RequireRoleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireRoleService {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

/// Service wrapper produced by [`RequireRoleLayer`].
#[derive(Clone)]
pub struct RequireRoleService<S> {
    inner: S,
    allowed: Arc<[Role]>,
}

impl<S> Service<Request<Body>> for RequireRoleService<S>
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
            match check_role(&req, &allowed) {
                Ok(()) => inner.call(req).await,
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

/// Membership test against the principal attached by the authentication gate.
fn check_role(req: &Request<Body>, allowed: &[Role]) -> Result<(), AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or(AppError::Unauthenticated)?;

    if !allowed.contains(&principal.role) {
        warn!(
            principal_id = %principal.id,
            username = %principal.username,
            role = %principal.role,
            path = %req.uri().path(),
            "Role not in the allowed set for this route"
        );
        return Err(AppError::Forbidden);
    }

    Ok(())
}

/// Extractor for the authenticated principal in handler signatures.
///
/// Handlers behind [`super::auth::RequireAuthLayer`] take
/// `CurrentPrincipal(principal)` as an argument instead of digging through
/// request extensions. Using it on an ungated route rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(AppError::Unauthenticated)
    }
}
