//! Health and readiness endpoints.
//!
//! `GET /health` answers 200 whenever the process is up; `GET /ready`
//! additionally exercises the principal store and reports 503 while it is
//! unreachable, so a load balancer stops routing logins at a backend that
//! would only answer 500.
//!
//! Both endpoints are public: they sit inside the security pipeline (origin
//! checks, rate limits) but in front of the authentication gate, because
//! probes carry no credentials.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Liveness probe with version and uptime, for dashboards and `curl`:
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptime_seconds": 3600,
///   "timestamp": "2026-03-02T07:15:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness probe for orchestrators.
///
/// Issues a throwaway lookup against the principal store. A store that
/// cannot answer makes every authenticated route useless, so the probe
/// reports 503 until it recovers; wire it to the platform's readiness
/// check (e.g. a Kubernetes `readinessProbe` on `/ready`) rather than the
/// liveness check, since the condition is expected to clear on its own.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match state.store.find_by_id(Uuid::nil()).await {
        Ok(_) => Ok(StatusCode::OK),
        Err(err) => {
            warn!(error = %err, "Readiness probe failed against the principal store");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
