//! Authentication and account handlers.
//!
//! # Endpoints
//!
//! - `POST /api/auth/login` - Exchange credentials for a signed token
//! - `GET /api/auth/me` - The authenticated principal's own record
//! - `POST /api/auth/password` - Change the caller's password (no guests)
//! - `POST /api/auth/guests` - Provision a guest account (admin only)
//!
//! Login is the only endpoint here outside the authentication gate; the
//! other three receive the resolved principal through [`CurrentPrincipal`].
//!
//! # Credential Privacy
//!
//! Login failures never reveal which part was wrong: unknown username,
//! deactivated account, and bad password all answer the same generic 401.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppJson, AppResult};
use crate::middleware::CurrentPrincipal;
use crate::models::{
    ChangePasswordRequest, CreateGuestRequest, LoginRequest, LoginResponse, MessageResponse,
    Principal, PrincipalResponse, Role,
};
use crate::state::AppState;
use crate::validation::{
    validate_email, validate_full_name, validate_password, validate_username,
};

/// Token scheme reported in login responses.
const TOKEN_TYPE: &str = "Bearer";

/// Exchange a username and password for a signed access token.
///
/// Counts against the login rate limiter whether it succeeds or fails.
///
/// # Request Body
///
/// ```json
/// {
///   "username": "analyst",
///   "password": "correct horse battery staple"
/// }
/// ```
///
/// # Response Body
///
/// ```json
/// {
///   "token": "eyJhbGciOiJIUzI1NiJ9...",
///   "token_type": "Bearer",
///   "expires_at": "2024-01-15T18:30:00Z",
///   "principal": { "id": "...", "username": "analyst", "role": "user", ... }
/// }
/// ```
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    let principal = state
        .store
        .find_by_username(&payload.username)
        .await
        .map_err(|err| AppError::Unavailable(err.to_string()))?;

    let Some(principal) = principal else {
        warn!(username = %payload.username, "Login attempt for unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let password_matches = state
        .password_hasher
        .verify(&payload.password, &principal.password_hash)
        .map_err(|err| AppError::Unavailable(err.to_string()))?;

    // One rejection for every credential failure; the warn line is where
    // operators see the difference
    if !password_matches {
        warn!(username = %principal.username, "Login attempt with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    if !principal.active {
        warn!(username = %principal.username, "Login attempt on a deactivated account");
        return Err(AppError::InvalidCredentials);
    }

    let issued = state.codec.issue(principal.id)?;

    info!(
        principal_id = %principal.id,
        username = %principal.username,
        role = %principal.role,
        expires_at = %issued.expires_at,
        "Login succeeded"
    );

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_at: issued.expires_at,
        principal: PrincipalResponse::from(&principal),
    }))
}

/// The authenticated principal's own record.
#[instrument(skip_all, fields(username = %principal.username))]
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(&principal))
}

/// Change the caller's own password.
///
/// The current password is re-verified before the change lands, so a stolen
/// token alone cannot rotate the credential. Existing tokens stay valid;
/// token validity is stateless and unaffected by the hash change.
///
/// # Request Body
///
/// ```json
/// {
///   "current_password": "old password here",
///   "new_password": "new password here"
/// }
/// ```
#[instrument(skip_all, fields(username = %principal.username))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate_password(&payload.new_password)?;

    let current_matches = state
        .password_hasher
        .verify(&payload.current_password, &principal.password_hash)
        .map_err(|err| AppError::Unavailable(err.to_string()))?;

    if !current_matches {
        warn!(
            principal_id = %principal.id,
            username = %principal.username,
            "Password change with wrong current password"
        );
        return Err(AppError::InvalidCredentials);
    }

    let new_hash = state
        .password_hasher
        .hash(&payload.new_password)
        .map_err(|err| AppError::Unavailable(err.to_string()))?;

    state
        .store
        .set_password_hash(principal.id, new_hash)
        .await?;

    info!(
        principal_id = %principal.id,
        username = %principal.username,
        "Password changed"
    );

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

/// Provision a guest account. Admin only.
///
/// The guest expiry is fixed at creation time as now plus the configured
/// lifetime; it is not refreshed by activity. Returns 201 with the new
/// account, or 409 when the username is taken.
///
/// # Request Body
///
/// ```json
/// {
///   "username": "visitor-ops",
///   "password": "issued by the admin",
///   "full_name": "Visiting Auditor",
///   "email": "auditor@partner.example"
/// }
/// ```
#[instrument(skip_all, fields(created_by = %admin.0.username))]
pub async fn create_guest(
    State(state): State<AppState>,
    admin: CurrentPrincipal,
    AppJson(payload): AppJson<CreateGuestRequest>,
) -> AppResult<(StatusCode, Json<PrincipalResponse>)> {
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;
    if let Some(full_name) = &payload.full_name {
        validate_full_name(full_name)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    let password_hash = state
        .password_hasher
        .hash(&payload.password)
        .map_err(|err| AppError::Unavailable(err.to_string()))?;

    let expires_at = Utc::now() + state.config.guest_lifetime();

    let mut guest =
        Principal::new(&payload.username, password_hash, Role::Guest).with_guest_expiry(expires_at);
    if let Some(full_name) = payload.full_name {
        guest = guest.with_full_name(full_name);
    }
    if let Some(email) = payload.email {
        guest = guest.with_email(email);
    }

    let response = PrincipalResponse::from(&guest);
    state.store.insert(guest).await?;

    info!(
        username = %payload.username,
        created_by = %admin.0.username,
        expires_at = %expires_at,
        "Guest account provisioned"
    );

    Ok((StatusCode::CREATED, Json(response)))
}
