use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::token::TokenError;

/// Every way a request can fail, each mapped to an HTTP status.
///
/// # Authentication Outcomes
///
/// Authentication failures are split into distinct variants so operators can
/// tell tampering apart from routine expiry in logs and clients:
///
/// - `InvalidToken` - signature mismatch or malformed token (possible replay/tampering)
/// - `ExpiredToken` - token aged out past the clock-skew tolerance
/// - `GuestSessionExpired` - the account-level guest lifetime lapsed, independent
///   of the token's own validity
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or malformed Authorization header")]
    MissingCredential,

    #[error("Token signature or structure is invalid")]
    InvalidToken,

    #[error("Token expired beyond clock-skew tolerance")]
    ExpiredToken,

    #[error("Token references an unknown principal")]
    PrincipalNotFound,

    #[error("Principal is deactivated")]
    PrincipalInactive,

    #[error("Guest account lifetime elapsed")]
    GuestSessionExpired,

    #[error("No authenticated principal attached to the request")]
    Unauthenticated,

    #[error("Principal role is not in the allowed set")]
    Forbidden,

    #[error("Rate limit exceeded")]
    RateLimited {
        message: &'static str,
        retry_after_secs: u64,
    },

    #[error("Request origin is not in the CORS allow-list")]
    OriginNotPermitted,

    #[error("Credentials did not match any active account")]
    InvalidCredentials,

    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication backend unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// JSON body carried by every error response.
///
/// The `stack` field is only populated by the panic recovery layer, and only
/// when the process runs in a non-production mode.
#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log full error details server-side; clients only get sanitized messages
        match &self {
            AppError::Unavailable(_) | AppError::ConfigError(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            _ => {
                tracing::warn!(error = %self, "Request rejected");
            }
        }

        let (status, message) = match &self {
            // Authentication failures - all 401, but with distinct messages
            AppError::MissingCredential => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AppError::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token expired"),
            AppError::PrincipalNotFound => (StatusCode::UNAUTHORIZED, "User not found"),
            AppError::PrincipalInactive => (StatusCode::UNAUTHORIZED, "User account is inactive"),
            AppError::GuestSessionExpired => {
                (StatusCode::UNAUTHORIZED, "Guest session has expired")
            }
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }

            // Authorization failures
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions"),
            AppError::OriginNotPermitted => (StatusCode::FORBIDDEN, "Origin not permitted"),

            // Rate limiting carries its scope-specific message and a retry hint
            AppError::RateLimited {
                message,
                retry_after_secs,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    axum::Json(ErrorBody {
                        message: (*message).to_string(),
                        stack: None,
                    }),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }

            // Conflicts and validation - safe to show the message as-is
            AppError::DuplicateUsername => (StatusCode::CONFLICT, "Username is already taken"),
            AppError::Validation(msg) => {
                return (
                    StatusCode::BAD_REQUEST,
                    axum::Json(ErrorBody {
                        message: msg.clone(),
                        stack: None,
                    }),
                )
                    .into_response();
            }

            // Infrastructure errors - never leak backend details to clients
            AppError::Unavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service unavailable",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service configuration error",
            ),
        };

        let body = ErrorBody {
            message: message.to_string(),
            stack: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::ExpiredToken,
            TokenError::Invalid => AppError::InvalidToken,
            TokenError::Signing(msg) => AppError::Unavailable(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AppError::DuplicateUsername,
            StoreError::NotFound => AppError::PrincipalNotFound,
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
        }
    }
}

/// JSON extractor that reports rejections in the standard error body shape.
///
/// `axum::Json` replies to malformed bodies with plain text; wrapping it keeps
/// every failure response in the `{ "message": ... }` format.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::Validation(sanitize_json_rejection(&rejection))),
        }
    }
}

/// Sanitize JSON rejection messages to avoid leaking internal type information.
///
/// Deserialization errors can contain internal struct/field names which
/// shouldn't be exposed to external clients. This function extracts the
/// useful parts.
fn sanitize_json_rejection(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            return "Expected request with Content-Type: application/json".to_string();
        }
        JsonRejection::JsonSyntaxError(_) => {
            return "Malformed JSON in request body".to_string();
        }
        _ => {}
    }

    let msg = rejection.body_text();

    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Missing required field: {field}");
    }

    if msg.contains("unknown field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Unknown field: {field}");
    }

    if msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Shorthand for fallible operations that surface as HTTP errors.
pub type AppResult<T> = Result<T, AppError>;
