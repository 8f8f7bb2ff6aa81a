use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Principal, Role};

/// Request to exchange credentials for an access token.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name
    pub username: String,
    /// Plaintext password, verified against the stored Argon2id hash
    pub password: String,
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Signed access token
    pub token: String,
    /// Token scheme expected in the Authorization header
    pub token_type: String,
    /// Instant after which the token stops verifying (before skew tolerance)
    pub expires_at: DateTime<Utc>,
    /// The authenticated principal
    pub principal: PrincipalResponse,
}

/// Request to create a guest account. Admin only.
#[derive(Debug, Deserialize)]
pub struct CreateGuestRequest {
    /// Login name for the guest (must be unique)
    pub username: String,
    /// Initial password for the guest
    pub password: String,
    /// Display name; defaults to the username when omitted
    #[serde(default)]
    pub full_name: Option<String>,
    /// Contact email, usually absent for walk-in guests
    #[serde(default)]
    pub email: Option<String>,
}

/// Request to change the caller's own password.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password, re-verified before the change is applied
    pub current_password: String,
    /// Replacement password
    pub new_password: String,
}

/// Public view of a principal. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    /// Principal identifier
    pub id: Uuid,
    /// Login name
    pub username: String,
    /// Display name
    pub full_name: String,
    /// Contact email, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Access role
    pub role: Role,
    /// Whether the account can still authenticate
    pub active: bool,
    /// Guest expiry timestamp, omitted for admins and users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_expires_at: Option<DateTime<Utc>>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            username: principal.username.clone(),
            full_name: principal.full_name.clone(),
            email: principal.email.clone(),
            role: principal.role,
            active: principal.active,
            guest_expires_at: principal.guest_expires_at,
            created_at: principal.created_at,
        }
    }
}

/// Generic acknowledgment body for state-changing endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable confirmation
    pub message: String,
}

/// Body returned by the liveness probe.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" when the process can answer at all
    pub status: String,
    /// Crate version baked in at compile time
    pub version: String,
    /// Seconds since process start
    pub uptime_seconds: u64,
    /// Wall-clock time of this reply
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"username": "analyst", "password": "hunter2hunter2"}"#;
        let request: LoginRequest =
            serde_json::from_str(json).expect("Deserialization should succeed");

        assert_eq!(request.username, "analyst");
        assert_eq!(request.password, "hunter2hunter2");
    }

    #[test]
    fn test_principal_response_hides_password_hash() {
        let principal = Principal::new("analyst", "$argon2id$stub", Role::User);
        let response = PrincipalResponse::from(&principal);

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"username\":\"analyst\""));
    }

    #[test]
    fn test_principal_response_omits_absent_guest_expiry() {
        let principal = Principal::new("analyst", "$argon2id$stub", Role::User);
        let response = PrincipalResponse::from(&principal);

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(!json.contains("guest_expires_at"));
    }

    #[test]
    fn test_login_response_serialization() {
        let principal = Principal::new("analyst", "$argon2id$stub", Role::User);
        let response = LoginResponse {
            token: "abc.def.ghi".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Utc::now(),
            principal: PrincipalResponse::from(&principal),
        };

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(json.contains("\"token_type\":\"Bearer\""));
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_seconds: 42,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(json.contains("\"status\":\"healthy\""));
    }
}
