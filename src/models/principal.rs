use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access role attached to every principal.
///
/// Roles are flat labels with no hierarchy: an admin is not implicitly
/// a user, and route guards match the exact set they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access, including guest account issuance.
    Admin,
    /// Regular analyst account.
    User,
    /// Short-lived guest account with a hard expiry timestamp.
    Guest,
}

impl Role {
    /// Stable lowercase label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity as stored in the principal store.
///
/// The `password_hash` field holds a PHC-format Argon2id string and never
/// leaves the process; API responses use [`crate::models::PrincipalResponse`]
/// instead, and the manual [`fmt::Debug`] impl redacts it from log output.
#[derive(Clone)]
pub struct Principal {
    /// Unique principal identifier, embedded in issued tokens as `sub`
    pub id: Uuid,
    /// Login name, unique across the store
    pub username: String,
    /// Argon2id PHC hash of the password
    pub password_hash: String,
    /// Display name shown in the shift log
    pub full_name: String,
    /// Contact email; guests typically have none
    pub email: Option<String>,
    /// Access role
    pub role: Role,
    /// Deactivated principals fail authentication even with a valid token
    pub active: bool,
    /// Hard expiry for guest accounts; `None` for admins and users
    pub guest_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Create an active principal with a fresh id.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            id: Uuid::new_v4(),
            full_name: username.clone(),
            username,
            password_hash: password_hash.into(),
            email: None,
            role,
            active: true,
            guest_expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Set the display name.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    /// Set the contact email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach a guest expiry timestamp.
    pub fn with_guest_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.guest_expires_at = Some(expires_at);
        self
    }

    /// Whether this principal is a guest whose lifetime window has passed.
    ///
    /// Expiry is strict: a guest checked exactly at its expiry instant is
    /// still valid. Callers that observe `true` are expected to deactivate
    /// the account through the store before rejecting the request.
    pub fn guest_expired(&self, now: DateTime<Utc>) -> bool {
        self.role == Role::Guest && self.guest_expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("active", &self.active)
            .field("guest_expires_at", &self.guest_expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}
