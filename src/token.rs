//! Session token issuance and verification.
//!
//! Tokens are HMAC-SHA256 signed JWTs binding a principal id to an
//! issued-at/expiry pair. Validity is stateless: the server holds no session
//! table, and a token is good exactly while its signature verifies and the
//! current time falls inside `[iat - skew, exp + skew]`.
//!
//! # Clock Skew
//!
//! A fixed symmetric tolerance of 60 seconds absorbs clock drift between the
//! server and clients or proxies. All time comparisons operate on whole
//! seconds since the Unix epoch.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Symmetric clock-skew tolerance applied to both validity boundaries.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// Token verification and signing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Signature mismatch, malformed structure, or claims outside the
    /// acceptable window in a way that suggests tampering.
    #[error("token is malformed or its signature does not verify")]
    Invalid,

    /// Structurally sound and correctly signed, but aged out past the
    /// clock-skew tolerance.
    #[error("token expired beyond the clock-skew tolerance")]
    Expired,

    /// Signing failed. Should not happen with a symmetric key; surfaced as
    /// an infrastructure error rather than swallowed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal the token is bound to
    #[serde(rename = "sub")]
    pub principal_id: Uuid,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    /// Not-before, always equal to `iat`
    pub nbf: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// A freshly signed token together with its computed expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT string
    pub token: String,
    /// Expiry instant embedded in the claims (before skew tolerance)
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens with a shared symmetric secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenCodec {
    /// Build a codec from the signing secret and token time-to-live.
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["sub", "exp", "nbf"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Sign a token for the given principal, expiring `ttl_secs` from now.
    pub fn issue(&self, principal_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal_id, Utc::now())
    }

    fn issue_at(&self, principal_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let issued_at = now.timestamp();
        let expiry = issued_at.saturating_add(self.ttl_secs as i64);

        let claims = TokenClaims {
            principal_id,
            iat: issued_at,
            nbf: issued_at,
            exp: expiry,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))?;
        let expires_at = DateTime::from_timestamp(expiry, 0)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return its embedded claims.
    ///
    /// Distinguishes expiry from every other failure mode: operators need to
    /// tell routine token aging apart from replay or tampering attempts.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                // A token claiming issuance further in the future than the
                // allowed skew is treated as tampered, not merely early
                ErrorKind::ImmatureSignature => TokenError::Invalid,
                _ => TokenError::Invalid,
            })?;

        Ok(token_data.claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
