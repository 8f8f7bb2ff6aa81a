//! End-to-end tests for the authentication pipeline over a live listener.
//!
//! Each test boots the full router (every middleware layer included) on an
//! ephemeral port with an in-memory principal store, then drives it with a
//! real HTTP client. Fixtures are per-test, so rate limit buckets and seeded
//! accounts never leak between tests.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

use bitacora_auth::config::Environment;
use bitacora_auth::models::{Principal, Role};
use bitacora_auth::store::MemoryPrincipalStore;
use bitacora_auth::token::TokenClaims;
use bitacora_auth::{AppState, Config, build_router};

const TEST_SECRET: &str = "pipeline-test-secret-0123456789";

/// Development-mode configuration: general limiter off, origins mirrored.
fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        token_secret: TEST_SECRET.to_string(),
        log_level: "warn".to_string(),
        ..Config::default()
    }
}

/// Production-mode configuration with an explicit origin allow-list and a
/// configurable general rate limit.
fn production_config(origins: Vec<String>, rate_limit_max: u32) -> Config {
    Config {
        environment: Environment::Production,
        cors_allowed_origins: origins,
        rate_limit_max,
        ..test_config()
    }
}

/// Test fixture running the full application on an ephemeral port.
struct TestFixture {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestFixture {
    /// Boot the application in development mode.
    async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Boot the application with the given configuration.
    async fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryPrincipalStore::new());
        let state = AppState::new(store, config);
        let app = build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Insert an active principal straight into the store.
    async fn seed_principal(&self, username: &str, password: &str, role: Role) -> Principal {
        let hash = self
            .state
            .password_hasher
            .hash(password)
            .expect("Failed to hash password");
        let principal = Principal::new(username, hash, role);
        self.state
            .store
            .insert(principal.clone())
            .await
            .expect("Failed to seed principal");
        principal
    }

    /// Insert an active guest with the given expiry.
    async fn seed_guest(
        &self,
        username: &str,
        password: &str,
        expires_at: DateTime<Utc>,
    ) -> Principal {
        let hash = self
            .state
            .password_hasher
            .hash(password)
            .expect("Failed to hash password");
        let principal = Principal::new(username, hash, Role::Guest).with_guest_expiry(expires_at);
        self.state
            .store
            .insert(principal.clone())
            .await
            .expect("Failed to seed guest");
        principal
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .expect("Login request failed")
    }

    /// Log in and return the bearer token, panicking on failure.
    async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(response.status().as_u16(), 200, "login should succeed");

        let body: serde_json::Value = response.json().await.expect("Failed to parse login body");
        body.get("token")
            .and_then(|v| v.as_str())
            .expect("token missing")
            .to_string()
    }

    async fn get_me(&self, token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .expect("Me request failed")
    }
}

/// Sign a token with the given lifetime offsets, bypassing the issuing codec.
fn craft_token(principal_id: Uuid, secret: &str, issued_offset_secs: i64, ttl_secs: i64) -> String {
    let issued_at = Utc::now().timestamp() + issued_offset_secs;
    let claims = TokenClaims {
        principal_id,
        iat: issued_at,
        nbf: issued_at,
        exp: issued_at + ttl_secs,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode token")
}

/// Assert a response has the given status and `{ "message": ... }` body.
async fn assert_error(response: reqwest::Response, status: u16, message: &str) {
    assert_eq!(response.status().as_u16(), status);

    let body: serde_json::Value = response.json().await.expect("Failed to parse error body");
    assert_eq!(
        body.get("message").and_then(|v| v.as_str()),
        Some(message),
        "unexpected error message"
    );
}

// ============================================================================
// Health & Probe Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Health request failed");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body.get("status").and_then(|v| v.as_str()),
        Some("healthy")
    );
    assert!(body.get("version").is_some());
    assert!(body.get("uptime_seconds").is_some());
    assert!(body.get("timestamp").is_some());
}

#[tokio::test]
async fn test_readiness_endpoint() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/ready"))
        .send()
        .await
        .expect("Readiness request failed");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_probes_require_no_token() {
    let fixture = TestFixture::new().await;

    // No Authorization header on either probe
    for path in ["/health", "/ready"] {
        let response = fixture
            .client
            .get(fixture.url(path))
            .send()
            .await
            .expect("Probe request failed");
        assert!(response.status().is_success(), "{path} should be open");
    }
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_returns_token_and_principal() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;

    let response = fixture.login("analyst", "correct-horse-battery").await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body.get("token_type").and_then(|v| v.as_str()),
        Some("Bearer")
    );
    assert!(body.get("expires_at").is_some());

    let principal = body.get("principal").expect("principal missing");
    assert_eq!(
        principal.get("username").and_then(|v| v.as_str()),
        Some("analyst")
    );
    assert_eq!(principal.get("role").and_then(|v| v.as_str()), Some("user"));
    assert!(principal.get("password_hash").is_none());

    // The issued token must authenticate follow-up requests
    let token = body
        .get("token")
        .and_then(|v| v.as_str())
        .expect("token missing");
    let me = fixture.get_me(token).await;
    assert_eq!(me.status().as_u16(), 200);
}

#[tokio::test]
async fn test_login_rejections_are_uniform() {
    let fixture = TestFixture::new().await;
    let seeded = fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;

    // Unknown username
    let response = fixture.login("nobody", "correct-horse-battery").await;
    assert_error(response, 401, "Invalid username or password").await;

    // Known username, wrong password
    let response = fixture.login("analyst", "wrong-password").await;
    assert_error(response, 401, "Invalid username or password").await;

    // Deactivated account with the right password
    fixture
        .state
        .store
        .deactivate(seeded.id)
        .await
        .expect("Failed to deactivate");
    let response = fixture.login("analyst", "correct-horse-battery").await;
    assert_error(response, 401, "Invalid username or password").await;
}

#[tokio::test]
async fn test_login_validates_payload() {
    let fixture = TestFixture::new().await;

    // Username below the minimum length never reaches the store
    let response = fixture.login("ab", "correct-horse-battery").await;
    assert_eq!(response.status().as_u16(), 400);

    let response = fixture.login("analyst", "short").await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_login_rejects_malformed_json() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 400, "Malformed JSON in request body").await;
}

// ============================================================================
// Token Verification Tests
// ============================================================================

#[tokio::test]
async fn test_me_requires_token() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 401, "Authentication required").await;
}

#[tokio::test]
async fn test_me_rejects_garbage_token() {
    let fixture = TestFixture::new().await;

    let response = fixture.get_me("definitely-not-a-jwt").await;
    assert_error(response, 401, "Invalid token").await;
}

#[tokio::test]
async fn test_expired_and_tampered_tokens_are_distinguishable() {
    let fixture = TestFixture::new().await;
    let seeded = fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;

    // Expired two hours ago, far past the clock-skew tolerance
    let expired = craft_token(seeded.id, TEST_SECRET, -10_800, 3_600);
    let response = fixture.get_me(&expired).await;
    assert_error(response, 401, "Token expired").await;

    // Fresh but signed with a different secret
    let forged = craft_token(seeded.id, "some-other-secret-material", 0, 3_600);
    let response = fixture.get_me(&forged).await;
    assert_error(response, 401, "Invalid token").await;
}

#[tokio::test]
async fn test_token_for_unknown_principal_is_rejected() {
    let fixture = TestFixture::new().await;

    // Correctly signed, but the subject was never provisioned
    let token = craft_token(Uuid::new_v4(), TEST_SECRET, 0, 3_600);
    let response = fixture.get_me(&token).await;
    assert_error(response, 401, "User not found").await;
}

#[tokio::test]
async fn test_deactivated_principal_is_rejected() {
    let fixture = TestFixture::new().await;
    let seeded = fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;
    let token = fixture.token_for("analyst", "correct-horse-battery").await;

    fixture
        .state
        .store
        .deactivate(seeded.id)
        .await
        .expect("Failed to deactivate");

    // The token is still cryptographically valid; the store check rejects it
    let response = fixture.get_me(&token).await;
    assert_error(response, 401, "User account is inactive").await;
}

// ============================================================================
// Guest Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_guest_within_lifetime_is_served() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_guest("visitor", "temporary-pass-123", Utc::now() + chrono::Duration::hours(1))
        .await;

    let token = fixture.token_for("visitor", "temporary-pass-123").await;
    let response = fixture.get_me(&token).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.get("role").and_then(|v| v.as_str()), Some("guest"));
    assert!(body.get("guest_expires_at").is_some());
}

#[tokio::test]
async fn test_expired_guest_is_locked_out_and_deactivated() {
    let fixture = TestFixture::new().await;
    let seeded = fixture
        .seed_guest("visitor", "temporary-pass-123", Utc::now() - chrono::Duration::hours(1))
        .await;

    // Login itself still succeeds: expiry is enforced at the gate, where the
    // deactivation side effect can be applied atomically with the rejection
    let token = fixture.token_for("visitor", "temporary-pass-123").await;

    // First authenticated request observes the expiry and deactivates
    let response = fixture.get_me(&token).await;
    assert_error(response, 401, "Guest session has expired").await;

    let stored = fixture
        .state
        .store
        .find_by_id(seeded.id)
        .await
        .expect("Store lookup failed")
        .expect("Guest disappeared");
    assert!(!stored.active, "expired guest should be deactivated");

    // Replay of the same token now fails on the inactive flag
    let response = fixture.get_me(&token).await;
    assert_error(response, 401, "User account is inactive").await;
}

// ============================================================================
// Role Gate Tests
// ============================================================================

#[tokio::test]
async fn test_guest_creation_requires_admin() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("admin", "admin-pass-word", Role::Admin)
        .await;
    fixture
        .seed_principal("analyst", "user-pass-word1", Role::User)
        .await;

    let payload = json!({"username": "visitor", "password": "temporary-pass-123"});

    // A regular user is authenticated but not authorized
    let user_token = fixture.token_for("analyst", "user-pass-word1").await;
    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&user_token)
        .json(&payload)
        .send()
        .await
        .expect("Request failed");
    assert_error(response, 403, "Insufficient permissions").await;

    // An admin is
    let admin_token = fixture.token_for("admin", "admin-pass-word").await;
    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&admin_token)
        .json(&payload)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn test_password_change_is_forbidden_for_guests() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_guest("visitor", "temporary-pass-123", Utc::now() + chrono::Duration::hours(1))
        .await;

    let token = fixture.token_for("visitor", "temporary-pass-123").await;
    let response = fixture
        .client
        .post(fixture.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({
            "current_password": "temporary-pass-123",
            "new_password": "a-new-password-42"
        }))
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 403, "Insufficient permissions").await;
}

#[tokio::test]
async fn test_role_gate_rejects_before_handler_but_after_auth() {
    let fixture = TestFixture::new().await;

    // Unauthenticated request to an admin route fails on authentication,
    // not authorization
    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .json(&json!({"username": "visitor", "password": "temporary-pass-123"}))
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 401, "Authentication required").await;
}

// ============================================================================
// Guest Provisioning Tests
// ============================================================================

#[tokio::test]
async fn test_create_guest_sets_role_and_expiry() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("admin", "admin-pass-word", Role::Admin)
        .await;
    let admin_token = fixture.token_for("admin", "admin-pass-word").await;

    let before = Utc::now();
    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "username": "visitor",
            "password": "temporary-pass-123",
            "full_name": "Visiting Auditor",
            "email": "auditor@partner.example"
        }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.get("role").and_then(|v| v.as_str()), Some("guest"));
    assert_eq!(body.get("active").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        body.get("full_name").and_then(|v| v.as_str()),
        Some("Visiting Auditor")
    );

    // Expiry lands guest_lifetime_hours (48 by default) from creation
    let expires_at: DateTime<Utc> = body
        .get("guest_expires_at")
        .and_then(|v| v.as_str())
        .expect("guest_expires_at missing")
        .parse()
        .expect("guest_expires_at not a timestamp");
    let expected = before + chrono::Duration::hours(48);
    let drift = (expires_at - expected).num_seconds().abs();
    assert!(drift < 300, "expiry drifted {drift}s from creation + 48h");

    // And the account is actually usable
    let guest_token = fixture.token_for("visitor", "temporary-pass-123").await;
    let me = fixture.get_me(&guest_token).await;
    assert_eq!(me.status().as_u16(), 200);
}

#[tokio::test]
async fn test_create_guest_rejects_duplicate_username() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("admin", "admin-pass-word", Role::Admin)
        .await;
    let admin_token = fixture.token_for("admin", "admin-pass-word").await;

    let payload = json!({"username": "visitor", "password": "temporary-pass-123"});
    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&admin_token)
        .json(&payload)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 201);

    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&admin_token)
        .json(&payload)
        .send()
        .await
        .expect("Request failed");
    assert_error(response, 409, "Username is already taken").await;
}

#[tokio::test]
async fn test_create_guest_validates_input() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("admin", "admin-pass-word", Role::Admin)
        .await;
    let admin_token = fixture.token_for("admin", "admin-pass-word").await;

    let response = fixture
        .client
        .post(fixture.url("/api/auth/guests"))
        .bearer_auth(&admin_token)
        .json(&json!({"username": "!bad!", "password": "temporary-pass-123"}))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 400);
}

// ============================================================================
// Password Change Tests
// ============================================================================

#[tokio::test]
async fn test_password_change_flow() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "original-password", Role::User)
        .await;
    let token = fixture.token_for("analyst", "original-password").await;

    let response = fixture
        .client
        .post(fixture.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({
            "current_password": "original-password",
            "new_password": "replacement-password"
        }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body.get("message").and_then(|v| v.as_str()),
        Some("Password updated")
    );

    // Sessions are stateless: the token issued before the change still works
    let me = fixture.get_me(&token).await;
    assert_eq!(me.status().as_u16(), 200);

    // The old password no longer logs in, the new one does
    let response = fixture.login("analyst", "original-password").await;
    assert_error(response, 401, "Invalid username or password").await;
    let response = fixture.login("analyst", "replacement-password").await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_password_change_rejects_wrong_current_password() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "original-password", Role::User)
        .await;
    let token = fixture.token_for("analyst", "original-password").await;

    let response = fixture
        .client
        .post(fixture.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({
            "current_password": "not-the-password",
            "new_password": "replacement-password"
        }))
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 401, "Invalid username or password").await;
}

#[tokio::test]
async fn test_password_change_validates_new_password() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "original-password", Role::User)
        .await;
    let token = fixture.token_for("analyst", "original-password").await;

    let response = fixture
        .client
        .post(fixture.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({
            "current_password": "original-password",
            "new_password": "short"
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 400);
}

// ============================================================================
// Correlation ID Tests
// ============================================================================

#[tokio::test]
async fn test_response_carries_generated_request_id() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Request failed");

    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("x-request-id missing");
    assert!(Uuid::try_parse(request_id).is_ok(), "id is not a UUID");
}

#[tokio::test]
async fn test_inbound_request_id_is_echoed() {
    let fixture = TestFixture::new().await;
    let supplied = Uuid::new_v4().to_string();

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("x-request-id", &supplied)
        .send()
        .await
        .expect("Request failed");

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some(supplied.as_str())
    );
}

#[tokio::test]
async fn test_malformed_request_id_is_replaced() {
    let fixture = TestFixture::new().await;

    for bad in ["not-a-uuid", "{8b147b2a-0000-0000-0000-000000000000}"] {
        let response = fixture
            .client
            .get(fixture.url("/health"))
            .header("x-request-id", bad)
            .send()
            .await
            .expect("Request failed");

        let echoed = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .expect("x-request-id missing");
        assert_ne!(echoed, bad, "malformed id must not be echoed");
        assert!(Uuid::try_parse(echoed).is_ok());
    }
}

#[tokio::test]
async fn test_error_responses_carry_request_id() {
    let fixture = TestFixture::new().await;

    // A 401 produced deep inside the auth gate still gets the header
    let response = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 401);
    assert!(response.headers().get("x-request-id").is_some());
}

// ============================================================================
// Rate Limiting Tests
// ============================================================================

#[tokio::test]
async fn test_login_rate_limit_locks_out_sixth_attempt() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;

    // Five failures are counted and rejected on their own merits
    for attempt in 1..=5u32 {
        let response = fixture.login("analyst", "wrong-password").await;
        assert_eq!(response.status().as_u16(), 401);
        assert_eq!(
            response
                .headers()
                .get("ratelimit-limit")
                .and_then(|v| v.to_str().ok()),
            Some("5")
        );
        assert_eq!(
            response
                .headers()
                .get("ratelimit-remaining")
                .and_then(|v| v.to_str().ok()),
            Some((5 - attempt).to_string().as_str())
        );
        // Legacy header names are suppressed
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    // The sixth is cut off before credential checking, valid or not
    let response = fixture.login("analyst", "correct-horse-battery").await;
    assert_eq!(response.status().as_u16(), 429);

    let retry_after: u64 = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .expect("Retry-After missing")
        .parse()
        .expect("Retry-After not a number");
    assert!(retry_after >= 1);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body.get("message").and_then(|v| v.as_str()),
        Some("Too many login attempts, please try again later")
    );
}

#[tokio::test]
async fn test_successful_logins_count_against_the_login_window() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_principal("analyst", "correct-horse-battery", Role::User)
        .await;

    let response = fixture.login("analyst", "correct-horse-battery").await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response
            .headers()
            .get("ratelimit-remaining")
            .and_then(|v| v.to_str().ok()),
        Some("4")
    );
}

#[tokio::test]
async fn test_general_rate_limit_is_disabled_in_development() {
    let fixture = TestFixture::new().await;

    for _ in 0..8 {
        let response = fixture
            .client
            .get(fixture.url("/health"))
            .send()
            .await
            .expect("Request failed");
        assert!(response.status().is_success());
        assert!(
            response.headers().get("ratelimit-limit").is_none(),
            "no limiter headers expected outside production"
        );
    }
}

#[tokio::test]
async fn test_general_rate_limit_is_enforced_in_production() {
    let fixture =
        TestFixture::with_config(production_config(vec!["https://soc.example.com".into()], 3))
            .await;

    for _ in 0..3 {
        let response = fixture
            .client
            .get(fixture.url("/health"))
            .send()
            .await
            .expect("Request failed");
        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get("ratelimit-limit")
                .and_then(|v| v.to_str().ok()),
            Some("3")
        );
    }

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Request failed");
    assert_error(response, 429, "Too many requests, please try again later").await;
}

// ============================================================================
// CORS & Origin Policy Tests
// ============================================================================

#[tokio::test]
async fn test_development_mirrors_any_origin() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "http://localhost:5173")
        .send()
        .await
        .expect("Request failed");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn test_production_allows_listed_origin() {
    let fixture =
        TestFixture::with_config(production_config(vec!["https://soc.example.com".into()], 50))
            .await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "https://soc.example.com")
        .send()
        .await
        .expect("Request failed");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://soc.example.com")
    );
}

#[tokio::test]
async fn test_production_rejects_unlisted_origin() {
    let fixture =
        TestFixture::with_config(production_config(vec!["https://soc.example.com".into()], 50))
            .await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .expect("Request failed");

    assert_error(response, 403, "Origin not permitted").await;
}

#[tokio::test]
async fn test_requests_without_origin_bypass_the_guard() {
    let fixture =
        TestFixture::with_config(production_config(vec!["https://soc.example.com".into()], 50))
            .await;

    // Same-origin and non-browser clients send no Origin header
    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Request failed");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_preflight_for_listed_origin() {
    let fixture =
        TestFixture::with_config(production_config(vec!["https://soc.example.com".into()], 50))
            .await;

    let response = fixture
        .client
        .request(reqwest::Method::OPTIONS, fixture.url("/api/auth/login"))
        .header("origin", "https://soc.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("Preflight request failed");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://soc.example.com")
    );
    let allowed_methods = response
        .headers()
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .expect("allow-methods missing");
    assert!(allowed_methods.contains("POST"));
}

// ============================================================================
// Payload Limit Tests
// ============================================================================

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let fixture = TestFixture::new().await;

    // Well over the 64 KiB body cap
    let oversized = "x".repeat(128 * 1024);
    let response = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({"username": "analyst", "password": oversized}))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 400);
}

// ============================================================================
// Bootstrap Admin Tests
// ============================================================================

#[tokio::test]
async fn test_bootstrap_admin_can_login() {
    let config = Config {
        bootstrap_admin_username: Some("root".to_string()),
        bootstrap_admin_password: Some("bootstrap-pass-1".to_string()),
        ..test_config()
    };
    let fixture = TestFixture::with_config(config).await;
    fixture
        .state
        .seed_bootstrap_admin()
        .await
        .expect("Seeding failed");

    let token = fixture.token_for("root", "bootstrap-pass-1").await;
    let response = fixture.get_me(&token).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.get("role").and_then(|v| v.as_str()), Some("admin"));
}
