//! Runtime configuration, read once from the environment at startup.
//!
//! # Required Variables
//!
//! - `TOKEN_SECRET`: symmetric signing secret for session tokens
//! - `CORS_ALLOWED_ORIGINS`: origin allow-list, required only in production
//!
//! Startup fails with a non-zero exit when any required value is missing,
//! rather than serving traffic in a partially-configured state.
//!
//! # Mode and CORS
//!
//! - `APP_ENV`: `production` enables the general rate limiter and strict
//!   CORS; any other value selects development mode
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origins, or `*` to allow all
//!
//! # Tuning
//!
//! - `TOKEN_TTL_SECS`: token lifetime (default: 28800, one shift)
//! - `GUEST_LIFETIME_HOURS`: guest account lifetime (default: 48)
//! - `RATE_LIMIT_WINDOW_SECS` / `RATE_LIMIT_MAX`: general limiter overrides

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Minimum accepted length for the token signing secret.
const MIN_SECRET_LENGTH: usize = 16;

/// Process execution mode.
///
/// Production mode turns on the general API rate limiter and enforces the
/// CORS allow-list; development mode relaxes both for local work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime settings for the service.
///
/// Constructed once at startup and passed by reference into each component;
/// nothing reads the environment after this point.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// let listener = TcpListener::bind(config.server_addr()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Listener Configuration
    // =========================================================================
    /// Bind address (default: "0.0.0.0")
    pub host: String,

    /// Listen port (default: 3000)
    pub port: u16,

    /// Execution mode (default: development)
    pub environment: Environment,

    // =========================================================================
    // Token Configuration
    // =========================================================================
    /// Symmetric signing secret for session tokens. Required.
    pub token_secret: String,

    /// Token time-to-live in seconds (default: 28800 = 8 hours)
    pub token_ttl_secs: u64,

    // =========================================================================
    // Guest Policy Configuration
    // =========================================================================
    /// Guest account lifetime in hours, measured from creation (default: 48)
    pub guest_lifetime_hours: u64,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Fixed window length for the general API limiter (default: 15 minutes)
    pub rate_limit_window: Duration,

    /// Maximum requests per source IP per window for the general API limiter
    /// (default: 100)
    pub rate_limit_max: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins. `*` permits any origin.
    ///
    /// Required in production; development mode mirrors every origin back
    /// regardless of this list.
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Bootstrap Configuration
    // =========================================================================
    /// Username for the seeded admin account (optional; requires the password)
    pub bootstrap_admin_username: Option<String>,

    /// Password for the seeded admin account (optional; requires the username)
    pub bootstrap_admin_password: Option<String>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Log filter handed to the tracing subscriber (default: "info")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` when a required variable is missing,
    /// a value does not parse, or the combination is inconsistent (e.g. a
    /// production process without a CORS allow-list).
    pub fn from_env() -> AppResult<Self> {
        // A missing .env file is fine; deployments set variables directly
        let _ = dotenvy::dotenv();

        let environment = Self::parse_environment();

        let cors_allowed_origins = match Self::parse_cors_origins() {
            Some(origins) => origins,
            None if environment.is_production() => {
                return Err(AppError::ConfigError(
                    "CORS_ALLOWED_ORIGINS must be set in production".to_string(),
                ));
            }
            None => vec!["*".to_string()],
        };

        let config = Self {
            // Listener
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            environment,

            // Tokens
            token_secret: Self::require_env("TOKEN_SECRET")?,
            token_ttl_secs: Self::parse_env("TOKEN_TTL_SECS", 28800)?,

            // Guest policy
            guest_lifetime_hours: Self::parse_env("GUEST_LIFETIME_HOURS", 48)?,

            // Rate limiting
            rate_limit_window: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_WINDOW_SECS",
                900,
            )?),
            rate_limit_max: Self::parse_env("RATE_LIMIT_MAX", 100)?,

            // CORS
            cors_allowed_origins,

            // Bootstrap
            bootstrap_admin_username: env::var("BOOTSTRAP_ADMIN_USERNAME")
                .ok()
                .filter(|v| !v.is_empty()),
            bootstrap_admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty()),

            // Logging
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Reject values that parse but cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` naming the offending variable.
    fn validate(&self) -> AppResult<()> {
        if self.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::ConfigError(format!(
                "TOKEN_SECRET must be at least {MIN_SECRET_LENGTH} characters"
            )));
        }

        if self.token_ttl_secs == 0 {
            return Err(AppError::ConfigError(
                "TOKEN_TTL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.guest_lifetime_hours == 0 {
            return Err(AppError::ConfigError(
                "GUEST_LIFETIME_HOURS must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_max == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_MAX must be greater than 0".to_string(),
            ));
        }

        if self.is_production() && self.cors_allowed_origins.is_empty() {
            return Err(AppError::ConfigError(
                "CORS_ALLOWED_ORIGINS must list at least one origin in production".to_string(),
            ));
        }

        if self.bootstrap_admin_username.is_some() != self.bootstrap_admin_password.is_some() {
            return Err(AppError::ConfigError(
                "BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Socket address string for the TCP listener.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if the process runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// Check if the general API rate limiter is enforced.
    ///
    /// The limiter is a no-op outside production so local development and
    /// test traffic is never throttled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.is_production()
    }

    /// Check if the allow-list contains the wildcard marker.
    pub fn cors_allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|origin| origin == "*")
    }

    /// Guest account lifetime as a chrono duration.
    pub fn guest_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.guest_lifetime_hours as i64)
    }

    /// Read and parse an optional variable, falling back to `default`.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Read a required environment variable, rejecting empty values.
    fn require_env(name: &str) -> AppResult<String> {
        env::var(name)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::ConfigError(format!("{name} must be set")))
    }

    /// Parse the execution mode from `APP_ENV`.
    ///
    /// Only the exact value `production` selects production mode; anything
    /// else, including an unset variable, runs in development mode.
    fn parse_environment() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Split `CORS_ALLOWED_ORIGINS` into trimmed, non-empty entries.
    ///
    /// Returns `None` when the variable is unset, so production startup can
    /// distinguish "not configured" from "configured empty".
    fn parse_cors_origins() -> Option<Vec<String>> {
        env::var("CORS_ALLOWED_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

/// Development and test defaults; deployments use `Config::from_env()`.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Listener
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Development,
            // Tokens
            token_secret: "development-secret-change-me".to_string(),
            token_ttl_secs: 28800,
            // Guest policy
            guest_lifetime_hours: 48,
            // Rate limiting
            rate_limit_window: Duration::from_secs(900),
            rate_limit_max: 100,
            // CORS
            cors_allowed_origins: vec!["*".to_string()],
            // Bootstrap
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
            // Logging
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.token_ttl_secs, 28800);
        assert_eq!(config.guest_lifetime_hours, 48);
        assert_eq!(config.rate_limit_max, 100);
        assert!(config.bootstrap_admin_username.is_none());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "localhost".to_string(),
            port: 3000,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "localhost:3000");
    }

    #[test]
    fn test_rate_limiting_follows_environment() {
        let config = Config::default();
        assert!(!config.rate_limiting_enabled());

        let config = Config {
            environment: Environment::Production,
            ..Config::default()
        };
        assert!(config.rate_limiting_enabled());
    }

    #[test]
    fn test_cors_allows_any_origin() {
        let config = Config::default();
        assert!(config.cors_allows_any_origin());

        let config = Config {
            cors_allowed_origins: vec!["http://10.0.0.5:4200".to_string()],
            ..Config::default()
        };
        assert!(!config.cors_allows_any_origin());
    }

    #[test]
    fn test_guest_lifetime_conversion() {
        let config = Config {
            guest_lifetime_hours: 48,
            ..Config::default()
        };

        assert_eq!(config.guest_lifetime(), chrono::Duration::hours(48));
    }

    #[test]
    fn test_validate_short_secret() {
        let config = Config {
            token_secret: "short".to_string(),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TOKEN_SECRET"));
    }

    #[test]
    fn test_validate_zero_token_ttl() {
        let config = Config {
            token_ttl_secs: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TOKEN_TTL_SECS"));
    }

    #[test]
    fn test_validate_zero_rate_limit_max() {
        let config = Config {
            rate_limit_max: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("RATE_LIMIT_MAX"));
    }

    #[test]
    fn test_validate_empty_cors_list_in_production() {
        let config = Config {
            environment: Environment::Production,
            cors_allowed_origins: vec![],
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("CORS_ALLOWED_ORIGINS")
        );

        // The same empty list is fine outside production
        let config = Config {
            cors_allowed_origins: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bootstrap_credentials_must_pair() {
        let config = Config {
            bootstrap_admin_username: Some("admin".to_string()),
            bootstrap_admin_password: None,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("BOOTSTRAP_ADMIN"));
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }
}
