//! Shared state handed to every handler, plus its background task lifecycle.
//!
//! [`AppState`] is cloned per request, and cloning is cheap: the config,
//! token codec, password hasher, and limiters sit behind `Arc`, and the
//! principal store is a shared trait object. Mutability lives inside the
//! store and the limiter buckets, behind tokio locks.
//!
//! The state also owns the limiter sweep tasks. They are spawned through a
//! `tokio_util::task::TaskTracker` and watch a `CancellationToken`, so
//! `shutdown()` can stop and join them before the process exits.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::rate_limit::{
    FixedWindowLimiter, LOGIN_RATE_LIMIT_MAX, LOGIN_RATE_LIMIT_WINDOW,
};
use crate::models::{Principal, Role};
use crate::password::PasswordHasher;
use crate::store::{SharedPrincipalStore, StoreError};
use crate::token::TokenCodec;
use crate::validation::{validate_password, validate_username};

/// Everything a handler needs, behind cheap clones.
///
/// Construction spawns the limiter sweep tasks, so whoever creates the
/// state must call `shutdown()` once serving stops:
///
/// ```rust,ignore
/// let state = AppState::new(store, config);
/// state.seed_bootstrap_admin().await?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration, immutable after startup
    pub config: Arc<Config>,
    /// Principal lookup and mutation
    pub store: SharedPrincipalStore,
    /// Token signing and verification
    pub codec: Arc<TokenCodec>,
    /// Password hashing and verification
    pub password_hasher: Arc<PasswordHasher>,
    /// Tight limiter scoped to the login route, always enforced
    pub login_limiter: Arc<FixedWindowLimiter>,
    /// Loose limiter over all API traffic; `None` outside production
    pub api_limiter: Option<Arc<FixedWindowLimiter>>,
    /// Process start time, reported by the health endpoint
    pub started_at: Instant,
    /// Joins the sweep tasks on shutdown
    task_tracker: TaskTracker,
    /// Stops the sweep tasks
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build the state from a principal store and configuration.
    ///
    /// Spawns one sweeper per active rate limiter that periodically drops
    /// elapsed windows, so idle client IPs do not accumulate in memory.
    /// The sweepers run until `shutdown()` is called.
    pub fn new(store: SharedPrincipalStore, config: Config) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.token_secret, config.token_ttl_secs));
        let password_hasher = Arc::new(PasswordHasher::new());

        let login_limiter = Arc::new(FixedWindowLimiter::new(
            LOGIN_RATE_LIMIT_MAX,
            LOGIN_RATE_LIMIT_WINDOW,
        ));
        let api_limiter = config.rate_limiting_enabled().then(|| {
            Arc::new(FixedWindowLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            ))
        });

        let state = Self {
            config: Arc::new(config),
            store,
            codec,
            password_hasher,
            login_limiter,
            api_limiter,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_limiter_sweep_task(state.login_limiter.clone(), "login");
        if let Some(api_limiter) = &state.api_limiter {
            state.spawn_limiter_sweep_task(api_limiter.clone(), "api");
        }

        state
    }

    /// Ensure the configured bootstrap admin account exists.
    ///
    /// A no-op when no bootstrap credentials are configured or the username
    /// already exists, so restarting the process never duplicates or resets
    /// the account.
    pub async fn seed_bootstrap_admin(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (
            self.config.bootstrap_admin_username.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            debug!("No bootstrap admin configured, skipping seed");
            return Ok(());
        };

        validate_username(username)?;
        validate_password(password)?;

        if self
            .store
            .find_by_username(username)
            .await
            .map_err(|err| AppError::Unavailable(err.to_string()))?
            .is_some()
        {
            info!(username = %username, "Bootstrap admin already exists, skipping seed");
            return Ok(());
        }

        let password_hash = self
            .password_hasher
            .hash(password)
            .map_err(|err| AppError::Unavailable(err.to_string()))?;

        let admin = Principal::new(username, password_hash, Role::Admin);

        match self.store.insert(admin).await {
            Ok(()) => {
                info!(username = %username, "Bootstrap admin account created");
                Ok(())
            }
            // Lost a race with a concurrent seeder; the account exists
            Err(StoreError::DuplicateUsername) => {
                info!(username = %username, "Bootstrap admin already exists, skipping seed");
                Ok(())
            }
            Err(err) => Err(AppError::Unavailable(err.to_string())),
        }
    }

    /// Spawn a background task that drops elapsed limiter windows.
    ///
    /// Sweeping once per window length keeps stale entries bounded without
    /// contending with the request path. The task stops when the
    /// cancellation token fires and is joined through the tracker.
    fn spawn_limiter_sweep_task(&self, limiter: Arc<FixedWindowLimiter>, scope: &'static str) {
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(limiter.window());
            ticker.tick().await; // the first tick completes immediately

            loop {
                tokio::select! {
                    biased; // prefer cancellation over another sweep

                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let swept = limiter.sweep_expired().await;
                        if swept > 0 {
                            debug!(scope, swept, "Dropped elapsed rate limit windows");
                        }
                    }
                }
            }

            debug!(scope, "Limiter sweep stopped");
        });
    }

    /// Stop the sweep tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Stopping background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("Background tasks stopped");
    }

    /// Seconds since the process started.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
