//! # Bitácora Auth Service
//!
//! Authentication and request authorization for the Bitácora SOC logbook.
//! Clients log in with a username and password, receive a signed bearer
//! token, and present it on every subsequent request; middleware gates each
//! route group by role, times out guest accounts, and throttles abusive
//! sources before a handler ever runs.
//!
//! A request travels the stack in this order:
//!
//! ```text
//! correlation id → trace span → origin guard → CORS → general limiter
//!   → panic recovery → (login limiter | auth gate → role gate) → handler
//! ```
//!
//! Tokens are verified statelessly with a bounded clock-skew allowance, so
//! any replica can authenticate a request without shared session storage.
//! The principal store is a trait; the bundled implementation keeps accounts
//! in memory behind a `tokio::sync::RwLock`.
//!
//! ## Bootstrapping
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bitacora_auth::store::MemoryPrincipalStore;
//! use bitacora_auth::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(Arc::new(MemoryPrincipalStore::new()), config);
//!     state.seed_bootstrap_admin().await?;
//!
//!     let app = build_router(state);
//!     // hand `app` to axum::serve with a bound TcpListener
//!     Ok(())
//! }
//! ```
//!
//! ## Hardening
//!
//! Point the signing secret at something real before exposing the service:
//! ```bash
//! TOKEN_SECRET=$(openssl rand -hex 32) cargo run
//! ```
//!
//! Production mode requires an explicit origin allow-list:
//! ```bash
//! APP_ENV=production CORS_ALLOWED_ORIGINS=https://soc.example.com cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;
pub mod state;
pub mod store;
pub mod token;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use token::TokenCodec;
