use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bitacora_auth::store::MemoryPrincipalStore;
use bitacora_auth::{AppState, Config, build_router, utils};

/// How long in-flight requests get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    // Logging comes up before config so configuration failures are visible
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        "Starting Bitácora Auth Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Bring the service up and block until shutdown; failures map to exit codes.
async fn run() -> Result<(), exitcode::ExitCode> {
    let config = Config::from_env().map_err(|e| {
        error!("Cannot load configuration: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        token_ttl_secs = config.token_ttl_secs,
        guest_lifetime_hours = config.guest_lifetime_hours,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryPrincipalStore::new());
    let state = AppState::new(store, config.clone());

    // Seed the bootstrap admin before accepting traffic, so the very first
    // request can already log in
    state.seed_bootstrap_admin().await.map_err(|e| {
        error!("Failed to seed bootstrap admin: {e}");
        exitcode::UNAVAILABLE
    })?;

    let app = build_router(state.clone());

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Cannot parse listen address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Cannot bind {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Listening on http://{addr}");
    info!("Routes:");
    info!("  GET  /health             - Health check");
    info!("  GET  /ready              - Readiness check");
    info!("  POST /api/auth/login     - Exchange credentials for a token");
    info!("  GET  /api/auth/me        - Current principal");
    info!("  POST /api/auth/password  - Change own password");
    info!("  POST /api/auth/guests    - Create a guest account (admin)");

    // One token fans the shutdown signal out to the server and the
    // background tasks
    let shutdown_token = CancellationToken::new();
    tokio::spawn(utils::shutdown_signal(shutdown_token.clone()));

    let graceful = shutdown_token.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await });

    // Bound the drain: connections still open past the grace period are
    // abandoned rather than holding the process hostage
    tokio::select! {
        result = server => {
            result.map_err(|e| {
                error!("Server task failed: {e}");
                exitcode::SOFTWARE
            })?;
        }
        () = async {
            shutdown_token.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Grace period elapsed with connections still open, exiting"
            );
        }
    }

    info!("HTTP server stopped, draining background tasks");
    state.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}
