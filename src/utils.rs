use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then trip `cancel`.
///
/// The token fans the signal out to the HTTP server's graceful-shutdown
/// future and to the limiter sweep tasks at the same time.
///
/// # Panics
///
/// Panics when a signal handler cannot be registered; a process that
/// cannot observe shutdown signals must not serve traffic.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot register the Ctrl+C handler: {e}");
            panic!("signal handler registration failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Cannot register the SIGTERM handler: {e}");
                panic!("signal handler registration failed");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => warn!("Ctrl+C received, shutting down"),
        _ = terminate => warn!("SIGTERM received, shutting down"),
    }

    cancel.cancel();
}
