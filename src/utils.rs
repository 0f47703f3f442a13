use std::time::Duration;

use axum_server::Handle;
use tokio::signal;
use tracing::{error, warn};

/// In-flight requests get this long to finish after a shutdown signal.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Wait for Ctrl+C or SIGTERM, then start a graceful shutdown of `handle`.
///
/// A signal handler that cannot be installed is logged and ignored; the
/// other signal still works.
pub async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}
