//! OS signal handling.
//!
//! # Responsibilities
//! - Translate SIGINT/SIGTERM into graceful shutdown
//! - Merge OS signals with the programmatic shutdown channel

use tokio::sync::broadcast;

/// Resolve when shutdown is requested, via OS signal or the broadcast
/// channel.
pub async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.recv() => {}
    }

    tracing::info!("Shutdown signal received");
}
