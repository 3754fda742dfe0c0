use crate::error::AppError;
use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Start the HTTP server with graceful shutdown.
///
/// Peer addresses are exposed to handlers through `ConnectInfo<SocketAddr>`.
/// Cancelling `shutdown_token` (or SIGINT/SIGTERM) stops accepting connections
/// and lets in-flight ingestions finish.
pub async fn serve(
    app: Router,
    http_port: u16,
    shutdown_token: CancellationToken,
) -> Result<(), AppError> {
    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Bind {
            address: bind_addr.clone(),
            source: e,
        })?;
    info!("Server listening on {}", listener.local_addr()?);
    info!("  - GET  /              (online probe)");
    info!("  - GET  /v1/health     (health check)");
    info!("  - POST /log           (raw log lines, bearer token with 'log' permission)");

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_token.cancelled_owned())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
