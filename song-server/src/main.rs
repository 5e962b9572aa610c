use anyhow::Context;
use core_runtime::config::AppConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use song_server::{app, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_logging(LoggingConfig::for_environment(config.env))
        .context("failed to initialize logging")?;
    info!(env = ?config.env, "Starting song library");

    let core = core_service::bootstrap(&config)
        .await
        .context("failed to initialize core")?;

    let state = AppState::new(
        core.service.clone(),
        core.pool().clone(),
        config.http.request_timeout(),
    );

    let listener = tokio::net::TcpListener::bind(&config.http.address)
        .await
        .with_context(|| format!("failed to bind {}", config.http.address))?;
    info!(address = %config.http.address, "HTTP server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    core.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
