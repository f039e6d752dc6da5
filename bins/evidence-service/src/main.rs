//! Evidence storage service daemon.

use evidence_service::api::routes::create_router;
use evidence_service::config::Config;
use evidence_service::db;
use evidence_service::state::AppState;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "evidence_service=info,info".to_string()),
        )
        .init();

    info!("Starting evidence service...");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        anyhow::anyhow!(e)
    })?;
    let addr = config.bind_addr();

    // Connect to the catalog and run migrations
    let pool = db::create_pool(&config.database_url).await?;

    // Build shared state (connects the object-store backend)
    let state = AppState::from_config(config, pool).await?;
    if state.replica.is_some() {
        info!("Secondary replica enabled");
    } else {
        info!("Secondary replica disabled");
    }

    let app = create_router(state);

    info!("Evidence API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Evidence service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
