use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use portrait_gen_backend::{
    app_state::AppState,
    config::AppConfig,
    db,
    routes,
    services::{provider, safety::MockContentSafety},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing generation backend");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    tracing::info!(database_url = %config.database_url, "Opening SQLite database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let image_provider = provider::build_provider(&config).expect("Failed to build image provider");
    tracing::info!(provider = image_provider.name(), "Image provider selected");

    let shutdown = CancellationToken::new();
    let (state, workers) = AppState::build(
        &config,
        db_pool,
        image_provider,
        Arc::new(MockContentSafety),
        &shutdown,
    );

    let app = routes::router(state, config.max_upload_bytes).merge(
        Router::new()
            .route("/metrics", get(routes::metrics::prometheus_metrics))
            .with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .expect("Server error");

    match workers.shutdown(config.shutdown_timeout()).await {
        Ok(report) => tracing::info!(
            undelivered = report.undelivered,
            processed = report.processed,
            "Shutdown complete"
        ),
        Err(e) => tracing::error!(error = %e, "Shutdown incomplete"),
    }
}
