use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod account;
pub mod auth;
pub mod generation;
pub mod health;
pub mod metrics;

/// API routes with their middleware stack. `/metrics` is mounted separately.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/templates", get(generation::list_templates))
        .route("/api/v1/templates/{id}", get(generation::get_template))
        .route("/api/v1/me", get(account::get_profile))
        .route("/api/v1/me/transactions", get(account::list_transactions))
        .route(
            "/api/v1/generations",
            post(generation::submit_generation).get(generation::list_generations),
        )
        .route("/api/v1/generations/sync", post(generation::generate_sync))
        .route(
            "/api/v1/generations/{job_id}",
            get(generation::get_generation_status),
        )
        .route(
            "/api/v1/generations/{job_id}/result",
            get(generation::get_generation_result),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
