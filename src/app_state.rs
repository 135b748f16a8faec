use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::routes::auth::TokenVerifier;
use crate::services::{
    account::AccountService,
    generation::GenerationService,
    pipeline::GenerationPipeline,
    provider::ImageProvider,
    queue::JobQueue,
    safety::ContentSafetyChecker,
    worker::WorkerPool,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub queue: Arc<JobQueue>,
    pub generations: Arc<GenerationService>,
    pub accounts: Arc<AccountService>,
    pub auth: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the queue, its workers and the handler-facing services.
    ///
    /// The returned pool owns the workers; cancelling `shutdown` stops them too.
    pub fn build(
        config: &AppConfig,
        db: SqlitePool,
        provider: Arc<dyn ImageProvider>,
        safety: Arc<dyn ContentSafetyChecker>,
        shutdown: &CancellationToken,
    ) -> (Self, WorkerPool) {
        let queue = Arc::new(JobQueue::new(config.queue_capacity));

        let pipeline = GenerationPipeline::new(
            db.clone(),
            provider.clone(),
            config.generation_timeout(),
        );
        let workers = WorkerPool::start(queue.clone(), pipeline, config.worker_count, shutdown);

        let generations = GenerationService::new(
            db.clone(),
            queue.clone(),
            provider,
            safety,
            config.generation_timeout(),
        );

        let accounts = AccountService::new(db.clone());

        let state = Self {
            db,
            queue,
            generations: Arc::new(generations),
            accounts: Arc::new(accounts),
            auth: Arc::new(TokenVerifier::new(&config.jwt_secret)),
        };
        (state, workers)
    }
}
