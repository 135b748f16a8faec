//! Test helper utilities shared by the integration suites
#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use portrait_gen_backend::app_state::AppState;
use portrait_gen_backend::config::AppConfig;
use portrait_gen_backend::db::{self, ledger_queries, template_queries};
use portrait_gen_backend::routes;
use portrait_gen_backend::models::generation::GenerationStatusView;
use portrait_gen_backend::models::template::Template;
use portrait_gen_backend::models::user::User;
use portrait_gen_backend::routes::auth::Claims;
use portrait_gen_backend::services::{
    generation::GenerationService,
    pipeline::GenerationPipeline,
    provider::{ImageProvider, ProviderError},
    queue::JobQueue,
    safety::{ContentSafetyChecker, MockContentSafety, SafetyError},
    worker::{WorkerPool, WorkerState},
};

use crate::fixtures::{TemplateFixture, TEST_SECRET};

pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Fresh in-memory database with migrations applied.
pub async fn setup_db() -> SqlitePool {
    let pool = db::init_memory_pool()
        .await
        .expect("Failed to open in-memory database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub async fn seed_user(pool: &SqlitePool, credits: i64) -> User {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    ledger_queries::create_user(pool, &format!("openid-{n}"), &format!("user {n}"), credits)
        .await
        .expect("Failed to create user")
}

pub async fn seed_template(pool: &SqlitePool, fixture: TemplateFixture) -> Template {
    template_queries::insert_template(pool, fixture.name, "test template", "", fixture.credit_cost)
        .await
        .expect("Failed to create template")
}

pub async fn balance(pool: &SqlitePool, user_id: i64) -> i64 {
    ledger_queries::get_user(pool, user_id)
        .await
        .expect("Failed to load user")
        .expect("User not found")
        .credits
}

/// Returns the configured URLs and counts calls per payload.
pub struct RecordingProvider {
    urls: Vec<String>,
    calls: Mutex<HashMap<Vec<u8>, usize>>,
}

impl RecordingProvider {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_per_payload(&self) -> HashMap<Vec<u8>, usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, _template_id: i64, image: &[u8]) -> Result<Vec<String>, ProviderError> {
        *self.calls.lock().unwrap().entry(image.to_vec()).or_insert(0) += 1;
        tokio::task::yield_now().await;
        Ok(self.urls.clone())
    }
}

/// Always errors.
pub struct FailingProvider;

#[async_trait]
impl ImageProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _template_id: i64, _image: &[u8]) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Rejected("model backend exploded".to_string()))
    }
}

/// Blocks every call until released, announcing each entry.
pub struct GatedProvider {
    pub entered: Notify,
    release: Semaphore,
}

impl GatedProvider {
    pub fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    pub fn release_all(&self) {
        self.release.add_permits(1_000);
    }
}

#[async_trait]
impl ImageProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _template_id: i64, _image: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.entered.notify_one();
        let _permit = self
            .release
            .acquire()
            .await
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;
        Ok(vec!["https://example.com/gated.png".to_string()])
    }
}

/// Rejects every image.
pub struct RejectingSafety;

#[async_trait]
impl ContentSafetyChecker for RejectingSafety {
    async fn validate(&self, _image: &[u8]) -> Result<bool, SafetyError> {
        Ok(false)
    }
}

/// Checker whose backend is down.
pub struct UnavailableSafety;

#[async_trait]
impl ContentSafetyChecker for UnavailableSafety {
    async fn validate(&self, _image: &[u8]) -> Result<bool, SafetyError> {
        Err(SafetyError::Unavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Queue, service and (optionally) running workers over one database.
pub struct Harness {
    pub db: SqlitePool,
    pub queue: Arc<JobQueue>,
    pub service: GenerationService,
    pub workers: Option<WorkerPool>,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub async fn new(provider: Arc<dyn ImageProvider>, capacity: usize, worker_count: usize) -> Self {
        Self::with_safety(provider, Arc::new(MockContentSafety), capacity, worker_count).await
    }

    pub async fn with_safety(
        provider: Arc<dyn ImageProvider>,
        safety: Arc<dyn ContentSafetyChecker>,
        capacity: usize,
        worker_count: usize,
    ) -> Self {
        let db = setup_db().await;
        let queue = Arc::new(JobQueue::new(capacity));
        let shutdown = CancellationToken::new();

        let workers = (worker_count > 0).then(|| {
            let pipeline = GenerationPipeline::new(db.clone(), provider.clone(), GENERATION_TIMEOUT);
            WorkerPool::start(queue.clone(), pipeline, worker_count, &shutdown)
        });

        let service = GenerationService::new(
            db.clone(),
            queue.clone(),
            provider,
            safety,
            GENERATION_TIMEOUT,
        );

        Self {
            db,
            queue,
            service,
            workers,
            shutdown,
        }
    }

    pub fn workers(&self) -> &WorkerPool {
        self.workers.as_ref().expect("harness started without workers")
    }
}

/// Poll until the job reaches `completed` or `failed`.
pub async fn wait_for_terminal(service: &GenerationService, job_id: &str) -> GenerationStatusView {
    for _ in 0..500 {
        let status = service.get_status(job_id).await.expect("status lookup failed");
        if status.status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

/// Poll until every worker reports `state`.
pub async fn wait_for_worker_states(workers: &WorkerPool, state: WorkerState) {
    for _ in 0..500 {
        if workers.states().iter().all(|s| *s == state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("workers never reached {state:?}: {:?}", workers.states());
}

/// Bearer token for `user_id`, signed with the test secret.
pub fn bearer(user_id: i64) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    let token = encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp,
        },
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    format!("Bearer {token}")
}

/// API server on an ephemeral port, backed by its own in-memory database.
pub struct TestServer {
    pub base_url: String,
    pub db: SqlitePool,
    pub client: reqwest::Client,
    pub workers: WorkerPool,
}

pub async fn spawn_server(provider: Arc<dyn ImageProvider>) -> TestServer {
    let config = AppConfig::with_secret(TEST_SECRET);
    let db = setup_db().await;
    let (state, workers) = AppState::build(
        &config,
        db.clone(),
        provider,
        Arc::new(MockContentSafety),
        &CancellationToken::new(),
    );
    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        db,
        client: reqwest::Client::new(),
        workers,
    }
}

/// Multipart body for the generation endpoints.
pub fn generation_form(template_id: i64, image: &[u8]) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(image.to_vec())
        .file_name("portrait.png")
        .mime_str("image/png")
        .expect("valid mime type");
    reqwest::multipart::Form::new()
        .text("template_id", template_id.to_string())
        .part("image", part)
}
