use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString};

/// Which image generation backend to wire in at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Mock,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Maximum number of buffered jobs before submissions are rejected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of concurrent generation workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Upper bound on a single provider call
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// "mock" or "http"
    #[serde(default = "default_image_provider")]
    pub image_provider: String,

    /// Base URL of the HTTP image provider. Required when `image_provider` is "http".
    pub image_provider_url: Option<String>,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://generations.db".to_string()
}

fn default_queue_capacity() -> usize {
    100
}

fn default_worker_count() -> usize {
    2
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_image_provider() -> String {
    "mock".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Unknown image provider '{0}' (expected 'mock' or 'http')")]
    UnknownProvider(String),

    #[error("IMAGE_PROVIDER_URL is required when IMAGE_PROVIDER=http")]
    MissingProviderUrl,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Failed to build image provider: {0}")]
    Provider(String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults suitable for tests and local runs.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            jwt_secret: jwt_secret.into(),
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            image_provider: default_image_provider(),
            image_provider_url: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("QUEUE_CAPACITY"));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Zero("WORKER_COUNT"));
        }
        if self.provider_kind()? == ProviderKind::Http && self.image_provider_url.is_none() {
            return Err(ConfigError::MissingProviderUrl);
        }
        Ok(())
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        ProviderKind::from_str(&self.image_provider)
            .map_err(|_| ConfigError::UnknownProvider(self.image_provider.clone()))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
