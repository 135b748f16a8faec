//! Image generation capability and its implementations.

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ConfigError, ProviderKind};

/// Turns a source image and a template into an ordered list of result URLs.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, template_id: i64, image: &[u8]) -> Result<Vec<String>, ProviderError>;
}

/// Returns a fixed set of URLs without looking at the input.
pub struct MockImageProvider {
    urls: Vec<String>,
}

impl MockImageProvider {
    pub fn new() -> Self {
        Self::with_urls(vec![
            "https://example.com/image1.png".to_string(),
            "https://example.com/image2.png".to_string(),
            "https://example.com/image3.png".to_string(),
        ])
    }

    pub fn with_urls(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

impl Default for MockImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, template_id: i64, image: &[u8]) -> Result<Vec<String>, ProviderError> {
        tracing::debug!(template_id, bytes = image.len(), "Mock provider generating");
        Ok(self.urls.clone())
    }
}

/// Remote generation service speaking multipart in, JSON out.
pub struct HttpImageProvider {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl HttpImageProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, template_id: i64, image: &[u8]) -> Result<Vec<String>, ProviderError> {
        let form = multipart::Form::new()
            .text("template_id", template_id.to_string())
            .part(
                "image",
                multipart::Part::bytes(image.to_vec()).file_name("source"),
            );

        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateApiResponse = response.json().await?;
        Ok(parsed.images)
    }
}

/// Build the provider selected by configuration.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn ImageProvider>, ConfigError> {
    match config.provider_kind()? {
        ProviderKind::Mock => Ok(Arc::new(MockImageProvider::new())),
        ProviderKind::Http => {
            let url = config
                .image_provider_url
                .as_deref()
                .ok_or(ConfigError::MissingProviderUrl)?;
            let provider = HttpImageProvider::new(url, config.generation_timeout())
                .map_err(|e| ConfigError::Provider(e.to_string()))?;
            Ok(Arc::new(provider))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Rejected(String),
}
