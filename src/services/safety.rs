use async_trait::async_trait;

/// Screens uploaded images before any credits are spent on them.
#[async_trait]
pub trait ContentSafetyChecker: Send + Sync {
    /// `Ok(false)` means the image was inspected and rejected.
    async fn validate(&self, image: &[u8]) -> Result<bool, SafetyError>;
}

/// Accepts every image.
#[derive(Debug, Default)]
pub struct MockContentSafety;

#[async_trait]
impl ContentSafetyChecker for MockContentSafety {
    async fn validate(&self, _image: &[u8]) -> Result<bool, SafetyError> {
        Ok(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("Content safety service unavailable: {0}")]
    Unavailable(String),
}
