//! Entry points handlers use to start and observe generations.
//!
//! Two paths exist and validate differently:
//! - asynchronous (`submit_job`): record + enqueue, answered with a job id; the
//!   worker pipeline does no content-safety or balance check.
//! - synchronous (`generate_sync`): image validation, content safety, balance
//!   check, generation and charge all inline, answered with the images.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{ledger_queries, queries, template_queries};
use crate::error::{AppError, Result};
use crate::models::generation::{
    Generation, GenerationResultView, GenerationStatus, GenerationStatusView,
    SyncGenerationResult,
};
use crate::models::job::Job;
use crate::models::template::Template;
use crate::services::provider::ImageProvider;
use crate::services::queue::JobQueue;
use crate::services::safety::ContentSafetyChecker;

/// Reject empty uploads and bytes that are not a recognisable image.
pub fn validate_image(image: &[u8]) -> Result<()> {
    if image.is_empty() {
        return Err(AppError::Validation("image data is required".to_string()));
    }
    image::guess_format(image)
        .map_err(|_| AppError::Validation("unsupported image format".to_string()))?;
    Ok(())
}

pub struct GenerationService {
    db: SqlitePool,
    queue: Arc<JobQueue>,
    provider: Arc<dyn ImageProvider>,
    safety: Arc<dyn ContentSafetyChecker>,
    generation_timeout: Duration,
}

impl GenerationService {
    pub fn new(
        db: SqlitePool,
        queue: Arc<JobQueue>,
        provider: Arc<dyn ImageProvider>,
        safety: Arc<dyn ContentSafetyChecker>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            db,
            queue,
            provider,
            safety,
            generation_timeout,
        }
    }

    /// Create a `pending` record and enqueue its job.
    ///
    /// When the queue refuses the job the record is marked failed with the
    /// reason and the error is returned; no job id is handed out.
    pub async fn submit_job(&self, user_id: i64, template_id: i64, image: Vec<u8>) -> Result<String> {
        let job = Job::new(user_id, template_id, image);
        queries::create_generation(&self.db, &job.job_id, user_id, template_id).await?;

        let job_id = job.job_id.clone();
        match self.queue.submit(job) {
            Ok(id) => {
                metrics::counter!("generation_jobs_submitted_total").increment(1);
                tracing::info!(job_id = %id, user_id, template_id, "Generation job submitted");
                Ok(id)
            }
            Err(e) => {
                let err = AppError::from(e);
                metrics::counter!("generation_jobs_rejected_total").increment(1);
                tracing::warn!(job_id = %job_id, user_id, error = %err, "Generation job rejected");

                if let Err(db_err) =
                    queries::update_with_error(&self.db, &job_id, &err.to_string(), Utc::now()).await
                {
                    tracing::error!(job_id = %job_id, error = %db_err, "Failed to mark rejected job");
                }
                Err(err)
            }
        }
    }

    pub async fn get_generation(&self, job_id: &str) -> Result<Generation> {
        queries::get_generation(&self.db, job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))
    }

    pub async fn get_status(&self, job_id: &str) -> Result<GenerationStatusView> {
        let generation = self.get_generation(job_id).await?;
        Ok(GenerationStatusView::from(&generation))
    }

    pub async fn get_result(&self, job_id: &str) -> Result<GenerationResultView> {
        let generation = self.get_generation(job_id).await?;
        GenerationResultView::try_from(generation)
    }

    /// Validate, check safety and balance, generate and charge, all inline.
    pub async fn generate_sync(
        &self,
        user_id: i64,
        template_id: i64,
        image: &[u8],
    ) -> Result<SyncGenerationResult> {
        validate_image(image)?;

        match self.safety.validate(image).await {
            Ok(true) => {}
            Ok(false) => return Err(AppError::Safety("image content is not safe".to_string())),
            Err(e) => return Err(AppError::Safety(e.to_string())),
        }

        let user = ledger_queries::get_user(&self.db, user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;
        let template = self.template(template_id).await?;

        // Read without a lock: a worker may debit this user concurrently.
        if user.credits < template.credit_cost {
            return Err(AppError::InsufficientCredits {
                required: template.credit_cost,
                available: user.credits,
            });
        }

        let images = match tokio::time::timeout(
            self.generation_timeout,
            self.provider.generate(template_id, image),
        )
        .await
        {
            Ok(Ok(images)) => images,
            Ok(Err(e)) => return Err(AppError::GenerationFailed(e.to_string())),
            Err(_) => {
                return Err(AppError::GenerationFailed(format!(
                    "timed out after {:?}",
                    self.generation_timeout
                )))
            }
        };
        if images.is_empty() {
            return Err(AppError::NoImagesProduced);
        }

        ledger_queries::charge_generation(&self.db, user_id, &template).await?;
        tracing::info!(
            user_id,
            template_id,
            credits = template.credit_cost,
            images = images.len(),
            "Synchronous generation completed"
        );

        Ok(SyncGenerationResult {
            images,
            credits_used: template.credit_cost,
        })
    }

    pub async fn history(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Generation>> {
        Ok(queries::list_by_user(&self.db, user_id, limit, offset).await?)
    }

    pub async fn templates(&self) -> Result<Vec<Template>> {
        Ok(template_queries::list_active_templates(&self.db).await?)
    }

    pub async fn template(&self, template_id: i64) -> Result<Template> {
        template_queries::get_template(&self.db, template_id)
            .await?
            .ok_or(AppError::TemplateNotFound(template_id))
    }
}

impl TryFrom<Generation> for GenerationResultView {
    type Error = AppError;

    fn try_from(generation: Generation) -> Result<Self> {
        match (generation.status, generation.image_url) {
            (GenerationStatus::Completed, Some(image_url)) => Ok(GenerationResultView {
                job_id: generation.job_id,
                image_url,
                status: GenerationStatus::Completed,
            }),
            (status, _) => Err(AppError::NotCompleted {
                job_id: generation.job_id,
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_validate_image() {
        assert!(validate_image(PNG_HEADER).is_ok());
        assert!(matches!(validate_image(b""), Err(AppError::Validation(_))));
        assert!(matches!(
            validate_image(b"definitely not an image"),
            Err(AppError::Validation(_))
        ));
    }
}
