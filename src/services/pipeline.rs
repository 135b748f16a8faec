//! The per-job generation sequence run by queue workers.
//!
//! Each step's failure is terminal for the job: the record is marked `failed`
//! with the reason and nothing is retried. Once the result is recorded the job is
//! `completed`; charging the user happens afterwards and a charge failure is
//! logged without touching the completed record.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::{ledger_queries, queries, template_queries};
use crate::error::AppError;
use crate::models::generation::GenerationStatus;
use crate::models::job::Job;
use crate::services::provider::ImageProvider;

/// Progress milestone once a worker has picked the job up.
pub const PROGRESS_STARTED: i64 = 10;
/// Progress milestone once the template is resolved and generation begins.
pub const PROGRESS_GENERATING: i64 = 50;

/// What happened to a job after the pipeline ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        image_url: String,
        /// Whether the debit and ledger entry were recorded.
        charged: bool,
    },
    Failed {
        reason: String,
    },
}

/// Explicit handles the pipeline needs: the database (records, catalog, balances,
/// ledger) and the image provider.
#[derive(Clone)]
pub struct GenerationPipeline {
    db: SqlitePool,
    provider: Arc<dyn ImageProvider>,
    generation_timeout: Duration,
}

impl GenerationPipeline {
    pub fn new(db: SqlitePool, provider: Arc<dyn ImageProvider>, generation_timeout: Duration) -> Self {
        Self {
            db,
            provider,
            generation_timeout,
        }
    }

    pub async fn run(&self, job: &Job, worker_id: usize) -> JobOutcome {
        let start = Instant::now();
        let outcome = self.execute(job, worker_id).await;

        metrics::histogram!("generation_pipeline_seconds").record(start.elapsed().as_secs_f64());
        match &outcome {
            JobOutcome::Completed { .. } => {
                metrics::counter!("generation_jobs_completed_total").increment(1);
            }
            JobOutcome::Failed { .. } => {
                metrics::counter!("generation_jobs_failed_total").increment(1);
            }
        }
        outcome
    }

    async fn execute(&self, job: &Job, worker_id: usize) -> JobOutcome {
        let job_id = job.job_id.as_str();

        if let Err(e) = queries::update_status(
            &self.db,
            job_id,
            GenerationStatus::Processing,
            PROGRESS_STARTED,
        )
        .await
        {
            tracing::error!(worker_id, job_id, error = %e, "Failed to mark job processing");
            return self.fail(job, worker_id, AppError::Storage(e)).await;
        }

        let template = match template_queries::get_template(&self.db, job.template_id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                return self
                    .fail(job, worker_id, AppError::TemplateNotFound(job.template_id))
                    .await
            }
            Err(e) => return self.fail(job, worker_id, AppError::Storage(e)).await,
        };

        if let Err(e) = queries::update_status(
            &self.db,
            job_id,
            GenerationStatus::Processing,
            PROGRESS_GENERATING,
        )
        .await
        {
            tracing::warn!(worker_id, job_id, error = %e, "Failed to update job progress");
        }

        tracing::debug!(worker_id, job_id, provider = self.provider.name(), "Calling image provider");
        let generated = tokio::time::timeout(
            self.generation_timeout,
            self.provider.generate(job.template_id, &job.image_data),
        )
        .await;

        let urls = match generated {
            Ok(Ok(urls)) => urls,
            Ok(Err(e)) => {
                return self
                    .fail(job, worker_id, AppError::GenerationFailed(e.to_string()))
                    .await
            }
            Err(_) => {
                let msg = format!("timed out after {:?}", self.generation_timeout);
                return self.fail(job, worker_id, AppError::GenerationFailed(msg)).await;
            }
        };

        let Some(image_url) = urls.into_iter().next() else {
            return self.fail(job, worker_id, AppError::NoImagesProduced).await;
        };

        if let Err(e) = queries::update_with_result(
            &self.db,
            job_id,
            GenerationStatus::Completed,
            &image_url,
            Utc::now(),
        )
        .await
        {
            tracing::error!(worker_id, job_id, error = %e, "Failed to record job result");
            return self.fail(job, worker_id, AppError::Storage(e)).await;
        }

        // The record already reads `completed`; a charge failure leaves it that way.
        let charged = match ledger_queries::charge_generation(&self.db, job.user_id, &template).await {
            Ok(transaction_id) => {
                tracing::info!(
                    worker_id,
                    job_id,
                    user_id = job.user_id,
                    credits = template.credit_cost,
                    transaction_id,
                    "Charged user for generation"
                );
                true
            }
            Err(e) => {
                metrics::counter!("generation_settlement_failures_total").increment(1);
                tracing::error!(
                    worker_id,
                    job_id,
                    user_id = job.user_id,
                    credits = template.credit_cost,
                    error = %e,
                    "Failed to charge user for completed generation"
                );
                false
            }
        };

        tracing::info!(worker_id, job_id, image_url = %image_url, "Job completed");
        JobOutcome::Completed { image_url, charged }
    }

    /// Mark a job that will never run as failed.
    pub async fn abandon(&self, job: &Job, reason: &str) {
        if let Err(e) = queries::update_with_error(&self.db, &job.job_id, reason, Utc::now()).await {
            tracing::error!(job_id = %job.job_id, error = %e, "Failed to record abandoned job");
        }
    }

    async fn fail(&self, job: &Job, worker_id: usize, error: AppError) -> JobOutcome {
        let reason = error.to_string();
        tracing::warn!(worker_id, job_id = %job.job_id, reason = %reason, "Job failed");

        if let Err(e) = queries::update_with_error(&self.db, &job.job_id, &reason, Utc::now()).await {
            tracing::error!(worker_id, job_id = %job.job_id, error = %e, "Failed to record job failure");
        }
        JobOutcome::Failed { reason }
    }
}
