use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle state of a generation record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Durable record of one generation request. Single source of truth for job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: i64,
    pub job_id: String,
    pub user_id: i64,
    pub template_id: i64,
    pub status: GenerationStatus,
    pub progress: i64,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields of a generation submission (multipart form).
#[derive(Debug, Validate)]
pub struct GenerateRequest {
    #[garde(range(min = 1))]
    pub template_id: i64,

    #[garde(length(min = 1))]
    pub image: Vec<u8>,
}

/// Pagination for the history listing.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    #[garde(range(min = 1, max = 100))]
    pub limit: i64,

    #[serde(default)]
    #[garde(range(min = 0))]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Response after queueing a generation job.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: GenerationStatus,
    pub message: String,
}

/// Public view of a job's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationStatusView {
    pub job_id: String,
    pub status: GenerationStatus,
    pub progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Generation> for GenerationStatusView {
    fn from(g: &Generation) -> Self {
        Self {
            job_id: g.job_id.clone(),
            status: g.status,
            progress: g.progress,
            image_url: g.image_url.clone(),
            error: g.error.clone(),
        }
    }
}

/// Final output of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResultView {
    pub job_id: String,
    pub image_url: String,
    pub status: GenerationStatus,
}

/// Inline result of the synchronous generation path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncGenerationResult {
    pub images: Vec<String>,
    pub credits_used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert_eq!(GenerationStatus::from_str(status.as_ref()).unwrap(), status);
        }
        assert_eq!(GenerationStatus::Processing.to_string(), "processing");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_generate_request_rejects_empty_image() {
        let req = GenerateRequest {
            template_id: 1,
            image: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_generate_request_rejects_bad_template_id() {
        let req = GenerateRequest {
            template_id: 0,
            image: vec![1, 2, 3],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_history_query_defaults() {
        let q: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 20);
        assert_eq!(q.offset, 0);
        assert!(q.validate().is_ok());
    }
}
