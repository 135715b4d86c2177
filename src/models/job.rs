use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a restoration job.
///
/// `Completed` and `Failed` are terminal: once a row leaves `Processing`
/// it is never updated again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// A photo restoration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorationJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub replicate_job_id: String,
    pub original_filename: String,
    pub original_image_url: String,
    pub restored_image_url: Option<String>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub credits_used: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
