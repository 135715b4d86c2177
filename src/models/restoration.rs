use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{JobStatus, RestorationJob};

/// Request to submit an uploaded photo for restoration.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RestoreRequest {
    #[serde(rename = "imageUrl")]
    #[garde(length(min = 1, max = 2048))]
    pub image_url: Option<String>,

    #[garde(length(min = 1, max = 255))]
    pub original_filename: Option<String>,

    #[serde(rename = "testMode", default)]
    #[garde(skip)]
    pub test_mode: bool,
}

/// Response after submitting a photo for restoration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub prediction_id: String,
    pub status: String,
    pub test_mode: bool,
}

/// Response for querying restoration job status.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub prediction_id: String,
    pub status: JobStatus,
    pub original_filename: String,
    pub original_image_url: String,
    pub restored_image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<RestorationJob> for JobStatusResponse {
    fn from(job: RestorationJob) -> Self {
        Self {
            prediction_id: job.replicate_job_id,
            status: job.status,
            original_filename: job.original_filename,
            original_image_url: job.original_image_url,
            restored_image_url: job.restored_image_url,
            error: job.error,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Response after reporting a client-side failure or timeout.
#[derive(Debug, Serialize, Deserialize)]
pub struct FailResponse {
    pub success: bool,
    /// Whether this report actually transitioned the job and refunded the
    /// credit, or arrived after another actor already settled it.
    pub refunded: bool,
}

/// Current credit balance for the authenticated user.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditsResponse {
    pub credits: i32,
}

/// Completion callback delivered by Replicate.
///
/// `output` is either a single URL string or an array of URLs depending on
/// the model, so it is kept as raw JSON until extraction.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub id: Option<String>,
    pub status: Option<String>,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl WebhookPayload {
    /// Extract the restored image URL: a plain string, or the first element
    /// of an array of strings.
    pub fn restored_image_url(&self) -> Option<String> {
        match &self.output {
            Some(serde_json::Value::String(url)) => Some(url.clone()),
            Some(serde_json::Value::Array(items)) => items
                .first()
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(output: serde_json::Value) -> WebhookPayload {
        WebhookPayload {
            id: Some("pred-1".to_string()),
            status: Some("succeeded".to_string()),
            output: Some(output),
            error: None,
        }
    }

    #[test]
    fn test_output_as_string() {
        let p = payload(json!("https://x/y.jpg"));
        assert_eq!(p.restored_image_url().as_deref(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_output_as_array_takes_first() {
        let p = payload(json!(["https://x/y.jpg", "https://x/z.jpg"]));
        assert_eq!(p.restored_image_url().as_deref(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_empty_array_yields_none() {
        let p = payload(json!([]));
        assert_eq!(p.restored_image_url(), None);
    }

    #[test]
    fn test_missing_output_yields_none() {
        let p = WebhookPayload {
            id: Some("pred-1".to_string()),
            status: Some("succeeded".to_string()),
            output: None,
            error: None,
        };
        assert_eq!(p.restored_image_url(), None);
    }

    #[test]
    fn test_request_field_names() {
        let req: RestoreRequest = serde_json::from_value(json!({
            "imageUrl": "https://cdn.example.com/restorations/a.jpg",
            "original_filename": "a.jpg",
            "testMode": true
        }))
        .unwrap();
        assert!(req.test_mode);
        assert_eq!(
            req.image_url.as_deref(),
            Some("https://cdn.example.com/restorations/a.jpg")
        );
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_image_url_rejected() {
        let req: RestoreRequest = serde_json::from_value(json!({
            "imageUrl": ""
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_missing_fields_still_deserialize() {
        let req: RestoreRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.image_url, None);
        assert!(!req.test_mode);
    }
}
