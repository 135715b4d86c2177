use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::job::JobStatus;
use crate::models::restoration::JobStatusResponse;

/// Maximum accepted upload size.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024; // 10 MB

/// Interval between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shorter interval for test-mode runs to keep feedback loops fast.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling attempt ceiling; exhausting it is treated as a failure.
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// Client-side restoration workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    Upload,
    Ready,
    Loading,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Please upload a valid image file (JPG, PNG, GIF, or WEBP)")]
    UnsupportedImageType,

    #[error("Image size should be less than 10MB")]
    ImageTooLarge,

    #[error("Invalid transition from {0:?}")]
    InvalidTransition(RestoreState),
}

/// Validate image bytes before any network call, returning the content type.
///
/// The format is sniffed from the bytes rather than trusted from the
/// filename.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str, FlowError> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(FlowError::ImageTooLarge);
    }

    let format = image::guess_format(bytes).map_err(|_| FlowError::UnsupportedImageType)?;
    match format {
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Gif => Ok("image/gif"),
        ImageFormat::WebP => Ok("image/webp"),
        _ => Err(FlowError::UnsupportedImageType),
    }
}

/// The restoration workflow state machine:
/// `upload -> ready -> loading -> {complete | error}`, with `error`
/// recoverable back to `upload`.
#[derive(Debug)]
pub struct RestoreFlow {
    state: RestoreState,
    content_type: Option<&'static str>,
    prediction_id: Option<String>,
    restored_image_url: Option<String>,
    last_error: Option<String>,
}

impl Default for RestoreFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreFlow {
    pub fn new() -> Self {
        Self {
            state: RestoreState::Upload,
            content_type: None,
            prediction_id: None,
            restored_image_url: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn prediction_id(&self) -> Option<&str> {
        self.prediction_id.as_deref()
    }

    pub fn restored_image_url(&self) -> Option<&str> {
        self.restored_image_url.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `upload -> ready` once a valid image is selected. Re-selection while
    /// `ready` is allowed.
    pub fn select_image(&mut self, bytes: &[u8]) -> Result<(), FlowError> {
        match self.state {
            RestoreState::Upload | RestoreState::Ready => {}
            other => return Err(FlowError::InvalidTransition(other)),
        }
        self.content_type = Some(validate_image(bytes)?);
        self.state = RestoreState::Ready;
        Ok(())
    }

    /// `ready -> loading`, recording the prediction id returned by the
    /// submission call.
    pub fn submitted(&mut self, prediction_id: &str) -> Result<(), FlowError> {
        if self.state != RestoreState::Ready {
            return Err(FlowError::InvalidTransition(self.state));
        }
        self.prediction_id = Some(prediction_id.to_string());
        self.state = RestoreState::Loading;
        Ok(())
    }

    /// `loading -> complete` once polling observes a completed job with a
    /// restored image.
    pub fn complete(&mut self, restored_image_url: &str) -> Result<(), FlowError> {
        if self.state != RestoreState::Loading {
            return Err(FlowError::InvalidTransition(self.state));
        }
        self.restored_image_url = Some(restored_image_url.to_string());
        self.state = RestoreState::Complete;
        Ok(())
    }

    /// `loading -> error` on observed failure or exhausted poll budget.
    pub fn fail(&mut self, error: &str) -> Result<(), FlowError> {
        if self.state != RestoreState::Loading {
            return Err(FlowError::InvalidTransition(self.state));
        }
        self.last_error = Some(error.to_string());
        self.state = RestoreState::Error;
        Ok(())
    }

    /// `error -> upload` on user retry.
    pub fn retry(&mut self) -> Result<(), FlowError> {
        if self.state != RestoreState::Error {
            return Err(FlowError::InvalidTransition(self.state));
        }
        *self = Self::new();
        Ok(())
    }

    /// Reset from any state.
    pub fn start_over(&mut self) {
        *self = Self::new();
    }

    /// Rebuild the flow from a checkpointed prediction id and the job as
    /// re-fetched at resume time. A job that is already terminal jumps
    /// straight to the corresponding terminal state instead of re-polling.
    pub fn resume(prediction_id: &str, job: &JobStatusResponse) -> Self {
        let mut flow = Self {
            state: RestoreState::Loading,
            content_type: None,
            prediction_id: Some(prediction_id.to_string()),
            restored_image_url: None,
            last_error: None,
        };

        match job.status {
            JobStatus::Completed => match &job.restored_image_url {
                Some(url) => {
                    flow.restored_image_url = Some(url.clone());
                    flow.state = RestoreState::Complete;
                }
                None => {
                    flow.last_error = Some("Restoration produced no image".to_string());
                    flow.state = RestoreState::Error;
                }
            },
            JobStatus::Failed => {
                flow.last_error = Some(
                    job.error
                        .clone()
                        .unwrap_or_else(|| "Restoration failed".to_string()),
                );
                flow.state = RestoreState::Error;
            }
            JobStatus::Processing => {}
        }

        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // Magic bytes are all guess_format needs.
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];
    const GIF_MAGIC: &[u8] = b"GIF89a";
    const BMP_MAGIC: &[u8] = b"BM\x00\x00";

    fn job(status: JobStatus, restored: Option<&str>) -> JobStatusResponse {
        JobStatusResponse {
            prediction_id: "pred-1".to_string(),
            status,
            original_filename: "old.jpg".to_string(),
            original_image_url: "https://cdn.example.com/restorations/old.jpg".to_string(),
            restored_image_url: restored.map(|s| s.to_string()),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut flow = RestoreFlow::new();
        assert_eq!(flow.state(), RestoreState::Upload);

        flow.select_image(PNG_MAGIC).unwrap();
        assert_eq!(flow.state(), RestoreState::Ready);
        assert_eq!(flow.content_type(), Some("image/png"));

        flow.submitted("pred-1").unwrap();
        assert_eq!(flow.state(), RestoreState::Loading);

        flow.complete("https://x/y.jpg").unwrap();
        assert_eq!(flow.state(), RestoreState::Complete);
        assert_eq!(flow.restored_image_url(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_error_is_recoverable() {
        let mut flow = RestoreFlow::new();
        flow.select_image(JPEG_MAGIC).unwrap();
        flow.submitted("pred-1").unwrap();
        flow.fail("Restoration failed").unwrap();
        assert_eq!(flow.state(), RestoreState::Error);
        assert_eq!(flow.last_error(), Some("Restoration failed"));

        flow.retry().unwrap();
        assert_eq!(flow.state(), RestoreState::Upload);
        assert_eq!(flow.prediction_id(), None);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut flow = RestoreFlow::new();
        assert_eq!(
            flow.submitted("pred-1"),
            Err(FlowError::InvalidTransition(RestoreState::Upload))
        );
        assert_eq!(
            flow.complete("https://x/y.jpg"),
            Err(FlowError::InvalidTransition(RestoreState::Upload))
        );
        assert_eq!(
            flow.retry(),
            Err(FlowError::InvalidTransition(RestoreState::Upload))
        );
    }

    #[test]
    fn test_reselect_while_ready() {
        let mut flow = RestoreFlow::new();
        flow.select_image(PNG_MAGIC).unwrap();
        flow.select_image(GIF_MAGIC).unwrap();
        assert_eq!(flow.state(), RestoreState::Ready);
        assert_eq!(flow.content_type(), Some("image/gif"));
    }

    #[test]
    fn test_validation_rejects_disallowed_type() {
        assert_eq!(validate_image(BMP_MAGIC), Err(FlowError::UnsupportedImageType));
        assert_eq!(
            validate_image(b"not an image at all"),
            Err(FlowError::UnsupportedImageType)
        );
    }

    #[test]
    fn test_validation_rejects_oversized_image() {
        let mut bytes = vec![0u8; MAX_IMAGE_BYTES + 1];
        bytes[..PNG_MAGIC.len()].copy_from_slice(PNG_MAGIC);
        assert_eq!(validate_image(&bytes), Err(FlowError::ImageTooLarge));
    }

    #[test]
    fn test_validation_accepts_all_allowed_types() {
        assert_eq!(validate_image(JPEG_MAGIC), Ok("image/jpeg"));
        assert_eq!(validate_image(PNG_MAGIC), Ok("image/png"));
        assert_eq!(validate_image(GIF_MAGIC), Ok("image/gif"));
        assert_eq!(validate_image(b"RIFF\x00\x00\x00\x00WEBP"), Ok("image/webp"));
    }

    #[test]
    fn test_resume_jumps_to_complete() {
        let flow = RestoreFlow::resume("pred-1", &job(JobStatus::Completed, Some("https://x/y.jpg")));
        assert_eq!(flow.state(), RestoreState::Complete);
        assert_eq!(flow.restored_image_url(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_resume_jumps_to_error_on_failed() {
        let flow = RestoreFlow::resume("pred-1", &job(JobStatus::Failed, None));
        assert_eq!(flow.state(), RestoreState::Error);
    }

    #[test]
    fn test_resume_continues_loading_when_processing() {
        let flow = RestoreFlow::resume("pred-1", &job(JobStatus::Processing, None));
        assert_eq!(flow.state(), RestoreState::Loading);
        assert_eq!(flow.prediction_id(), Some("pred-1"));
    }
}
