use reqwest::Client;
use serde::Deserialize;

/// Prediction endpoint of the restoration model.
const PREDICTIONS_URL: &str =
    "https://api.replicate.com/v1/models/flux-kontext-apps/restore-image/predictions";

/// Restoration prompt sent with every prediction.
const RESTORATION_PROMPT: &str = "Restore this old damaged photo, fix scratches, enhance \
                                  quality, and improve colors while maintaining the original \
                                  appearance";

/// A prediction as returned by the Replicate API.
#[derive(Debug, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
}

/// Client for the Replicate predictions API.
pub struct ReplicateClient {
    http: Client,
    api_token: String,
}

impl ReplicateClient {
    pub fn new(api_token: &str) -> Self {
        Self {
            http: Client::new(),
            api_token: api_token.to_string(),
        }
    }

    /// Dispatch a restoration prediction. Replicate fetches the image from
    /// `image_url` (a signed, time-limited URL) and POSTs terminal updates
    /// to `webhook_url`.
    pub async fn create_prediction(
        &self,
        image_url: &str,
        webhook_url: &str,
    ) -> Result<Prediction, ReplicateError> {
        let request_body = serde_json::json!({
            "input": {
                "input_image": image_url,
                "prompt": RESTORATION_PROMPT,
            },
            "webhook": webhook_url,
            "webhook_events_filter": ["completed"],
        });

        let response = self
            .http
            .post(PREDICTIONS_URL)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(ReplicateError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplicateError::Api {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        response.json().await.map_err(ReplicateError::Http)
    }
}

/// Pull the most specific error message out of a Replicate error body.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("detail")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Replicate returned {status}: {detail}")]
    Api { status: u16, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_detail_field() {
        let body = r#"{"detail": "Invalid token", "error": "other"}"#;
        assert_eq!(error_detail(body), "Invalid token");
    }

    #[test]
    fn test_error_detail_falls_back_to_error_field() {
        let body = r#"{"error": "Model not found"}"#;
        assert_eq!(error_detail(body), "Model not found");
    }

    #[test]
    fn test_error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail("upstream blew up"), "upstream blew up");
    }
}
