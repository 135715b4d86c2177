use reqwest::{Client, Response, StatusCode};

use crate::client::checkpoint::CheckpointError;
use crate::client::flow::FlowError;
use crate::models::restoration::{
    CreditsResponse, FailResponse, JobStatusResponse, RestoreRequest, RestoreResponse,
};

/// Typed HTTP client for the restoration API.
pub struct RestoreApi {
    http: Client,
    base_url: String,
    token: String,
}

impl RestoreApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// POST /api/v1/restore
    pub async fn submit(
        &self,
        image_url: &str,
        original_filename: &str,
        test_mode: bool,
    ) -> Result<RestoreResponse, ClientError> {
        let body = RestoreRequest {
            image_url: Some(image_url.to_string()),
            original_filename: Some(original_filename.to_string()),
            test_mode,
        };

        let response = self
            .http
            .post(format!("{}/api/v1/restore", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// GET /api/v1/restore/{prediction_id}
    pub async fn job_status(&self, prediction_id: &str) -> Result<JobStatusResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/restore/{}", self.base_url, prediction_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// POST /api/v1/restore/{prediction_id}/fail
    pub async fn report_failure(&self, prediction_id: &str) -> Result<FailResponse, ClientError> {
        let response = self
            .http
            .post(format!(
                "{}/api/v1/restore/{}/fail",
                self.base_url, prediction_id
            ))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// GET /api/v1/restorations
    pub async fn history(&self) -> Result<Vec<JobStatusResponse>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/restorations", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// GET /api/v1/credits
    pub async fn credits(&self) -> Result<CreditsResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/credits", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
        StatusCode::PAYMENT_REQUIRED => Err(ClientError::InsufficientCredits),
        status => {
            let detail = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("API returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("No job in flight")]
    NoJobInFlight,
}
