use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::queries;
use crate::error::ApiError;
use crate::models::restoration::WebhookPayload;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

/// POST /api/v1/webhooks/replicate — Terminal-state callback from Replicate.
///
/// Both terminal transitions are conditional on the row still being in
/// `processing`, so re-delivery of the same webhook is a no-op and a late
/// callback can never overwrite a client-reported timeout. Responds 200 in
/// both cases so the provider stops retrying.
pub async fn replicate_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    if let Some(secret) = &state.config.webhook_secret {
        if query.token.as_deref() != Some(secret.as_str()) {
            tracing::warn!("Webhook rejected: missing or invalid token");
            return Err(ApiError::Unauthorized);
        }
    }

    let Json(payload) = payload.map_err(|_| ApiError::Validation("Invalid JSON".to_string()))?;

    let prediction_id = payload
        .id
        .clone()
        .ok_or_else(|| ApiError::Validation("Missing job ID".to_string()))?;
    let status = payload.status.as_deref().unwrap_or_default();

    tracing::info!(prediction_id = %prediction_id, status, "Webhook received from Replicate");

    match status {
        "succeeded" => match payload.restored_image_url() {
            Some(restored_url) => {
                match queries::complete_job(&state.db, &prediction_id, &restored_url).await? {
                    Some(created_at) => {
                        let elapsed = (chrono::Utc::now() - created_at).num_milliseconds();
                        metrics::counter!("restoration_jobs_completed").increment(1);
                        metrics::histogram!("restoration_processing_seconds")
                            .record(elapsed as f64 / 1000.0);
                        tracing::info!(
                            prediction_id = %prediction_id,
                            restored_url = %restored_url,
                            elapsed_ms = elapsed,
                            "Job completed"
                        );
                    }
                    None => {
                        tracing::info!(prediction_id = %prediction_id, "Job already terminal, ignoring webhook");
                    }
                }
            }
            None => {
                // Succeeded without any usable output cannot satisfy the
                // completion contract; settle it as a failure.
                fail_with_refund(&state, &prediction_id, Some("Provider returned no output"))
                    .await?;
            }
        },
        "failed" | "canceled" => {
            tracing::error!(
                prediction_id = %prediction_id,
                error = payload.error.as_deref().unwrap_or("No error details provided"),
                "Job failed at provider"
            );
            fail_with_refund(&state, &prediction_id, payload.error.as_deref()).await?;
        }
        other => {
            // Non-terminal notices (starting, processing) are acknowledged
            // and ignored; only terminal states transition the row.
            tracing::debug!(prediction_id = %prediction_id, status = other, "Ignoring non-terminal webhook");
        }
    }

    Ok(StatusCode::OK)
}

async fn fail_with_refund(
    state: &AppState,
    prediction_id: &str,
    error: Option<&str>,
) -> Result<(), ApiError> {
    if queries::fail_job_and_refund(&state.db, prediction_id, error).await? {
        metrics::counter!("restoration_jobs_failed").increment(1);
        metrics::counter!("credits_refunded_total").increment(1);
        tracing::info!(prediction_id = %prediction_id, "Job failed and credit refunded");
    } else {
        tracing::info!(prediction_id = %prediction_id, "Job already terminal, ignoring webhook");
    }
    Ok(())
}
