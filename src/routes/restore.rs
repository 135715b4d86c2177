use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{credit_queries, queries};
use crate::error::ApiError;
use crate::models::restoration::{FailResponse, JobStatusResponse, RestoreRequest, RestoreResponse};
use crate::services::auth::AuthUser;
use crate::services::storage;

const HISTORY_LIMIT: i64 = 50;

/// POST /api/v1/restore — Submit an uploaded photo for restoration.
///
/// Ordering invariant: the credit is deducted only after the job row is
/// durably persisted, and the deduction itself is a conditional decrement so
/// concurrent submissions cannot drive the balance negative.
pub async fn submit_restoration(
    State(state): State<AppState>,
    user: AuthUser,
    request: Result<Json<RestoreRequest>, JsonRejection>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let Json(request) = request.map_err(|_| ApiError::Validation("Invalid JSON".to_string()))?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let image_url = request
        .image_url
        .as_deref()
        .ok_or_else(|| ApiError::Validation("No image URL provided".to_string()))?;

    // Fast rejection before any upstream work. The authoritative guard is
    // the conditional decrement below.
    let balance = credit_queries::get_credits(&state.db, user.user_id).await?;
    if balance.unwrap_or(0) < 1 {
        return Err(ApiError::InsufficientCredits);
    }

    // Presign the upload so Replicate can fetch it.
    let key = storage::object_key_from_url(image_url, &state.config.public_base_url);
    let signed_url = state
        .storage
        .presign_download(key, state.config.signed_url_expiry_secs)
        .await?;

    let filename = request
        .original_filename
        .as_deref()
        .unwrap_or("uploaded_image.jpg");

    if request.test_mode {
        return submit_test_mode(&state, user.user_id, filename, &signed_url).await;
    }

    let webhook_url = state.config.webhook_url();
    let prediction = state
        .replicate
        .create_prediction(&signed_url, &webhook_url)
        .await?;

    tracing::info!(
        prediction_id = %prediction.id,
        user_id = %user.user_id,
        "Dispatched restoration to Replicate"
    );

    let job = queries::insert_processing(
        &state.db,
        user.user_id,
        &prediction.id,
        filename,
        &signed_url,
    )
    .await?;

    deduct_for_job(&state, user.user_id, &job).await?;
    metrics::counter!("restoration_jobs_total").increment(1);

    Ok(Json(RestoreResponse {
        success: true,
        prediction_id: prediction.id,
        status: prediction.status,
        test_mode: false,
    }))
}

/// Test mode skips Replicate entirely and synthesizes an
/// immediately-completed job. Persist-then-deduct ordering still applies.
async fn submit_test_mode(
    state: &AppState,
    user_id: Uuid,
    filename: &str,
    signed_url: &str,
) -> Result<Json<RestoreResponse>, ApiError> {
    let fake_id = format!("test_{}", Uuid::new_v4().simple());
    tracing::info!(prediction_id = %fake_id, "Test mode: simulating completed restoration");

    let job = queries::insert_completed(
        &state.db,
        user_id,
        &fake_id,
        filename,
        signed_url,
        &state.config.test_restored_image_url,
    )
    .await?;

    deduct_for_job(state, user_id, &job).await?;
    metrics::counter!("restoration_jobs_total").increment(1);
    metrics::counter!("restoration_jobs_completed").increment(1);

    Ok(Json(RestoreResponse {
        success: true,
        prediction_id: fake_id,
        status: "completed".to_string(),
        test_mode: true,
    }))
}

/// Conditional decrement after the job row exists. If a concurrent
/// submission drained the balance between precheck and deduction, the row is
/// removed again and the caller sees 402; the already-dispatched provider
/// job is an orphaned, logged anomaly.
async fn deduct_for_job(
    state: &AppState,
    user_id: Uuid,
    job: &crate::models::job::RestorationJob,
) -> Result<(), ApiError> {
    match credit_queries::deduct_credit(&state.db, user_id).await? {
        Some(remaining) => {
            tracing::info!(
                prediction_id = %job.replicate_job_id,
                user_id = %user_id,
                remaining,
                "Deducted one credit"
            );
            Ok(())
        }
        None => {
            queries::delete_job(&state.db, job.id).await?;
            tracing::warn!(
                prediction_id = %job.replicate_job_id,
                user_id = %user_id,
                "Credit deduction lost a race, orphaning provider job"
            );
            Err(ApiError::InsufficientCredits)
        }
    }
}

/// GET /api/v1/restore/{prediction_id} — Poll restoration job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(prediction_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = queries::get_user_job(&state.db, user.user_id, &prediction_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(job.into()))
}

/// POST /api/v1/restore/{prediction_id}/fail — Client-side timeout path.
///
/// Runs the same conditional `processing -> failed` transition as the
/// webhook failure path; only the caller that actually flips the row
/// refunds, so a duplicate report (or a webhook racing this request) can
/// never refund twice.
pub async fn report_failure(
    State(state): State<AppState>,
    user: AuthUser,
    Path(prediction_id): Path<String>,
) -> Result<Json<FailResponse>, ApiError> {
    queries::get_user_job(&state.db, user.user_id, &prediction_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let refunded =
        queries::fail_job_and_refund(&state.db, &prediction_id, Some("Client-reported timeout"))
            .await?;

    if refunded {
        metrics::counter!("restoration_jobs_failed").increment(1);
        metrics::counter!("credits_refunded_total").increment(1);
        tracing::info!(
            prediction_id = %prediction_id,
            user_id = %user.user_id,
            "Client timeout: job failed and credit refunded"
        );
    } else {
        tracing::info!(
            prediction_id = %prediction_id,
            user_id = %user.user_id,
            "Client timeout report ignored, job already terminal"
        );
    }

    Ok(Json(FailResponse {
        success: true,
        refunded,
    }))
}

/// GET /api/v1/restorations — Recent restorations for the user.
pub async fn list_restorations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<JobStatusResponse>>, ApiError> {
    let jobs = queries::list_user_jobs(&state.db, user.user_id, HISTORY_LIMIT).await?;
    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}
