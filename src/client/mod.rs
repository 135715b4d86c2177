//! Headless restoration client: workflow state machine, durable checkpoint,
//! and the bounded polling loop that drives a job to a terminal state.

use std::time::Duration;
use tokio::time::sleep;

use crate::models::job::JobStatus;

use self::api::{ClientError, RestoreApi};
use self::checkpoint::{Checkpoint, CheckpointStore};
use self::flow::RestoreFlow;

pub mod api;
pub mod checkpoint;
pub mod flow;

/// Poll the in-flight job until it reaches a terminal state, driving the
/// flow and keeping the checkpoint current.
///
/// Both the observed-failure and exhausted-ceiling paths send a failure
/// report; the server's conditional transition guards the refund, so a
/// report that races the webhook (or a duplicate report) is harmless.
pub async fn poll_until_terminal(
    api: &RestoreApi,
    flow: &mut RestoreFlow,
    store: &CheckpointStore,
    original_filename: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<(), ClientError> {
    let prediction_id = flow
        .prediction_id()
        .ok_or(ClientError::NoJobInFlight)?
        .to_string();

    for attempt in 1..=max_attempts {
        let job = api.job_status(&prediction_id).await?;

        match job.status {
            JobStatus::Completed if job.restored_image_url.is_some() => {
                let url = job.restored_image_url.unwrap_or_default();
                flow.complete(&url)?;
                save_checkpoint(store, flow, original_filename)?;
                tracing::info!(prediction_id = %prediction_id, restored_url = %url, "Restoration complete");
                return Ok(());
            }
            JobStatus::Completed | JobStatus::Failed => {
                let report = api.report_failure(&prediction_id).await?;
                flow.fail(job.error.as_deref().unwrap_or("Restoration failed"))?;
                save_checkpoint(store, flow, original_filename)?;
                tracing::warn!(
                    prediction_id = %prediction_id,
                    refunded = report.refunded,
                    "Restoration failed"
                );
                return Ok(());
            }
            JobStatus::Processing => {
                tracing::debug!(prediction_id = %prediction_id, attempt, max_attempts, "Still processing");
                sleep(interval).await;
            }
        }
    }

    // Ceiling exhausted: give up locally and request the refund. The
    // external job is not cancelled; a later webhook finds the row already
    // failed and leaves it alone.
    let report = api.report_failure(&prediction_id).await?;
    flow.fail("Restoration is taking longer than expected")?;
    save_checkpoint(store, flow, original_filename)?;
    tracing::warn!(
        prediction_id = %prediction_id,
        refunded = report.refunded,
        "Polling ceiling reached, gave up"
    );
    Ok(())
}

fn save_checkpoint(
    store: &CheckpointStore,
    flow: &RestoreFlow,
    original_filename: &str,
) -> Result<(), ClientError> {
    if let Some(checkpoint) = Checkpoint::from_flow(flow, original_filename) {
        store.save(&checkpoint)?;
    }
    Ok(())
}
