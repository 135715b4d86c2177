//! Headless restoration client.
//!
//! Validates a local image, uploads it, submits a restoration job, and polls
//! until the job reaches a terminal state. The in-flight job is checkpointed
//! to disk so a restart resumes polling the same prediction instead of
//! losing track of it.

use serde::Deserialize;
use uuid::Uuid;

use photo_restore::client::api::RestoreApi;
use photo_restore::client::checkpoint::{Checkpoint, CheckpointStore};
use photo_restore::client::flow::{
    RestoreFlow, RestoreState, MAX_POLL_ATTEMPTS, POLL_INTERVAL, TEST_POLL_INTERVAL,
};
use photo_restore::client::poll_until_terminal;
use photo_restore::services::storage::StorageClient;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct PollerConfig {
    /// Base URL of the restoration API
    api_base_url: String,

    /// Bearer token for the API
    api_token: String,

    /// Local image to restore (unused when resuming a checkpoint)
    image_path: Option<String>,

    /// Submit in test mode (no Replicate call server-side)
    #[serde(default)]
    test_mode: bool,

    /// Checkpoint file location
    #[serde(default = "default_checkpoint_path")]
    checkpoint_path: String,

    /// Storage bucket for uploads
    storage_bucket: String,

    /// S3-compatible storage endpoint URL
    storage_endpoint: String,

    /// Storage access key ID
    storage_access_key: String,

    /// Storage secret access key
    storage_secret_key: String,

    /// Public URL prefix under which uploads are served
    public_base_url: String,
}

fn default_checkpoint_path() -> String {
    "restore_checkpoint.json".to_string()
}

impl PollerConfig {
    fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting restoration poller");

    let config = PollerConfig::from_env().expect("Failed to load configuration");
    let api = RestoreApi::new(&config.api_base_url, &config.api_token);
    let store = CheckpointStore::new(&config.checkpoint_path);

    let interval = if config.test_mode {
        TEST_POLL_INTERVAL
    } else {
        POLL_INTERVAL
    };

    // Resume an in-flight job if one was checkpointed.
    let checkpoint = store.load().expect("Failed to read checkpoint");
    if let Some(checkpoint) = checkpoint {
        resume(&api, &store, checkpoint, interval).await;
        return;
    }

    let image_path = config
        .image_path
        .clone()
        .expect("IMAGE_PATH must be set when no checkpoint exists");

    run_fresh(&api, &store, &config, &image_path, interval).await;
}

/// Resume from a checkpoint: re-fetch the job and either jump straight to a
/// terminal state or continue polling with a fresh attempt budget.
async fn resume(
    api: &RestoreApi,
    store: &CheckpointStore,
    checkpoint: Checkpoint,
    interval: std::time::Duration,
) {
    tracing::info!(
        prediction_id = %checkpoint.prediction_id,
        "Resuming from checkpoint"
    );

    let job = api
        .job_status(&checkpoint.prediction_id)
        .await
        .expect("Failed to fetch checkpointed job");

    let mut flow = RestoreFlow::resume(&checkpoint.prediction_id, &job);

    if flow.state() == RestoreState::Loading {
        poll_until_terminal(
            api,
            &mut flow,
            store,
            &checkpoint.original_filename,
            interval,
            MAX_POLL_ATTEMPTS,
        )
        .await
        .expect("Polling failed");
    } else if let Some(cp) = Checkpoint::from_flow(&flow, &checkpoint.original_filename) {
        store.save(&cp).expect("Failed to write checkpoint");
    }

    report_outcome(&flow);
}

/// Fresh run: validate, upload, submit, poll.
async fn run_fresh(
    api: &RestoreApi,
    store: &CheckpointStore,
    config: &PollerConfig,
    image_path: &str,
    interval: std::time::Duration,
) {
    let bytes = std::fs::read(image_path).expect("Failed to read image file");
    let filename = std::path::Path::new(image_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("uploaded_image.jpg")
        .to_string();

    let mut flow = RestoreFlow::new();

    // Validation happens before any network call.
    if let Err(e) = flow.select_image(&bytes) {
        tracing::error!(error = %e, "Image rejected");
        return;
    }

    let storage = StorageClient::new(
        &config.storage_bucket,
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
    )
    .expect("Failed to initialize storage client");

    let key = format!("uploads/{}_{}", Uuid::new_v4().simple(), filename);
    let content_type = flow.content_type().unwrap_or("application/octet-stream");
    storage
        .upload(&key, &bytes, content_type)
        .await
        .expect("Failed to upload image");

    let image_url = format!("{}/{}", config.public_base_url.trim_end_matches('/'), key);
    tracing::info!(image_url = %image_url, "Uploaded original");

    let response = api
        .submit(&image_url, &filename, config.test_mode)
        .await
        .expect("Failed to submit restoration");

    flow.submitted(&response.prediction_id)
        .expect("Unexpected workflow state");

    if let Some(cp) = Checkpoint::from_flow(&flow, &filename) {
        store.save(&cp).expect("Failed to write checkpoint");
    }

    tracing::info!(
        prediction_id = %response.prediction_id,
        status = %response.status,
        test_mode = response.test_mode,
        "Restoration submitted"
    );

    poll_until_terminal(api, &mut flow, store, &filename, interval, MAX_POLL_ATTEMPTS)
        .await
        .expect("Polling failed");

    report_outcome(&flow);
}

fn report_outcome(flow: &RestoreFlow) {
    match flow.state() {
        RestoreState::Complete => {
            tracing::info!(
                restored_url = flow.restored_image_url().unwrap_or_default(),
                "Restoration complete"
            );
        }
        RestoreState::Error => {
            tracing::error!(
                error = flow.last_error().unwrap_or("unknown"),
                "Restoration failed"
            );
        }
        other => {
            tracing::warn!(state = ?other, "Poller exited in non-terminal state");
        }
    }
}
